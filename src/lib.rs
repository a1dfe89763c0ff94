//! Core library for the dhan-ltp-alert bot.
//!
//! The binary wires a [`feed::FeedAdapter`] to a [`relay::AlertRelay`]:
//! every last-traded-price tick from the Dhan market feed is offered to the
//! relay, which forwards at most one Telegram message per cooldown window.

pub mod config;
pub mod errors;
pub mod feed;
pub mod models;
pub mod relay;
pub mod utils;
