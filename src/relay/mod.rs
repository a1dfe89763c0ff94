//! Alert relay: turns price ticks into at most one chat message per cooldown.

pub mod telegram;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::feed::TickHandler;
use crate::models::PriceUpdate;
use crate::utils::{escape_markdown, format_ist};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use telegram::TelegramClient;

/// Destination for formatted alert text.
pub trait MessageSink {
    fn send(&self, text: &str) -> impl Future<Output = Result<()>>;
}

/// Cooldown between sends, keyed on wall-clock time.
#[derive(Debug, Clone)]
pub struct Throttle {
    cooldown: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl Throttle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: None,
        }
    }

    /// Whether a send at `now` is outside the cooldown window.
    /// A clock that moved backwards counts as still cooling down.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => (now - last).to_std().is_ok_and(|elapsed| elapsed >= self.cooldown),
        }
    }

    /// Record a send. The stored time never moves backwards.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        if self.last_sent.is_none_or(|last| now > last) {
            self.last_sent = Some(now);
        }
    }

    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.last_sent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Suppressed,
    Failed,
}

/// Formats ticks and forwards them to a [`MessageSink`] behind a [`Throttle`].
pub struct AlertRelay<S> {
    sink: S,
    throttle: Throttle,
    security_id: String,
    instrument_name: String,
}

impl<S: MessageSink> AlertRelay<S> {
    pub fn new(sink: S, cfg: &AppConfig) -> Self {
        Self::with_cooldown(
            sink,
            cfg.send_interval,
            cfg.security_id.clone(),
            cfg.instrument_name.clone(),
        )
    }

    pub fn with_cooldown(
        sink: S,
        cooldown: Duration,
        security_id: String,
        instrument_name: String,
    ) -> Self {
        Self {
            sink,
            throttle: Throttle::new(cooldown),
            security_id,
            instrument_name,
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn notify(&mut self, update: &PriceUpdate) -> NotifyOutcome {
        self.notify_at(update, Utc::now()).await
    }

    /// Send an alert for `update` unless the last successful send was less
    /// than one cooldown before `now`. Failed sends leave the throttle as is.
    pub async fn notify_at(&mut self, update: &PriceUpdate, now: DateTime<Utc>) -> NotifyOutcome {
        if !self.throttle.is_open(now) {
            debug!(security_id = %update.security_id, "[ALERT] throttled");
            return NotifyOutcome::Suppressed;
        }

        let text = self.format_message(update);
        match self.sink.send(&text).await {
            Ok(()) => {
                self.throttle.mark_sent(now);
                info!(
                    security_id = %update.security_id,
                    ltp = update.ltp,
                    "[ALERT] sent"
                );
                NotifyOutcome::Sent
            }
            Err(e) => {
                warn!(security_id = %update.security_id, error = %e, "[ALERT] send failed");
                NotifyOutcome::Failed
            }
        }
    }

    /// MarkdownV2 alert text for `update`.
    pub fn format_message(&self, update: &PriceUpdate) -> String {
        let name = if update.security_id == self.security_id {
            self.instrument_name.clone()
        } else {
            format!("Security {}", update.security_id)
        };
        let title = format!("{} LTP ALERT!", self.instrument_name.to_uppercase());
        let footer = format!(
            "Alerts are sent at most once every {} seconds from live WebSocket data.",
            self.throttle.cooldown.as_secs()
        );
        format!(
            "*{}* 🔔\nTime: {}\n\n*{}*\nLatest LTP: ₹ *{}*\n\n_{}_",
            escape_markdown(&title),
            escape_markdown(&format_ist(update.timestamp)),
            escape_markdown(&name),
            escape_markdown(&format!("{:.2}", update.ltp)),
            escape_markdown(&footer),
        )
    }
}

impl<S: MessageSink> TickHandler for AlertRelay<S> {
    async fn on_tick(&mut self, update: PriceUpdate) {
        self.notify(&update).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::ExchangeSegment;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingSink {
        sent: RefCell<Vec<String>>,
        fail: Cell<bool>,
    }

    impl MessageSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<()> {
            if self.fail.get() {
                return Err(AppError::Telegram {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn tick(ltp: f64, at: i64) -> PriceUpdate {
        PriceUpdate {
            security_id: "1333".into(),
            segment: ExchangeSegment::NseEq,
            ltp,
            timestamp: t(at),
        }
    }

    fn relay(cooldown_secs: u64) -> AlertRelay<RecordingSink> {
        AlertRelay::with_cooldown(
            RecordingSink::default(),
            Duration::from_secs(cooldown_secs),
            "1333".into(),
            "HDFC BANK".into(),
        )
    }

    fn sent_prices(relay: &AlertRelay<RecordingSink>) -> Vec<String> {
        relay
            .sink()
            .sent
            .borrow()
            .iter()
            .map(|m| {
                let start = m.find("₹ *").expect("price marker") + "₹ *".len();
                let end = start + m[start..].find('*').expect("price end");
                m[start..end].replace('\\', "")
            })
            .collect()
    }

    #[tokio::test]
    async fn update_inside_cooldown_is_suppressed() {
        let mut relay = relay(30);
        assert_eq!(relay.notify_at(&tick(100.0, 0), t(0)).await, NotifyOutcome::Sent);
        assert_eq!(
            relay.notify_at(&tick(101.0, 10), t(10)).await,
            NotifyOutcome::Suppressed
        );
        assert_eq!(sent_prices(&relay), vec!["100.00"]);
    }

    #[tokio::test]
    async fn update_after_cooldown_is_sent() {
        let mut relay = relay(30);
        relay.notify_at(&tick(100.0, 0), t(0)).await;
        assert_eq!(relay.notify_at(&tick(105.0, 31), t(31)).await, NotifyOutcome::Sent);
        assert_eq!(sent_prices(&relay), vec!["100.00", "105.00"]);
    }

    #[tokio::test]
    async fn exactly_one_cooldown_apart_is_sent() {
        let mut relay = relay(30);
        relay.notify_at(&tick(100.0, 0), t(0)).await;
        assert_eq!(relay.notify_at(&tick(100.5, 30), t(30)).await, NotifyOutcome::Sent);
        assert_eq!(relay.throttle().last_sent(), Some(t(30)));
    }

    #[tokio::test]
    async fn failed_send_does_not_start_cooldown() {
        let mut relay = relay(30);
        relay.sink().fail.set(true);
        assert_eq!(relay.notify_at(&tick(100.0, 0), t(0)).await, NotifyOutcome::Failed);
        assert_eq!(relay.throttle().last_sent(), None);

        relay.sink().fail.set(false);
        assert_eq!(relay.notify_at(&tick(101.0, 5), t(5)).await, NotifyOutcome::Sent);
        assert_eq!(sent_prices(&relay), vec!["101.00"]);
    }

    #[test]
    fn throttle_never_moves_backwards() {
        let mut throttle = Throttle::new(Duration::from_secs(30));
        throttle.mark_sent(t(100));
        throttle.mark_sent(t(50));
        assert_eq!(throttle.last_sent(), Some(t(100)));
        assert!(!throttle.is_open(t(90)));
        assert!(throttle.is_open(t(130)));
    }

    #[test]
    fn message_escapes_and_names_the_instrument() {
        let relay = relay(60);
        let msg = relay.format_message(&tick(1452.5, 5));
        assert!(msg.starts_with("*HDFC BANK LTP ALERT\\!* 🔔\n"));
        assert!(msg.contains("Time: 09:30:05 IST"));
        assert!(msg.contains("*HDFC BANK*"));
        assert!(msg.contains("₹ *1452\\.50*"));
        assert!(msg.contains("every 60 seconds"));

        let mut other = tick(10.0, 0);
        other.security_id = "11536".into();
        assert!(relay.format_message(&other).contains("*Security 11536*"));
    }
}
