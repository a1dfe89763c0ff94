//! Miscellaneous helper utilities.

use chrono::{DateTime, Duration, Utc};
use tracing_subscriber::{EnvFilter, fmt};

const IST_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Wall-clock time of `ts` in India Standard Time, formatted `HH:MM:SS IST`.
pub fn format_ist(ts: DateTime<Utc>) -> String {
    let local = ts.naive_utc() + Duration::seconds(IST_OFFSET_SECS);
    format!("{} IST", local.format("%H:%M:%S"))
}

/// Escape text for Telegram's MarkdownV2 parse mode.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '_'
                | '*'
                | '['
                | ']'
                | '('
                | ')'
                | '~'
                | '`'
                | '>'
                | '#'
                | '+'
                | '-'
                | '='
                | '|'
                | '{'
                | '}'
                | '.'
                | '!'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
