use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Feed connection failed for every candidate: {}", attempts.join("; "))]
    Connect { attempts: Vec<String> },

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Feed disconnected by server (code {code})")]
    Disconnected { code: u16 },

    #[error("Feed closed")]
    FeedClosed,

    #[error("Malformed packet: {0}")]
    Packet(String),

    #[error("Other: {0}")]
    Other(String),

    #[error("Telegram API returned {status}: {body}")]
    Telegram { status: u16, body: String },
}
