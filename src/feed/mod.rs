//! Market feed adapter.
//!
//! Responsibilities:
//! • Open the Dhan feed using the first configured handshake shape that works.
//! • Subscribe to a single instrument in ticker mode.
//! • Decode ticks and hand each one to the registered handler.
//!
//! Setup failures are returned to the caller; there is no reconnect.

pub mod dhan;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{ExchangeSegment, FeedVersion, PriceUpdate};
use chrono::Utc;
use dhan::FeedPacket;
use futures::{SinkExt, StreamExt};
use std::fmt::Display;
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives every decoded tick, in arrival order.
pub trait TickHandler {
    fn on_tick(&mut self, update: PriceUpdate) -> impl Future<Output = ()>;
}

/// Try `candidates` in order and return the first one `attempt` accepts,
/// together with what it produced. Later candidates are never tried.
pub async fn connect_first<C, T, F, Fut>(candidates: &[C], mut attempt: F) -> Result<(C, T)>
where
    C: Copy + Display,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = Vec::with_capacity(candidates.len());
    for &candidate in candidates {
        info!(%candidate, "[FEED] trying connection shape");
        match attempt(candidate).await {
            Ok(conn) => {
                info!(%candidate, "[FEED] connected");
                return Ok((candidate, conn));
            }
            Err(e) => {
                warn!(%candidate, error = %e, "[FEED] connection shape rejected");
                attempts.push(format!("{candidate}: {e}"));
            }
        }
    }
    error!(?attempts, "[FEED] no connection shape succeeded");
    Err(AppError::Connect { attempts })
}

/// Live connection to the market feed plus its registered tick handler.
pub struct FeedAdapter<H> {
    ws: WsStream,
    version: FeedVersion,
    client_id: String,
    handler: Option<H>,
}

impl<H: TickHandler> FeedAdapter<H> {
    /// Connect using `cfg.feed_versions` in order.
    pub async fn connect(cfg: &AppConfig) -> Result<Self> {
        let (version, ws) = connect_first(&cfg.feed_versions, |version| {
            open(cfg, version)
        })
        .await?;
        Ok(Self {
            ws,
            version,
            client_id: cfg.client_id.clone(),
            handler: None,
        })
    }

    pub fn version(&self) -> FeedVersion {
        self.version
    }

    /// Register the tick handler, replacing any earlier one.
    pub fn on_tick(&mut self, handler: H) {
        self.handler = Some(handler);
    }

    /// Subscribe to ticker updates for one instrument.
    pub async fn subscribe(&mut self, segment: ExchangeSegment, security_id: &str) -> Result<()> {
        let (msg, payload) = match self.version {
            FeedVersion::V2 => {
                let json = dhan::v2_subscribe_message(segment, security_id)?;
                (Message::Text(json.clone()), json)
            }
            FeedVersion::V1 => {
                let pkt = dhan::v1_subscribe_packet(&self.client_id, segment, security_id);
                let desc = format!("binary request {} ({} bytes)", pkt[0], pkt.len());
                (Message::Binary(pkt), desc)
            }
        };
        if let Err(e) = self.ws.send(msg).await {
            error!(%payload, error = %e, "[FEED] subscription send failed");
            return Err(AppError::Subscribe(format!("{payload}: {e}")));
        }
        info!(%segment, security_id, version = %self.version, "[FEED] subscribed");
        Ok(())
    }

    /// Receive until the feed ends. Every return is an error: the server
    /// disconnected us, closed the socket, or the transport failed.
    pub async fn run(mut self) -> Result<()> {
        let mut handler = self
            .handler
            .take()
            .ok_or_else(|| AppError::Config("no tick handler registered".into()))?;

        while let Some(msg) = self.ws.next().await {
            match msg? {
                Message::Binary(frame) => {
                    for packet in dhan::split_packets(&frame) {
                        match dhan::decode_packet(packet, Utc::now()) {
                            Ok(FeedPacket::Tick(update)) => {
                                info!(
                                    security_id = %update.security_id,
                                    ltp = update.ltp,
                                    "[FEED] tick"
                                );
                                handler.on_tick(update).await;
                            }
                            Ok(FeedPacket::PrevClose {
                                security_id,
                                prev_close,
                            }) => {
                                debug!(%security_id, prev_close, "[FEED] previous close");
                            }
                            Ok(FeedPacket::Disconnect { code }) => {
                                error!(
                                    code,
                                    reason = dhan::disconnect_reason(code),
                                    "[FEED] server disconnected feed"
                                );
                                return Err(AppError::Disconnected { code });
                            }
                            Ok(FeedPacket::Other { response_code }) => {
                                debug!(response_code, "[FEED] ignored packet");
                            }
                            Err(e) => {
                                warn!(error = %e, len = packet.len(), "[FEED] undecodable packet");
                            }
                        }
                    }
                }
                Message::Text(txt) => debug!(%txt, "[FEED] text message"),
                Message::Close(frame) => {
                    warn!(?frame, "[FEED] server closed connection");
                    return Err(AppError::FeedClosed);
                }
                _ => {}
            }
        }
        Err(AppError::FeedClosed)
    }
}

/// Open a socket for one handshake shape and authorize it.
async fn open(cfg: &AppConfig, version: FeedVersion) -> Result<WsStream> {
    let url = match version {
        FeedVersion::V2 => dhan::v2_url(&cfg.feed_url, &cfg.client_id, &cfg.access_token)?,
        FeedVersion::V1 => url::Url::parse(&cfg.feed_url)?,
    };

    let mut ws = match connect_async(url.as_str()).await {
        Ok((ws, _resp)) => ws,
        Err(WsError::Http(resp)) => {
            let body = resp
                .body()
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            error!(%version, status = %resp.status(), %body, "[FEED] handshake rejected");
            return Err(AppError::WebSocket(WsError::Http(resp)));
        }
        Err(e) => return Err(e.into()),
    };

    if version == FeedVersion::V1 {
        let auth = dhan::v1_auth_packet(&cfg.client_id, &cfg.access_token);
        ws.send(Message::Binary(auth)).await?;
        info!("[FEED] sent authorization packet");
    }
    Ok(ws)
}
