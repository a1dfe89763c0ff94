use crate::errors::{AppError, Result};
use crate::relay::MessageSink;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

const SEND_TIMEOUT: Duration = Duration::from_secs(8);

/// Telegram Bot API client bound to one chat.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    endpoint: Url,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str, chat_id: String) -> Result<Self> {
        let http = Client::builder().timeout(SEND_TIMEOUT).build()?;
        let endpoint = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            api_base.trim_end_matches('/'),
            bot_token
        ))?;
        Ok(Self {
            http,
            endpoint,
            chat_id,
        })
    }
}

impl MessageSink for TelegramClient {
    async fn send(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "MarkdownV2",
        };
        // the endpoint embeds the bot token, keep it out of error messages
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Telegram {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server replying with `status` and `body`; yields the raw request.
    async fn reply_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn endpoint_embeds_token() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc", "42".into()).unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn posts_markdown_message_to_chat() {
        let (base, server) = reply_once("200 OK", r#"{"ok":true}"#).await;
        let client = TelegramClient::new(&base, "123:abc", "-100200".into()).unwrap();
        client.send("hello").await.expect("2xx should succeed");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /bot123:abc/sendMessage "));
        let json_start = request.find('{').unwrap();
        let sent: serde_json::Value = serde_json::from_str(&request[json_start..]).unwrap();
        assert_eq!(sent["chat_id"], "-100200");
        assert_eq!(sent["text"], "hello");
        assert_eq!(sent["parse_mode"], "MarkdownV2");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let (base, _server) =
            reply_once("400 Bad Request", r#"{"ok":false,"description":"chat not found"}"#).await;
        let client = TelegramClient::new(&base, "123:abc", "42".into()).unwrap();
        match client.send("hello").await {
            Err(AppError::Telegram { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("chat not found"));
            }
            other => panic!("expected telegram error, got {other:?}"),
        }
    }
}
