//! Dhan market feed wire format.
//!
//! Server packets are little-endian binary with an 8-byte header:
//! `u8` response code, `u16` packet length, `u8` exchange segment and
//! `i32` security id. Client requests are JSON (v2) or binary (v1).

use crate::errors::{AppError, Result};
use crate::models::{ExchangeSegment, PriceUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

pub const HEADER_LEN: usize = 8;

pub const RESPONSE_INDEX: u8 = 1;
pub const RESPONSE_TICKER: u8 = 2;
pub const RESPONSE_QUOTE: u8 = 4;
pub const RESPONSE_PREV_CLOSE: u8 = 6;
pub const RESPONSE_FULL: u8 = 8;
pub const RESPONSE_DISCONNECT: u8 = 50;

pub const REQUEST_AUTHORIZE: u8 = 11;
pub const REQUEST_SUBSCRIBE_TICKER: u8 = 15;

const V1_HEADER_LEN: usize = 83;
const V1_CLIENT_ID_LEN: usize = 30;
const V1_AUTH_PAD_LEN: usize = 50;
const V1_TOKEN_LEN: usize = 500;
const V1_AUTH_TYPE: &[u8; 2] = b"2P";
const V1_SECURITY_ID_LEN: usize = 20;
const V1_INSTRUMENT_SLOTS: usize = 100;

/// A decoded server packet.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPacket {
    Tick(PriceUpdate),
    PrevClose { security_id: String, prev_close: f64 },
    Disconnect { code: u16 },
    Other { response_code: u8 },
}

/// Feed URL for the v2 handshake, which carries the credentials.
pub fn v2_url(base: &str, client_id: &str, access_token: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        base,
        &[
            ("version", "2"),
            ("token", access_token),
            ("clientId", client_id),
            ("authType", "2"),
        ],
    )?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubscribeRequest<'a> {
    request_code: u8,
    instrument_count: usize,
    instrument_list: [Instrument<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Instrument<'a> {
    exchange_segment: &'static str,
    security_id: &'a str,
}

/// JSON ticker subscription for one instrument (v2).
pub fn v2_subscribe_message(segment: ExchangeSegment, security_id: &str) -> Result<String> {
    let req = SubscribeRequest {
        request_code: REQUEST_SUBSCRIBE_TICKER,
        instrument_count: 1,
        instrument_list: [Instrument {
            exchange_segment: segment.as_str(),
            security_id,
        }],
    };
    Ok(serde_json::to_string(&req)?)
}

fn put_padded(buf: &mut Vec<u8>, value: &[u8], width: usize) {
    let take = value.len().min(width);
    buf.extend_from_slice(&value[..take]);
    buf.resize(buf.len() + (width - take), 0);
}

fn v1_header(request_code: u8, message_len: u16, client_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message_len as usize);
    buf.push(request_code);
    buf.extend_from_slice(&message_len.to_le_bytes());
    put_padded(&mut buf, client_id.as_bytes(), V1_CLIENT_ID_LEN);
    buf.resize(buf.len() + V1_AUTH_PAD_LEN, 0);
    buf
}

/// Binary authorization packet sent right after a v1 handshake.
pub fn v1_auth_packet(client_id: &str, access_token: &str) -> Vec<u8> {
    let len = V1_HEADER_LEN + V1_TOKEN_LEN + V1_AUTH_TYPE.len();
    let mut buf = v1_header(REQUEST_AUTHORIZE, len as u16, client_id);
    put_padded(&mut buf, access_token.as_bytes(), V1_TOKEN_LEN);
    buf.extend_from_slice(V1_AUTH_TYPE);
    buf
}

/// Binary ticker subscription for one instrument (v1).
pub fn v1_subscribe_packet(client_id: &str, segment: ExchangeSegment, security_id: &str) -> Vec<u8> {
    let slot = 1 + V1_SECURITY_ID_LEN;
    let len = V1_HEADER_LEN + 4 + slot;
    let mut buf = v1_header(REQUEST_SUBSCRIBE_TICKER, len as u16, client_id);
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.push(segment.code());
    put_padded(&mut buf, security_id.as_bytes(), V1_SECURITY_ID_LEN);
    buf.resize(buf.len() + slot * (V1_INSTRUMENT_SLOTS - 1), 0);
    buf
}

fn read_f32(buf: &[u8], at: usize) -> Result<f32> {
    buf.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(f32::from_le_bytes)
        .ok_or_else(|| AppError::Packet(format!("need 4 bytes at offset {at}, have {}", buf.len())))
}

fn read_i32(buf: &[u8], at: usize) -> Result<i32> {
    buf.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_le_bytes)
        .ok_or_else(|| AppError::Packet(format!("need 4 bytes at offset {at}, have {}", buf.len())))
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16> {
    buf.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| AppError::Packet(format!("need 2 bytes at offset {at}, have {}", buf.len())))
}

/// Split a binary frame into the packets it carries.
///
/// Packets are walked by their header length; a missing or inconsistent
/// length makes the remainder one packet.
pub fn split_packets(frame: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut rest = frame;
    while !rest.is_empty() {
        let declared = read_u16(rest, 1).map(usize::from).unwrap_or(0);
        let take = if declared >= HEADER_LEN && declared <= rest.len() {
            declared
        } else {
            rest.len()
        };
        let (packet, tail) = rest.split_at(take);
        out.push(packet);
        rest = tail;
    }
    out
}

/// Decode one server packet. `received_at` stamps ticks without a trade time.
pub fn decode_packet(buf: &[u8], received_at: DateTime<Utc>) -> Result<FeedPacket> {
    if buf.len() < HEADER_LEN {
        return Err(AppError::Packet(format!(
            "header needs {HEADER_LEN} bytes, have {}",
            buf.len()
        )));
    }
    let response_code = buf[0];
    let security_id = read_i32(buf, 4)?.to_string();

    match response_code {
        RESPONSE_INDEX | RESPONSE_TICKER | RESPONSE_QUOTE | RESPONSE_FULL => {
            let segment = ExchangeSegment::from_code(buf[3])
                .ok_or_else(|| AppError::Packet(format!("unknown segment code {}", buf[3])))?;
            let ltp = read_f32(buf, 8)?;
            // quote and full packets put the last traded quantity before the trade time
            let ltt_at = match response_code {
                RESPONSE_QUOTE | RESPONSE_FULL => 14,
                _ => 12,
            };
            let ltt = read_i32(buf, ltt_at)?;
            let timestamp = if ltt > 0 {
                DateTime::<Utc>::from_timestamp(i64::from(ltt), 0).unwrap_or(received_at)
            } else {
                received_at
            };
            Ok(FeedPacket::Tick(PriceUpdate {
                security_id,
                segment,
                ltp: f64::from(ltp),
                timestamp,
            }))
        }
        RESPONSE_PREV_CLOSE => Ok(FeedPacket::PrevClose {
            security_id,
            prev_close: f64::from(read_f32(buf, 8)?),
        }),
        RESPONSE_DISCONNECT => Ok(FeedPacket::Disconnect {
            code: read_u16(buf, 8)?,
        }),
        other => Ok(FeedPacket::Other {
            response_code: other,
        }),
    }
}

/// Human-readable meaning of a server disconnect code.
pub fn disconnect_reason(code: u16) -> &'static str {
    match code {
        805 => "too many connections",
        806 => "data APIs not subscribed",
        807 => "access token expired",
        808 => "authentication failed",
        809 => "access token invalid",
        810 => "client id invalid",
        _ => "unknown",
    }
}
