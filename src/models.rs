//! Shared data structures used throughout the application.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Last-traded-price tick for one instrument, as decoded from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub security_id: String,
    pub segment: ExchangeSegment,
    pub ltp: f64,
    pub timestamp: DateTime<Utc>,
}

/// Dhan exchange segments with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeSegment {
    IdxI,
    NseEq,
    NseFno,
    NseCurrency,
    BseEq,
    McxComm,
    BseCurrency,
    BseFno,
}

impl ExchangeSegment {
    pub fn code(self) -> u8 {
        match self {
            Self::IdxI => 0,
            Self::NseEq => 1,
            Self::NseFno => 2,
            Self::NseCurrency => 3,
            Self::BseEq => 4,
            Self::McxComm => 5,
            Self::BseCurrency => 7,
            Self::BseFno => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::IdxI,
            1 => Self::NseEq,
            2 => Self::NseFno,
            3 => Self::NseCurrency,
            4 => Self::BseEq,
            5 => Self::McxComm,
            7 => Self::BseCurrency,
            8 => Self::BseFno,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdxI => "IDX_I",
            Self::NseEq => "NSE_EQ",
            Self::NseFno => "NSE_FNO",
            Self::NseCurrency => "NSE_CURRENCY",
            Self::BseEq => "BSE_EQ",
            Self::McxComm => "MCX_COMM",
            Self::BseCurrency => "BSE_CURRENCY",
            Self::BseFno => "BSE_FNO",
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Self::IdxI,
            Self::NseEq,
            Self::NseFno,
            Self::NseCurrency,
            Self::BseEq,
            Self::McxComm,
            Self::BseCurrency,
            Self::BseFno,
        ];
        let wanted = s.trim().to_ascii_uppercase();
        all.into_iter()
            .find(|seg| seg.as_str() == wanted)
            .ok_or_else(|| format!("unknown exchange segment {s:?}"))
    }
}

/// Pinned shapes of the market feed handshake, tried in configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedVersion {
    /// Credentials in the URL query, JSON subscription messages.
    V2,
    /// Bare URL, binary authorization and subscription packets.
    V1,
}

impl fmt::Display for FeedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("v2"),
            Self::V1 => f.write_str("v1"),
        }
    }
}

impl FromStr for FeedVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "2" | "2.0" => Ok(Self::V2),
            "1" | "1.0" => Ok(Self::V1),
            other => Err(format!("unsupported feed version {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_codes_round_trip_and_skip_six() {
        assert_eq!(ExchangeSegment::from_code(6), None);
        assert_eq!(ExchangeSegment::from_code(7), Some(ExchangeSegment::BseCurrency));
        assert_eq!(ExchangeSegment::NseEq.code(), 1);
    }

    #[test]
    fn parses_segment_names_case_insensitively() {
        assert_eq!("nse_eq".parse::<ExchangeSegment>(), Ok(ExchangeSegment::NseEq));
        assert!("NYSE".parse::<ExchangeSegment>().is_err());
    }

    #[test]
    fn parses_version_aliases() {
        assert_eq!("v2".parse::<FeedVersion>(), Ok(FeedVersion::V2));
        assert_eq!("2.0".parse::<FeedVersion>(), Ok(FeedVersion::V2));
        assert_eq!("1".parse::<FeedVersion>(), Ok(FeedVersion::V1));
        assert!("3".parse::<FeedVersion>().is_err());
    }
}
