use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One trade update from the live feed. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    /// Upper-cased coin symbol, e.g. "BTC".
    pub coin: String,
    /// Local receive time; the exchange timestamp, when present, lives in `msg.time`.
    pub received_at: DateTime<Utc>,
    pub msg: TradeMessage,
}

impl TradeEvent {
    /// Display name for alert formatting: long name when the feed sent one,
    /// otherwise the symbol itself.
    pub fn display_name(&self) -> &str {
        self.msg.long.as_deref().unwrap_or(&self.coin)
    }
}

/// The nested `message` body of a feed frame.
///
/// Only `coin` and `price` are semantically required; everything else is
/// descriptive passthrough used for alert formatting.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeMessage {
    pub price: Decimal,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
    /// Exchange-side timestamp in epoch millis.
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub perc: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default, rename = "usdVolume")]
    pub usd_volume: Option<String>,
    #[serde(default)]
    pub mktcap: Option<Decimal>,
}

/// Lifecycle of one physical feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Transport dropped; a new attempt is pending.
    Reconnecting,
    /// A single connect attempt failed; retries continue.
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Reconnecting => "Reconnecting",
            ConnectionStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One connection-status transition, also cached as the observer's
/// current status.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub status: ConnectionStatus,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn now(status: ConnectionStatus, error: Option<String>) -> Self {
        Self {
            status,
            error,
            at: Utc::now(),
        }
    }
}
