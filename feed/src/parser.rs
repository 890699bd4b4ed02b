//! Frame parsing for the trade feed.
//!
//! Every trade frame arrives as a JSON object with a nested `message` body.
//! Anything that does not match the envelope is dropped with a debug log;
//! bad data never tears down the stream.

use chrono::Utc;
use serde::Deserialize;

use crate::types::{TradeEvent, TradeMessage};

#[derive(Debug, Deserialize)]
struct Envelope {
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    coin: Option<String>,
    #[serde(flatten)]
    msg: TradeMessage,
}

/// Parse one raw text frame into a `TradeEvent`.
///
/// Returns `None` for frames missing the `message` envelope, the coin
/// symbol, or a parsable price. The symbol is upper-cased so monitor
/// filters can compare case-insensitively.
pub fn parse_trade(raw: &str) -> Option<TradeEvent> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparsable feed frame");
            return None;
        }
    };

    let Some(wire) = envelope.message else {
        tracing::debug!("dropping feed frame without message body");
        return None;
    };

    let Some(coin) = wire.coin.filter(|c| !c.trim().is_empty()) else {
        tracing::debug!("dropping feed frame without coin symbol");
        return None;
    };

    Some(TradeEvent {
        coin: coin.trim().to_uppercase(),
        received_at: Utc::now(),
        msg: wire.msg,
    })
}
