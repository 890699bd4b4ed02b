//! FeedObserver
//!
//! Owns the single live websocket connection to the trade feed and fans it
//! out to any number of consumers. Responsibilities:
//!   • Maintain one physical connection regardless of subscriber count
//!   • Open the socket on the first subscription, close it on the last drop
//!   • Re-publish connection transitions as a shared status stream
//!   • Parse trade frames and broadcast them to all trade subscribers
//!   • Reconnect with jittered exponential backoff, forever
//!
//! Consumers hold `TradeStream` / `StatusStream` handles; dropping a handle
//! releases its share of the connection.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::backoff::Backoff;
use crate::error::FeedError;
use crate::parser;
use crate::types::{ConnectionStatus, StatusEvent, TradeEvent};

/// Buffered events per subscriber before a slow consumer starts skipping.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Websocket endpoint, e.g. `wss://trades.example.io/ws`.
    pub url: String,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

struct ConnState {
    subscribers: usize,
    /// Present while a connection task is running.
    shutdown: Option<watch::Sender<bool>>,
    /// Bumped each time a connection task is spawned. A task whose
    /// generation is no longer current has been superseded and must not
    /// report status anymore.
    generation: u64,
}

struct Inner {
    cfg: FeedConfig,
    trade_tx: broadcast::Sender<TradeEvent>,
    status_tx: broadcast::Sender<StatusEvent>,
    current: Mutex<StatusEvent>,
    conn: Mutex<ConnState>,
}

/// Shared handle to the feed. Cheap to clone; all clones share one
/// connection and one pair of broadcast streams.
#[derive(Clone)]
pub struct FeedObserver {
    inner: Arc<Inner>,
}

/// Anything that can hand out live trade streams. The registry and monitors
/// depend on this seam rather than on the websocket-backed observer directly.
pub trait TradeSource: Send + Sync {
    fn trades(&self) -> TradeStream;
}

impl FeedObserver {
    pub fn new(cfg: FeedConfig) -> Self {
        let (trade_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (status_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                cfg,
                trade_tx,
                status_tx,
                current: Mutex::new(StatusEvent::now(ConnectionStatus::Disconnected, None)),
                conn: Mutex::new(ConnState {
                    subscribers: 0,
                    shutdown: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Subscribe to the shared trade stream, opening the connection if this
    /// is the first live subscription.
    pub fn trades(&self) -> TradeStream {
        let rx = self.inner.trade_tx.subscribe();
        TradeStream {
            rx,
            _guard: Some(self.acquire()),
        }
    }

    /// Subscribe to the shared connection-status stream under the same
    /// reference-counted contract as `trades`.
    pub fn status_stream(&self) -> StatusStream {
        let rx = self.inner.status_tx.subscribe();
        StatusStream {
            rx,
            _guard: Some(self.acquire()),
        }
    }

    /// Latest status transition, without subscribing.
    pub fn current_status(&self) -> StatusEvent {
        lock(&self.inner.current).clone()
    }

    fn acquire(&self) -> ConnectionGuard {
        let mut conn = lock(&self.inner.conn);
        conn.subscribers += 1;

        if conn.shutdown.is_none() {
            let (tx, rx) = watch::channel(false);
            conn.shutdown = Some(tx);
            conn.generation += 1;

            let inner = Arc::clone(&self.inner);
            tokio::spawn(run_connection(inner, conn.generation, rx));
        }

        ConnectionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        lock(&self.inner.conn).subscribers
    }
}

impl TradeSource for FeedObserver {
    fn trades(&self) -> TradeStream {
        FeedObserver::trades(self)
    }
}

/// One subscriber's share of the physical connection.
struct ConnectionGuard {
    inner: Arc<Inner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut conn = lock(&self.inner.conn);
        conn.subscribers = conn.subscribers.saturating_sub(1);
        if conn.subscribers == 0 {
            if let Some(tx) = conn.shutdown.take() {
                let _ = tx.send(true);
            }
        }
    }
}

/// Receiving half of the shared trade stream.
pub struct TradeStream {
    rx: broadcast::Receiver<TradeEvent>,
    _guard: Option<ConnectionGuard>,
}

impl TradeStream {
    /// Next trade event. Lagged receivers skip missed events and keep going;
    /// `None` only when the producing side has gone away entirely.
    pub async fn recv(&mut self) -> Option<TradeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "trade subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wrap a raw receiver without tying it to the shared connection.
    /// For in-process producers and test feeds.
    pub fn detached(rx: broadcast::Receiver<TradeEvent>) -> Self {
        Self { rx, _guard: None }
    }
}

/// Receiving half of the shared status stream.
pub struct StatusStream {
    rx: broadcast::Receiver<StatusEvent>,
    _guard: Option<ConnectionGuard>,
}

impl StatusStream {
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "status subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// The connection task: one per "first subscriber → last unsubscribe" span.
///
/// Transitions: Connecting → Connected; on transport drop Reconnecting, on a
/// failed attempt Failed, then retry after backoff. A clean shutdown (last
/// subscriber gone) emits Disconnected and exits.
async fn run_connection(inner: Arc<Inner>, generation: u64, mut shutdown: watch::Receiver<bool>) {
    let mut backoff = Backoff::new();

    emit(&inner, generation, ConnectionStatus::Connecting, None);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                emit(&inner, generation, ConnectionStatus::Disconnected, None);
                return;
            }
            res = connect_async(inner.cfg.url.as_str()) => {
                match res {
                    Ok((ws, _)) => {
                        backoff.reset();
                        emit(&inner, generation, ConnectionStatus::Connected, None);

                        let (mut write, mut read) = ws.split();
                        let reason = loop {
                            tokio::select! {
                                _ = shutdown.changed() => {
                                    let _ = write.send(Message::Close(None)).await;
                                    emit(&inner, generation, ConnectionStatus::Disconnected, None);
                                    return;
                                }
                                msg = read.next() => match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        if let Some(ev) = parser::parse_trade(&text) {
                                            // No subscribers is fine; send only
                                            // fails when every receiver is gone.
                                            let _ = inner.trade_tx.send(ev);
                                        }
                                    }
                                    Some(Ok(Message::Ping(payload))) => {
                                        let _ = write.send(Message::Pong(payload)).await;
                                    }
                                    Some(Ok(Message::Close(_))) => {
                                        break Some(FeedError::ConnectionClosed);
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => break Some(FeedError::Transport(e)),
                                    None => break None,
                                }
                            }
                        };

                        emit(&inner, generation, ConnectionStatus::Reconnecting, reason);
                    }
                    Err(e) => {
                        emit(&inner, generation, ConnectionStatus::Failed, Some(FeedError::Transport(e)));
                    }
                }

                let delay = backoff.next_delay();
                tokio::select! {
                    _ = shutdown.changed() => {
                        emit(&inner, generation, ConnectionStatus::Disconnected, None);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Record and broadcast a status transition, unless the reporting task has
/// been superseded. The generation check and the snapshot update happen under
/// the same lock that `acquire` bumps the generation under, so a finishing
/// task can never overwrite the transitions of the task that replaced it.
fn emit(inner: &Inner, generation: u64, status: ConnectionStatus, error: Option<FeedError>) {
    let conn = lock(&inner.conn);
    if conn.generation != generation {
        tracing::debug!(%status, "ignoring status from a superseded connection task");
        return;
    }

    let ev = StatusEvent::now(status, error.map(|e| e.to_string()));

    match &ev.error {
        Some(err) => tracing::warn!(status = %ev.status, error = %err, "feed status"),
        None => tracing::info!(status = %ev.status, "feed status"),
    }

    *lock(&inner.current) = ev.clone();
    drop(conn);
    let _ = inner.status_tx.send(ev);
}

/// Lock helper that shrugs off poisoning; these mutexes guard plain data.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriptions_are_reference_counted() {
        // Nothing listens on this port; the task will sit in backoff, which
        // is irrelevant to the counting under test.
        let observer = FeedObserver::new(FeedConfig::new("ws://127.0.0.1:1"));
        assert_eq!(observer.subscriber_count(), 0);

        let t1 = observer.trades();
        let t2 = observer.trades();
        let s1 = observer.status_stream();
        assert_eq!(observer.subscriber_count(), 3);

        drop(t1);
        drop(s1);
        assert_eq!(observer.subscriber_count(), 1);

        drop(t2);
        assert_eq!(observer.subscriber_count(), 0);
        assert!(lock(&observer.inner.conn).shutdown.is_none());
    }

    #[tokio::test]
    async fn current_status_defaults_to_disconnected() {
        let observer = FeedObserver::new(FeedConfig::new("ws://127.0.0.1:1"));
        assert_eq!(
            observer.current_status().status,
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn lagged_stream_skips_ahead_and_keeps_delivering() {
        use rust_decimal::Decimal;

        let (tx, rx) = broadcast::channel(4);
        let mut stream = TradeStream::detached(rx);

        // Overrun the 4-slot buffer; the oldest events get evicted.
        for price in 1..=20u32 {
            let raw = format!(r#"{{"message":{{"coin":"BTC","price":{price}}}}}"#);
            let ev = crate::parser::parse_trade(&raw).expect("fixture frame parses");
            tx.send(ev).expect("subscriber is live");
        }

        // The overrun never surfaces as an error or an end-of-stream; the
        // receiver resumes at the oldest event still buffered.
        let first = stream.recv().await.expect("stream survives the overrun");
        assert!(first.msg.price > Decimal::ONE);

        // It drains what is left of the buffer...
        let mut last = first;
        while last.msg.price != Decimal::from(20u32) {
            last = stream.recv().await.expect("buffered events still delivered");
        }

        // ...and later events keep flowing.
        let ev = crate::parser::parse_trade(r#"{"message":{"coin":"BTC","price":21}}"#)
            .expect("fixture frame parses");
        tx.send(ev).expect("subscriber is live");
        let next = stream.recv().await.expect("delivery continues after a lag");
        assert_eq!(next.msg.price, Decimal::from(21u32));
    }

    #[tokio::test]
    async fn superseded_task_cannot_overwrite_live_status() {
        let observer = FeedObserver::new(FeedConfig::new("ws://127.0.0.1:1"));
        lock(&observer.inner.conn).generation = 2;

        emit(&observer.inner, 2, ConnectionStatus::Connected, None);
        assert_eq!(observer.current_status().status, ConnectionStatus::Connected);

        // A previous task winding down after the handoff reports its final
        // Disconnected; the live task's status must stand.
        emit(&observer.inner, 1, ConnectionStatus::Disconnected, None);
        assert_eq!(observer.current_status().status, ConnectionStatus::Connected);

        // The live task itself still reports freely.
        emit(&observer.inner, 2, ConnectionStatus::Reconnecting, None);
        assert_eq!(
            observer.current_status().status,
            ConnectionStatus::Reconnecting
        );
    }

    #[tokio::test]
    async fn detached_stream_delivers_broadcast_events() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = TradeStream::detached(rx);

        let ev = crate::parser::parse_trade(r#"{"message":{"coin":"BTC","price":100.0}}"#)
            .expect("fixture frame parses");
        tx.send(ev).expect("subscriber is live");

        let got = stream.recv().await.expect("event should arrive");
        assert_eq!(got.coin, "BTC");
    }
}
