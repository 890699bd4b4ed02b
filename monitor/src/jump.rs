//! JumpMonitor
//!
//! One per live registration. Consumes the shared trade stream filtered to a
//! single coin, samples it once per window, and compares each sampled price
//! against the previous one. The baseline rolls forward after every sample,
//! so the detector measures window-over-window movement, not drift from the
//! first observed price.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use feed::observer::{TradeSource, TradeStream};
use feed::types::TradeEvent;

use crate::alert::{AlertSink, alert_channel};
use crate::model::MonitorRecord;

/// Handle to a running monitor task. Dropping the handle does not stop the
/// task; call `halt`.
pub struct JumpMonitor {
    paused: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
}

impl JumpMonitor {
    /// Subscribe to the feed and start the sampling task.
    pub fn spawn(feed: &dyn TradeSource, record: &MonitorRecord, sink: Arc<dyn AlertSink>) -> Self {
        let paused = Arc::new(AtomicBool::new(record.paused));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = Sampler {
            stream: feed.trades(),
            coin: record.coin.to_uppercase(),
            user: record.user.clone(),
            window: record.window(),
            threshold: record.percentage_threshold,
            paused: Arc::clone(&paused),
            sink,
            stop: stop_rx,
        };
        tokio::spawn(task.run());

        Self {
            paused,
            stop: stop_tx,
        }
    }

    /// Mute or unmute alert delivery. The monitor keeps sampling and logging
    /// either way, and the baseline is untouched.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Detach from the trade stream, mid-window or pre-bootstrap alike.
    /// Idempotent.
    pub fn halt(&self) {
        let _ = self.stop.send(true);
    }
}

struct Sampler {
    stream: TradeStream,
    coin: String,
    user: String,
    window: Duration,
    threshold: Decimal,
    paused: Arc<AtomicBool>,
    sink: Arc<dyn AlertSink>,
    stop: watch::Receiver<bool>,
}

impl Sampler {
    async fn run(mut self) {
        // Bootstrap: the first matching trade is the baseline only; it is
        // never compared or alerted on.
        let mut baseline = tokio::select! {
            _ = self.stop.changed() => return,
            first = next_matching(&mut self.stream, &self.coin) => match first {
                Some(price) => price,
                None => return,
            },
        };
        tracing::debug!(coin = %self.coin, user = %self.user, baseline = %baseline, "baseline established");

        let mut ticks = tokio::time::interval_at(Instant::now() + self.window, self.window);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut latest: Option<TradeEvent> = None;
        loop {
            tokio::select! {
                _ = self.stop.changed() => return,
                ev = self.stream.recv() => match ev {
                    Some(ev) if ev.coin.eq_ignore_ascii_case(&self.coin) => {
                        // Later trades in the same window displace earlier ones.
                        latest = Some(ev);
                    }
                    Some(_) => {}
                    None => return,
                },
                _ = ticks.tick() => {
                    // A window with no trades is skipped outright: no alert,
                    // no baseline change, no catch-up.
                    if let Some(ev) = latest.take() {
                        baseline = self.sample(baseline, ev);
                    }
                }
            }
        }
    }

    /// Compare one sampled trade against the baseline; returns the new
    /// baseline (always the sampled price).
    fn sample(&self, baseline: Decimal, ev: TradeEvent) -> Decimal {
        let current = ev.msg.price;

        let Some(move_pct) = percentage_move(baseline, current) else {
            tracing::warn!(coin = %self.coin, price = %current, "zero baseline, skipping comparison");
            return current;
        };

        let text = format!(
            "{} moved by {:.2}% to ${} over {}",
            ev.display_name(),
            move_pct,
            current.normalize(),
            humanize_window(self.window),
        );

        // Inclusive trigger: a move exactly at the threshold alerts.
        if move_pct.abs() >= self.threshold {
            tracing::warn!(user = %self.user, coin = %self.coin, %text, "jump detected");

            if !self.paused.load(Ordering::Relaxed) {
                let sink = Arc::clone(&self.sink);
                let channel = alert_channel(&self.user);
                // Dispatched off the sampling task so a slow sink cannot
                // stall trade processing.
                tokio::spawn(async move {
                    if let Err(e) = sink.post(&channel, &text).await {
                        tracing::warn!(channel = %channel, error = %e, "alert delivery failed");
                    }
                });
            }
        } else {
            tracing::debug!(user = %self.user, coin = %self.coin, %text, "move below threshold");
        }

        current
    }
}

async fn next_matching(stream: &mut TradeStream, coin: &str) -> Option<Decimal> {
    loop {
        let ev = stream.recv().await?;
        if ev.coin.eq_ignore_ascii_case(coin) {
            return Some(ev.msg.price);
        }
    }
}

/// `(current / baseline − 1) × 100`, or `None` when the baseline is zero and
/// the percentage is undefined.
pub fn percentage_move(baseline: Decimal, current: Decimal) -> Option<Decimal> {
    if baseline.is_zero() {
        return None;
    }
    Some((current / baseline - Decimal::ONE) * Decimal::ONE_HUNDRED)
}

pub fn humanize_window(window: Duration) -> String {
    let secs = window.as_secs();
    let (value, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
