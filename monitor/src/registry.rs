//! MonitorRegistry
//!
//! Owns every live JumpMonitor, keyed by (user, coin, window).
//! Responsibilities:
//!   • create / replace / pause / resume / clear / list monitors
//!   • persist the record set after every mutation
//!   • restore the set at startup, re-deriving baselines from live trades
//!
//! One mutex serializes all mutating operations across both the in-memory
//! table and the synchronous save, so the persisted file always matches the
//! last completed mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use feed::observer::TradeSource;

use crate::alert::AlertSink;
use crate::jump::JumpMonitor;
use crate::model::{MonitorKey, MonitorRecord, validate};
use crate::store::MonitorStore;

struct Entry {
    record: MonitorRecord,
    monitor: JumpMonitor,
}

pub struct MonitorRegistry<S: MonitorStore> {
    entries: Mutex<HashMap<MonitorKey, Entry>>,
    store: Arc<S>,
    feed: Arc<dyn TradeSource>,
    sink: Arc<dyn AlertSink>,
}

impl<S: MonitorStore> MonitorRegistry<S> {
    pub fn new(store: Arc<S>, feed: Arc<dyn TradeSource>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            store,
            feed,
            sink,
        }
    }

    /// Restore persisted monitors. Call once at startup, before serving any
    /// other operation. Each restored monitor bootstraps a fresh baseline
    /// from the next live trade; no price survives a restart.
    pub async fn load(&self) -> anyhow::Result<()> {
        let records = self
            .store
            .load_all()
            .await
            .context("loading persisted monitors")?;

        let mut entries = self.entries.lock().await;
        for record in records {
            let key = record.key();
            if entries.contains_key(&key) {
                tracing::warn!(user = %key.user, coin = %key.coin, window_secs = key.window_secs,
                    "duplicate persisted record, keeping the first");
                continue;
            }
            let monitor = JumpMonitor::spawn(self.feed.as_ref(), &record, Arc::clone(&self.sink));
            entries.insert(key, Entry { record, monitor });
        }

        tracing::info!(count = entries.len(), "monitors restored");
        Ok(())
    }

    /// Register a monitor for (user, coin, window).
    ///
    /// An existing monitor under the same key is always replaced, with a
    /// fresh baseline, even when only the threshold changed. `None` for the
    /// threshold removes the entry instead. Either way the resulting table
    /// is persisted before returning.
    pub async fn monitor(
        &self,
        user: &str,
        coin: &str,
        window: Duration,
        threshold: Option<Decimal>,
    ) -> anyhow::Result<()> {
        if let Some(threshold) = threshold {
            validate(window, threshold)?;
        }

        let coin = coin.trim().to_uppercase();
        let key = MonitorKey {
            user: user.to_string(),
            coin: coin.clone(),
            window_secs: window.as_secs(),
        };

        let mut entries = self.entries.lock().await;

        if let Some(old) = entries.remove(&key) {
            old.monitor.halt();
            tracing::info!(user, coin = %coin, window_secs = key.window_secs, "replacing existing monitor");
        }

        if let Some(threshold) = threshold {
            let record = MonitorRecord {
                user: user.to_string(),
                coin,
                window_seconds: key.window_secs,
                percentage_threshold: threshold,
                paused: false,
            };
            let monitor = JumpMonitor::spawn(self.feed.as_ref(), &record, Arc::clone(&self.sink));
            entries.insert(key, Entry { record, monitor });
        }

        self.save_locked(&entries).await
    }

    /// Mute alert delivery for all of the user's monitors. Sampling and move
    /// logging continue. No-op when the user has none.
    pub async fn pause(&self, user: &str) -> anyhow::Result<()> {
        self.set_paused(user, true).await
    }

    /// Restore alert delivery without touching any baseline.
    pub async fn resume(&self, user: &str) -> anyhow::Result<()> {
        self.set_paused(user, false).await
    }

    async fn set_paused(&self, user: &str, paused: bool) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;

        let mut touched = 0usize;
        for entry in entries.values_mut().filter(|e| e.record.user == user) {
            entry.record.paused = paused;
            entry.monitor.set_paused(paused);
            touched += 1;
        }
        tracing::info!(user, paused, touched, "pause flag updated");

        self.save_locked(&entries).await
    }

    /// Remove all of the user's monitors, optionally restricted to one coin.
    /// Returns how many were removed.
    pub async fn clear(&self, user: &str, coin: Option<&str>) -> anyhow::Result<usize> {
        let coin = coin
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let mut entries = self.entries.lock().await;

        let keys: Vec<MonitorKey> = entries
            .keys()
            .filter(|k| k.user == user && coin.as_deref().is_none_or(|c| k.coin == c))
            .cloned()
            .collect();

        for key in &keys {
            if let Some(entry) = entries.remove(key) {
                entry.monitor.halt();
            }
        }
        tracing::info!(user, removed = keys.len(), "monitors cleared");

        self.save_locked(&entries).await?;
        Ok(keys.len())
    }

    /// Point-in-time snapshot of the user's monitors, ordered for display.
    pub async fn list(&self, user: &str) -> Vec<MonitorRecord> {
        let entries = self.entries.lock().await;

        let mut records: Vec<MonitorRecord> = entries
            .values()
            .filter(|e| e.record.user == user)
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| {
            (&a.coin, a.window_seconds).cmp(&(&b.coin, b.window_seconds))
        });
        records
    }

    /// Halt every monitor without clearing the persisted set; the next
    /// `load` restores them.
    pub async fn shutdown(&self) {
        let mut entries = self.entries.lock().await;
        for entry in entries.values() {
            entry.monitor.halt();
        }
        let halted = entries.len();
        entries.clear();
        tracing::info!(halted, "registry shut down");
    }

    async fn save_locked(&self, entries: &HashMap<MonitorKey, Entry>) -> anyhow::Result<()> {
        let records: Vec<MonitorRecord> = entries.values().map(|e| e.record.clone()).collect();
        self.store
            .save_all(&records)
            .await
            .context("persisting monitors")
    }
}
