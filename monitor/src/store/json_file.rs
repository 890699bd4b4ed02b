//! JSON-file record store.
//!
//! The record set lives as one JSON array at a configurable path. Saves
//! write a sibling temp file and rename it over the target, so a crash
//! mid-write leaves the previous snapshot intact rather than a truncated
//! file. A missing file or parent directory is created, not an error.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;

use super::MonitorStore;
use crate::model::MonitorRecord;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MonitorStore for JsonFileStore {
    async fn load_all(&self) -> anyhow::Result<Vec<MonitorRecord>> {
        self.ensure_parent().await?;

        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn save_all(&self, records: &[MonitorRecord]) -> anyhow::Result<()> {
        self.ensure_parent().await?;

        let json = serde_json::to_string_pretty(records).context("serializing monitor records")?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} into place", tmp.display()))?;

        Ok(())
    }
}
