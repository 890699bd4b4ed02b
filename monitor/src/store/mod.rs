pub mod json_file;

use crate::model::MonitorRecord;

/// Durable storage for the registry's record set. The registry overwrites
/// the whole set after every mutation and reads it back once at startup.
#[async_trait::async_trait]
pub trait MonitorStore: Send + Sync {
    /// Read every persisted record. Absent storage loads as an empty set.
    async fn load_all(&self) -> anyhow::Result<Vec<MonitorRecord>>;

    /// Replace the persisted set wholesale.
    async fn save_all(&self, records: &[MonitorRecord]) -> anyhow::Result<()>;
}
