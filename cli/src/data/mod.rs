pub mod history_store;
pub mod normalizer;
pub mod orchestrator;
pub mod snapshot_cache;

pub use history_store::HistoryStore;
pub use orchestrator::UpdateOrchestrator;
pub use snapshot_cache::{CacheError, SnapshotCache};
