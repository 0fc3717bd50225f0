use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOCK_WAIT_MS: u64 = 250;
const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Engine tuning knobs. `from_env` mirrors the `RESV_*` environment
/// variables; unset or unparsable values fall back to defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where the reservation ledger lives.
    pub wal_path: PathBuf,
    /// Bounded wait for a vehicle's exclusive section before failing `Busy`.
    pub lock_wait: Duration,
    /// WAL appends since the last compaction before the compactor rewrites it.
    pub compact_threshold: u64,
}

impl EngineConfig {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }

    /// Build a config from `RESV_DATA_DIR`, `RESV_LOCK_WAIT_MS` and
    /// `RESV_COMPACT_THRESHOLD`.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("RESV_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let lock_wait_ms: u64 = std::env::var("RESV_LOCK_WAIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOCK_WAIT_MS);
        let compact_threshold: u64 = std::env::var("RESV_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);

        Self {
            wal_path: PathBuf::from(data_dir).join("reservations.wal"),
            lock_wait: Duration::from_millis(lock_wait_ms),
            compact_threshold,
        }
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }
}
