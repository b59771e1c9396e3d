use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::log_file::DEFAULT_MAX_SIZE;

pub const DEFAULT_VALUE_LOG: &str = "db.txt";
pub const DEFAULT_META_LOG: &str = "db-meta.txt";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Where a [`KvStore`](crate::KvStore) keeps its data and how it behaves.
#[derive(Debug, Clone)]
pub struct Options {
    /// Log of `key:payload` lines.
    pub value_log_path: PathBuf,

    /// Log of `key:expiry-millis` lines.
    pub meta_log_path: PathBuf,

    /// TTL used when a put asks for none.
    pub default_ttl: Duration,

    /// Cap on the size of each log file, in bytes.
    pub max_file_size: u64,

    /// fsync after every append.
    pub sync_writes: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::in_dir("./data")
    }
}

impl Options {
    /// Both logs inside `dir`, under their default names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            value_log_path: dir.join(DEFAULT_VALUE_LOG),
            meta_log_path: dir.join(DEFAULT_META_LOG),
            default_ttl: DEFAULT_TTL,
            max_file_size: DEFAULT_MAX_SIZE,
            sync_writes: false,
        }
    }

    pub fn with_value_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.value_log_path = path.into();
        self
    }

    pub fn with_meta_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.meta_log_path = path.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}
