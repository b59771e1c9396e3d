//! In-memory indexes rebuilt from a [`LogFile`] at startup.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::log_file::LogFile;
use crate::Result;

/// Key to encoded payload.
pub type ValueIndex = Index<String>;

/// Key to expiry instant in epoch milliseconds.
pub type ExpiryIndex = Index<u64>;

#[derive(Debug)]
pub struct Index<T> {
    map: HashMap<String, T>,
}

impl<T> Default for Index<T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<T> Index<T> {
    /// Builds an index from every line of `log`. `parse` turns the field after the delimiter into
    /// a `T`. When a key appears more than once, the last line wins.
    ///
    /// Lines that `parse` rejects, and a last line cut short by a crash, are left out of the index.
    /// Their keys are returned alongside it so the caller can clear them off disk.
    pub fn replay(
        log: &LogFile,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<(Self, Vec<String>)> {
        let mut index = Self::default();
        let mut skipped = Vec::new();
        for line in log.lines()? {
            if !line.complete {
                warn!(path = ?log.path(), key = %line.key, "Skipping torn last line");
                skipped.push(line.key);
                continue;
            }
            match parse(&line.field) {
                Some(value) => {
                    if index.map.insert(line.key, value).is_some() {
                        warn!(path = ?log.path(), "Log holds more than one line for a key");
                    }
                }
                None => {
                    warn!(path = ?log.path(), key = %line.key, "Skipping unparsable line");
                    skipped.push(line.key);
                }
            }
        }
        debug!(path = ?log.path(), len = index.len(), skipped = skipped.len(), "Replayed log");
        Ok((index, skipped))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: String, value: T) -> Option<T> {
        self.map.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl ValueIndex {
    pub fn replay_values(log: &LogFile) -> Result<(Self, Vec<String>)> {
        Self::replay(log, |payload| Some(payload.to_owned()))
    }
}

impl ExpiryIndex {
    pub fn replay_expiries(log: &LogFile) -> Result<(Self, Vec<String>)> {
        Self::replay(log, |timestamp| timestamp.parse().ok())
    }
}
