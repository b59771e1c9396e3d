//! A key-value store with per-key expiry, backed by two line-oriented logs: one for values and
//! one for expiry instants.

use std::collections::BTreeSet;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::encoder::{Base64Encoder, Encoder};
use crate::engine::KvsEngine;
use crate::index::{ExpiryIndex, ValueIndex};
use crate::log_file::{format_line, LogFile, DELIMITER};
use crate::{Error, Options, Result};

/// Associates values with keys until they expire. Keys can be inserted once, looked up, and
/// removed; there is no overwrite.
///
/// Every operation runs under one lock, so a put and a delete of the same key can never leave
/// the two logs disagreeing. Rewrites hold that lock for a full pass over a log file.
pub struct KvStore<C = SystemClock, E = Base64Encoder> {
    clock: C,
    encoder: E,
    options: Options,
    state: Mutex<State>,
}

/// Both logs and the indexes mirroring them. The indexes always hold the same key set.
struct State {
    value_log: LogFile,
    meta_log: LogFile,
    values: ValueIndex,
    expiries: ExpiryIndex,
}

impl KvStore {
    /// Opens (or creates) the logs named in `options`, using wall-clock time and base64 values.
    pub fn open(options: Options) -> Result<Self> {
        Self::open_with(options, SystemClock, Base64Encoder)
    }
}

impl<C: Clock, E: Encoder> KvStore<C, E> {
    /// Opens (or creates) the logs named in `options` and rebuilds the indexes from them.
    ///
    /// A key found in only one of the logs, or whose line in either log is unreadable, is the
    /// remains of a put that crashed half way; it is removed from both logs.
    pub fn open_with(options: Options, clock: C, encoder: E) -> Result<Self> {
        let value_log = LogFile::ensure_exists(
            &options.value_log_path,
            options.max_file_size,
            options.sync_writes,
        )?;
        let meta_log = LogFile::ensure_exists(
            &options.meta_log_path,
            options.max_file_size,
            options.sync_writes,
        )?;

        let (values, skipped_values) = ValueIndex::replay_values(&value_log)?;
        let (expiries, skipped_expiries) = ExpiryIndex::replay_expiries(&meta_log)?;
        let mut state = State {
            values,
            expiries,
            value_log,
            meta_log,
        };
        state.drop_orphans(skipped_values.into_iter().chain(skipped_expiries))?;

        info!(
            value_log = ?options.value_log_path,
            meta_log = ?options.meta_log_path,
            keys = state.values.len(),
            "Opened store",
        );

        Ok(Self {
            clock,
            encoder,
            options,
            state: Mutex::new(state),
        })
    }

    /// Stores `value` under `key` for `ttl_secs` seconds, or for the default TTL when `ttl_secs`
    /// is 0. Fails if the key is already present.
    ///
    /// The value line is written before the expiry line; if the second write fails the first is
    /// cut off again, so either both logs gain the key or neither does.
    pub fn put(&self, key: &str, value: impl AsRef<[u8]>, ttl_secs: u64) -> Result<()> {
        validate_key(key)?;
        let value = value.as_ref();
        if value.is_empty() {
            return Err(Error::EmptyValue);
        }

        let ttl = match ttl_secs {
            0 => self.options.default_ttl,
            secs => Duration::from_secs(secs),
        };
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let payload = self.encoder.encode(value);

        let mut state = self.state.lock();
        if state.values.contains(key) {
            debug!(key, "Key already present");
            return Err(Error::DuplicateKey(key.to_owned()));
        }
        let expiry = self.clock.now_millis().saturating_add(ttl_millis);

        let value_len = state.value_log.append(&format_line(key, &payload))?;
        if let Err(e) = state.meta_log.append(&format_line(key, expiry)) {
            warn!(?e, key, "Failed to write expiry, rolling back value");
            if let Err(rollback_err) = state.value_log.truncate(value_len) {
                // The store reconciles this orphan the next time it's opened.
                error!(?rollback_err, key, "Failed to roll back value");
            }
            return Err(e);
        }

        state.values.insert(key.to_owned(), payload);
        state.expiries.insert(key.to_owned(), expiry);
        debug!(key, expiry, "Stored key");

        Ok(())
    }

    /// Returns the value stored under `key`. A key whose TTL has elapsed is removed from disk and
    /// reported as [`Error::Expired`]; after that it is simply not found.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let payload = {
            let mut state = self.state.lock();
            if !state.values.contains(key) {
                debug!(key, "Key not found");
                return Err(Error::KeyNotFound(key.to_owned()));
            }

            let now = self.clock.now_millis();
            match state.expiries.get(key).copied() {
                Some(expiry) if now <= expiry => {}
                expiry => {
                    debug!(key, ?expiry, now, "Key expired, removing it");
                    state.remove(key)?;
                    return Err(Error::Expired(key.to_owned()));
                }
            }

            state
                .values
                .get(key)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound(key.to_owned()))?
        };

        self.encoder.decode(&payload)
    }

    /// Removes `key` from both logs and both indexes, whether or not it has expired.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.values.contains(key) {
            debug!(key, "Key to delete not found");
            return Err(Error::KeyNotFound(key.to_owned()));
        }
        debug!(key, "Key found, deleting it");
        state.remove(key)
    }

    /// Whether `key` is held, expired or not. Never evicts.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().values.contains(key)
    }

    /// Number of keys held, including ones that have expired but not yet been read.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl State {
    /// Rewrites `key` out of both logs, then forgets it.
    fn remove(&mut self, key: &str) -> Result<()> {
        self.value_log.rewrite_excluding(key)?;
        let meta_result = self.meta_log.rewrite_excluding(key);

        // The value is gone from disk by now, so the key is gone whatever happened to the expiry
        // line. A leftover expiry line is dropped as an orphan on the next open.
        self.values.remove(key);
        self.expiries.remove(key);

        if let Err(e) = &meta_result {
            warn!(?e, key, "Failed to remove expiry line");
        }
        meta_result.map(|_| ())
    }

    /// Removes from both logs and both indexes every key in `skipped` (lines replay couldn't
    /// use) and every key that only one of the indexes knows about.
    fn drop_orphans(&mut self, skipped: impl IntoIterator<Item = String>) -> Result<()> {
        let mut orphans: BTreeSet<String> = skipped.into_iter().collect();
        orphans.extend(
            self.values
                .keys()
                .filter(|key| !self.expiries.contains(key))
                .map(str::to_owned),
        );
        orphans.extend(
            self.expiries
                .keys()
                .filter(|key| !self.values.contains(key))
                .map(str::to_owned),
        );

        for key in orphans {
            warn!(%key, "Dropping key left behind by an incomplete put");
            self.value_log.rewrite_excluding(&key)?;
            self.meta_log.rewrite_excluding(&key)?;
            self.values.remove(&key);
            self.expiries.remove(&key);
        }

        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot be empty"));
    }
    if key.contains(DELIMITER) {
        return Err(Error::InvalidKey("key cannot contain ':'"));
    }
    if key.contains(['\n', '\r']) {
        return Err(Error::InvalidKey("key cannot contain line breaks"));
    }
    Ok(())
}

impl<C: Clock, E: Encoder> KvsEngine for KvStore<C, E> {
    fn put(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        KvStore::put(self, key, value, ttl_secs)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        KvStore::get(self, key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        KvStore::delete(self, key)
    }

    fn contains_key(&self, key: &str) -> bool {
        KvStore::contains_key(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ErrorKind;

    fn open(dir: &tempfile::TempDir) -> (KvStore<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000);
        let store =
            KvStore::open_with(Options::in_dir(dir.path()), clock.clone(), Base64Encoder).unwrap();
        (store, clock)
    }

    #[test]
    fn keys_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);

        for key in ["", "a:b", "a\nb", "a\rb"] {
            let err = store.put(key, "v", 0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{key:?}");
        }
        assert!(matches!(store.put("k", "", 0), Err(Error::EmptyValue)));
        assert!(store.is_empty());
        assert_eq!(std::fs::read(&store.options().value_log_path).unwrap(), b"");
    }

    #[test]
    fn zero_ttl_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = open(&dir);
        store.put("k", "v", 0).unwrap();

        let meta = std::fs::read_to_string(&store.options().meta_log_path).unwrap();
        assert_eq!(meta, format!("k:{}\n", 1_000 + 86_400_000));

        clock.advance(86_400_000);
        assert_eq!(store.get("k").unwrap(), b"v");
        clock.advance(1);
        assert!(matches!(store.get("k"), Err(Error::Expired(_))));
    }

    #[test]
    fn values_are_stored_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store.put("greeting", "hi: there", 10).unwrap();

        let values = std::fs::read_to_string(&store.options().value_log_path).unwrap();
        assert_eq!(values, "greeting:aGk6IHRoZXJl\n");
    }

    /// Hands out payloads it can't read back.
    struct ForgetfulEncoder;

    impl Encoder for ForgetfulEncoder {
        fn encode(&self, value: &[u8]) -> String {
            format!("len{}", value.len())
        }

        fn decode(&self, payload: &str) -> Result<Vec<u8>> {
            Err(Error::Decode(format!("cannot recover {payload}").into()))
        }
    }

    #[test]
    fn encoder_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open_with(
            Options::in_dir(dir.path()),
            ManualClock::new(0),
            ForgetfulEncoder,
        )
        .unwrap();
        store.put("k", "abc", 0).unwrap();

        let err = store.get("k").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "Corrupt stored value: cannot recover len3");
        assert!(store.contains_key("k"));
    }

    #[test]
    fn contains_key_does_not_evict() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = open(&dir);
        store.put("k", "v", 1).unwrap();
        clock.advance(5_000);

        assert!(store.contains_key("k"));
        assert_eq!(store.len(), 1);
    }
}
