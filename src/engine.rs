use crate::Result;

/// The three operations a store offers to its callers. Values are raw bytes; a `ttl_secs` of 0
/// selects the store's default TTL.
pub trait KvsEngine {
    fn put(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether `key` is held at all, without checking or enforcing its expiry.
    fn contains_key(&self, key: &str) -> bool;
}
