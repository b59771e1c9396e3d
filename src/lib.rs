//! A small persistent key-value store where every key expires.
//!
//! Values live in memory and in two flat files next to each other: a value log of
//! `key:base64-payload` lines and a metadata log of `key:expiry-millis` lines. Expiry is lazy: a
//! key past its TTL is only noticed, and removed, when somebody reads it. Deleting a key rewrites
//! both files without it.
//!
//! ```no_run
//! use ttlkv::{KvStore, Options};
//!
//! let store = KvStore::open(Options::in_dir("./data"))?;
//! store.put("greeting", "hello", 60)?;
//! assert_eq!(store.get("greeting")?, b"hello");
//! store.delete("greeting")?;
//! # Ok::<(), ttlkv::Error>(())
//! ```

mod clock;
mod encoder;
mod engine;
mod error;
mod index;
mod kv_store;
mod log_file;
mod options;
pub mod repl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use encoder::{Base64Encoder, Encoder};
pub use engine::KvsEngine;
pub use error::{Error, ErrorKind, Result};
pub use index::{ExpiryIndex, Index, ValueIndex};
pub use kv_store::KvStore;
pub use log_file::{LogFile, DEFAULT_MAX_SIZE, DELIMITER, SAFETY_MARGIN};
pub use options::{Options, DEFAULT_TTL};
