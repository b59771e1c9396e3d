//! Reversible transformation of values into payloads that are safe to store on a single log line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::Result;

/// Turns arbitrary bytes into a line-safe payload and back.
///
/// Implementations must guarantee `decode(encode(x)) == x` and that `encode` never produces the
/// log delimiter (`:`) or a line break.
///
/// A payload that doesn't decode should be reported as [`Error::Decode`](crate::Error::Decode),
/// which carries whatever error the implementation produced.
pub trait Encoder: Send + Sync {
    fn encode(&self, value: &[u8]) -> String;
    fn decode(&self, payload: &str) -> Result<Vec<u8>>;
}

/// Standard-alphabet, padded base64. Its alphabet is `A-Z a-z 0-9 + / =`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Encoder;

impl Encoder for Base64Encoder {
    fn encode(&self, value: &[u8]) -> String {
        STANDARD.encode(value)
    }

    fn decode(&self, payload: &str) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(payload)?)
    }
}
