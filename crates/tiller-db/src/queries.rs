//! Query functions organized by table.

pub mod pools;
pub mod positions;
pub mod requests;

use crate::{DbError, Result};

/// Decode a 32-byte id column.
pub(crate) fn id32(value: Vec<u8>, what: &str) -> Result<[u8; 32]> {
    <[u8; 32]>::try_from(value.as_slice())
        .map_err(|_| DbError::Corrupt(format!("{what}: expected 32 bytes, got {}", value.len())))
}

/// Decode a u128 stored as decimal text.
pub(crate) fn parse_u128(value: String, what: &str) -> Result<u128> {
    value
        .parse::<u128>()
        .map_err(|e| DbError::Corrupt(format!("{what}: {e}")))
}
