//! # tiller-types
//!
//! Shared domain types used across the Tiller workspace.
//!
//! Tokens and accounts are opaque 32-byte identifiers. The ledger never
//! inspects them; they only key pools, positions, and balance movements.

use serde::{Deserialize, Serialize};

/// Identifier of a fungible token (deposit or reward asset).
pub type TokenId = [u8; 32];

/// Identifier of an account holding or receiving tokens.
pub type AccountId = [u8; 32];

/// Administrative actions checked against the access gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    AddPool,
    SetAllocationWeight,
    SetRewardRate,
    SetLockPeriod,
    Migrate,
}

/// Build a token or account id from a short human-readable tag.
///
/// Pads the tag with zeroes; intended for tests and fixtures where ids
/// are symbolic rather than derived from key material.
pub fn id_from_tag(tag: &str) -> [u8; 32] {
    let mut id = [0u8; 32];
    let bytes = tag.as_bytes();
    let len = bytes.len().min(32);
    id[..len].copy_from_slice(&bytes[..len]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_tag_padded() {
        let id = id_from_tag("gov");
        assert_eq!(&id[..3], b"gov");
        assert!(id[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_id_from_tag_distinct() {
        assert_ne!(id_from_tag("lp-a"), id_from_tag("lp-b"));
    }

    #[test]
    fn test_id_from_tag_truncates_long_tag() {
        let long = "x".repeat(64);
        let id = id_from_tag(&long);
        assert_eq!(id, [b'x'; 32]);
    }

    #[test]
    fn test_admin_action_serializes_snake_case() {
        let json = serde_json::to_string(&AdminAction::SetAllocationWeight).expect("serialize");
        assert_eq!(json, "\"set_allocation_weight\"");
        let back: AdminAction = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, AdminAction::SetAllocationWeight);
    }
}
