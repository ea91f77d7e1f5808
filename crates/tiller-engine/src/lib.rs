//! # tiller-engine
//!
//! Proportional reward-accrual ledger.
//!
//! Accounts stake a deposit token into pools; a reward token is emitted per
//! unit time and split across pools by allocation weight and across
//! positions by time-weighted stake. Settlement is lazy: any interaction
//! with a pool first rolls its per-share accumulator forward, then touches
//! only the caller's position, so every operation is O(1) in the number of
//! participants.
//!
//! ## Modules
//!
//! - [`pool`] — Pool records and staged settlement
//! - [`position`] — Per-account stake and reward debt
//! - [`queue`] — Timed withdrawal-request queue
//! - [`registry`] — Pool collection and allocation weighting
//! - [`ledger`] — The mutating operations (deposit/withdraw/claim/...)
//! - [`gates`] — External collaborator traits (transfers, access, pause)
//! - [`admin`] — Two-phase pending/accept admin handshake
//! - [`stub`] — In-memory collaborators for tests and fixtures

pub mod admin;
pub mod gates;
pub mod ledger;
pub mod pool;
pub mod position;
pub mod queue;
pub mod registry;
pub mod stub;

use gates::TransferError;
use tiller_math::MathError;

/// Error types for ledger operations.
///
/// Every error is local to the failing call: a failed operation commits no
/// state, and callers decide whether to resubmit.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Operation addressed a deposit token with no registered pool.
    #[error("no pool registered for deposit token {deposit_token}")]
    PoolNotFound {
        /// Hex-encoded deposit token id.
        deposit_token: String,
    },

    /// A pool backed by this deposit token already exists in the context.
    #[error("deposit token {deposit_token} already backs a pool")]
    PoolAlreadyExists {
        /// Hex-encoded deposit token id.
        deposit_token: String,
    },

    /// Withdraw or withdrawal request exceeds the available staked amount.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount the caller asked for.
        requested: u64,
        /// Amount actually available (staked minus already-requested).
        available: u64,
    },

    /// Caller failed the access gate for an admin action.
    #[error("caller is not authorized for this action")]
    Unauthorized,

    /// New positions are blocked by the pause gate.
    #[error("new positions are paused")]
    Paused,

    /// The token-transfer collaborator refused a movement. No state from
    /// the failing call survives.
    #[error("token transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// Fatal arithmetic overflow in the accumulator or reward math.
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(#[from] MathError),

    /// A migrator returned fewer (or more) replacement units than it was
    /// handed.
    #[error("migration returned {received} units, expected {sent}")]
    MigrationShortfall {
        /// Units of the old deposit token handed over.
        sent: u64,
        /// Units of the replacement token received.
        received: u64,
    },
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

fn token_hex(token: &tiller_types::TokenId) -> String {
    hex::encode(token)
}
