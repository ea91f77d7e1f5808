//! External collaborator traits.
//!
//! The engine owns only accounting state. Actual token movement, admin
//! authorization, and pausing live behind these traits and are injected
//! into each call, which keeps the ledger deterministic and testable.
//! The clock is likewise injected: every operation takes `now: u64` and
//! the engine never reads a wall clock.

use tiller_types::{AccountId, AdminAction, TokenId};

/// Failure reported by the token-transfer collaborator.
///
/// A transfer failure aborts the whole ledger operation; no partial
/// settlement is committed.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransferError(pub String);

/// Moves tokens between external accounts and the engine's reserve.
///
/// `transfer_in` pulls `amount` of `token` from `from` into the reserve;
/// `transfer_out` pushes from the reserve to `to`. Implementations are
/// responsible for their own balance checks.
pub trait TokenTransfer {
    fn transfer_in(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError>;

    fn transfer_out(
        &mut self,
        token: &TokenId,
        to: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError>;
}

/// Authorization check consulted before admin operations.
pub trait AccessGate {
    fn is_authorized(&self, caller: &AccountId, action: AdminAction) -> bool;
}

/// Pause check consulted before operations that open new exposure
/// (`deposit`, `request_withdrawal`). Claims and matured withdrawals of
/// already-committed funds stay available while paused.
pub trait PauseGate {
    fn is_paused(&self) -> bool;
}

/// One-shot exchanger used by pool migration.
///
/// The ledger hands the pool's entire backing balance to
/// [`Migrator::account`], asks for the exchange, then pulls the
/// replacement tokens back from that same account. `exchange` must not
/// move tokens through the bank itself; it converts on the migrator's
/// own books and reports the replacement token and the amount made
/// available, so the ledger can reverse both legs if the exchange comes
/// up short.
pub trait Migrator {
    /// External account the backing balance is exchanged against.
    fn account(&self) -> AccountId;

    /// Convert `amount` of `deposit_token` now held by
    /// [`Migrator::account`]. Returns the replacement token and the
    /// amount made available there.
    fn exchange(
        &mut self,
        deposit_token: &TokenId,
        amount: u64,
    ) -> std::result::Result<(TokenId, u64), TransferError>;
}
