//! Per-account stake and reward debt.
//!
//! A position holds the staked amount, the reward debt, and any pending
//! withdrawal requests. Reward debt is the accumulator value already
//! credited to the position, scaled by its amount; pending reward is the
//! gross entitlement minus that debt. Positions are created on first
//! deposit and never deleted, so debt bookkeeping survives a full
//! withdraw-then-redeposit cycle.

use serde::{Deserialize, Serialize};
use tiller_math::{scaled_share, MathError};

use crate::queue::{self, WithdrawalRequest};
use crate::Result;

/// One account's stake in one pool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Position {
    /// Currently staked balance. Counts toward accrual until the moment
    /// it is actually removed, even while queued for withdrawal.
    pub amount: u64,
    /// `amount * acc_reward_per_share / SCALE` at last settlement.
    pub reward_debt: u128,
    /// Pending withdrawal requests, sorted by unlock time.
    pub requests: Vec<WithdrawalRequest>,
}

impl Position {
    /// Reward owed since the position's last interaction, against a
    /// freshly settled accumulator value.
    ///
    /// Calling this with a stale accumulator undercounts; the ledger only
    /// evaluates it inside a staged settlement.
    ///
    /// # Errors
    ///
    /// - [`crate::LedgerError::ArithmeticOverflow`] if the entitlement
    ///   does not fit, or if the debt exceeds the gross entitlement
    ///   (a violated invariant, reported rather than wrapped)
    pub fn pending_reward(&self, acc_reward_per_share: u128) -> Result<u64> {
        let gross = scaled_share(self.amount, acc_reward_per_share)?;
        let pending = gross
            .checked_sub(self.reward_debt)
            .ok_or(MathError::Overflow)?;
        Ok(u64::try_from(pending).map_err(|_| MathError::Overflow)?)
    }

    /// Total amount tied up in withdrawal requests, matured or not.
    pub fn requested_total(&self) -> u64 {
        queue::requested_total(&self.requests)
    }

    /// Staked amount not yet committed to a withdrawal request.
    pub fn available(&self) -> u64 {
        self.amount.saturating_sub(self.requested_total())
    }
}
