//! Pool records and staged settlement.
//!
//! A pool is one (reward token, deposit token) pair with an allocation
//! weight and a per-share accumulator. Settlement rolls the accumulator
//! forward lazily; it is computed as a [`Settlement`] delta first and
//! committed only after the calling operation's external transfers have
//! succeeded, so a failed transfer leaves the pool untouched.
//!
//! ## Accumulator
//!
//! ```text
//! reward = elapsed * rate * weight / total_weight
//! acc_reward_per_share += reward * SCALE / total_staked
//! ```
//!
//! While `total_staked` is zero the accumulator does not move and the
//! emission for that interval is simply never minted. That is the
//! documented behavior of the accounting being modeled, not a bug:
//! reward tokens are pulled from the emission source only when owed to a
//! nonzero-supply pool.

use serde::{Deserialize, Serialize};
use tiller_math::{acc_delta, pool_reward};
use tiller_types::TokenId;

use crate::Result;

/// Stable pool handle within one reward-token context.
///
/// Pools are addressed externally by deposit token, but positions key on
/// this id so that migrating the deposit token never re-keys a position.
pub type PoolId = u32;

/// One staking pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    /// Asset users stake. Changes only through migration.
    pub deposit_token: TokenId,
    /// Asset distributed as reward.
    pub reward_token: TokenId,
    /// Share of the context's emission: `weight / total_weight`.
    pub allocation_weight: u64,
    /// Per-share accumulator at `SCALE` fixed-point precision.
    /// Monotonically non-decreasing while `total_staked > 0`.
    pub acc_reward_per_share: u128,
    /// Time up to which the accumulator has been settled.
    pub last_settlement_time: u64,
    /// Sum of all positions' staked amounts in this pool.
    pub total_staked: u64,
    /// Emission schedule start. Accrual before this point is ignored.
    pub start_time: u64,
    /// Optional emission schedule end. Accrual stops exactly here.
    pub end_time: Option<u64>,
    /// Lock period applied to withdrawal requests, in time units.
    pub lock_period: u64,
}

/// A computed settlement, staged for commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Newly emitted reward owed to this pool for the settled interval.
    pub reward: u64,
    /// Accumulator value after applying `reward`.
    pub acc_reward_per_share: u128,
    /// New `last_settlement_time`; never past the schedule end.
    pub settled_to: u64,
}

impl Pool {
    /// Create a fresh pool with an empty accumulator.
    pub fn new(
        deposit_token: TokenId,
        reward_token: TokenId,
        allocation_weight: u64,
        lock_period: u64,
        start_time: u64,
        end_time: Option<u64>,
        now: u64,
    ) -> Self {
        Self {
            deposit_token,
            reward_token,
            allocation_weight,
            acc_reward_per_share: 0,
            last_settlement_time: now,
            total_staked: 0,
            start_time,
            end_time,
            lock_period,
        }
    }

    /// Clamp a point in time into the pool's emission schedule.
    fn clamp_to_schedule(&self, t: u64) -> u64 {
        let t = t.max(self.start_time);
        match self.end_time {
            Some(end) => t.min(end),
            None => t,
        }
    }

    /// Compute the settlement delta up to `now` without mutating the pool.
    ///
    /// With nothing staked the accumulator stays put and the settlement
    /// only advances the clock. Elapsed time is clamped to the emission
    /// schedule at both ends and floored at zero, so settling twice at the
    /// same instant, or anywhere past `end_time`, adds nothing.
    ///
    /// # Errors
    ///
    /// - [`crate::LedgerError::ArithmeticOverflow`] if the reward or
    ///   accumulator computation does not fit
    pub fn settle_at(&self, reward_rate: u64, total_allocation_weight: u64, now: u64) -> Result<Settlement> {
        // Never regress the settlement clock, never pass the schedule end.
        let settled_to = match self.end_time {
            Some(end) => now.min(end),
            None => now,
        }
        .max(self.last_settlement_time);

        if self.total_staked == 0 || self.allocation_weight == 0 {
            return Ok(Settlement {
                reward: 0,
                acc_reward_per_share: self.acc_reward_per_share,
                settled_to,
            });
        }

        let elapsed = self
            .clamp_to_schedule(now)
            .saturating_sub(self.clamp_to_schedule(self.last_settlement_time));

        let reward = pool_reward(elapsed, reward_rate, self.allocation_weight, total_allocation_weight)?;
        let delta = acc_delta(reward, self.total_staked)?;
        let acc = self
            .acc_reward_per_share
            .checked_add(delta)
            .ok_or(tiller_math::MathError::Overflow)?;

        Ok(Settlement {
            reward,
            acc_reward_per_share: acc,
            settled_to,
        })
    }

    /// Apply a staged settlement. Infallible: all checked arithmetic
    /// happened in [`Pool::settle_at`].
    pub fn commit(&mut self, settlement: &Settlement) {
        self.acc_reward_per_share = settlement.acc_reward_per_share;
        self.last_settlement_time = settlement.settled_to;
    }
}
