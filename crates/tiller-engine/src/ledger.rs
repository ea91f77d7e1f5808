//! The mutating ledger operations.
//!
//! A [`Ledger`] is one reward-token context: a pool registry plus every
//! position in it. All mutating operations take `&mut self`, so the
//! settle-then-mutate sequence of each call is atomic by construction —
//! no other operation can observe a pool between its settlement and the
//! balance change that follows. Callers sharing a ledger across threads
//! wrap it in a mutex; one lock per context also covers the
//! settle-every-pool ordering that a rate change requires.
//!
//! Every operation follows the same shape:
//!
//! 1. **Stage** — resolve the pool, compute the settlement delta and the
//!    caller's pending reward, and pre-check all new balances.
//! 2. **Transfer** — run the external token movements (fund the reward
//!    reserve from the emission source, pay the pending reward, move the
//!    deposit token).
//! 3. **Commit** — apply the staged settlement and balance changes.
//!
//! A failed transfer aborts before commit, so no partial settlement ever
//! survives. Transfers already completed within the failing call are
//! compensated: each operation stages its movements as reversible steps,
//! and a failure unwinds the completed prefix in reverse order, so the
//! external world is restored along with the ledger. The transfer
//! collaborator itself is expected to be transactional per call.

use std::collections::BTreeMap;

use tiller_math::scaled_share;
use tiller_types::{AccountId, AdminAction, TokenId};

use crate::gates::{AccessGate, Migrator, PauseGate, TokenTransfer, TransferError};
use crate::pool::{PoolId, Settlement};
use crate::position::Position;
use crate::queue::{self, WithdrawalRequest};
use crate::registry::PoolRegistry;
use crate::{LedgerError, Result};

/// One reward-token context and all of its positions.
#[derive(Clone, Debug)]
pub struct Ledger {
    registry: PoolRegistry,
    positions: BTreeMap<(PoolId, AccountId), Position>,
    /// Account the reward emission is pulled from at settlement time.
    /// Rewards enter the reserve only through this pull, so tokens sent
    /// to the reserve out-of-band are never folded into an epoch.
    emission_source: AccountId,
}

/// A staged operation: everything computed, nothing committed.
struct Staged {
    pool_id: PoolId,
    settlement: Settlement,
    pending: u64,
    reward_token: TokenId,
}

/// One directional token movement, reversible for unwinding.
#[derive(Clone, Copy, Debug)]
enum Step {
    /// Pull `amount` of `token` from `from` into the reserve.
    In {
        token: TokenId,
        from: AccountId,
        amount: u64,
    },
    /// Push `amount` of `token` from the reserve to `to`.
    Out {
        token: TokenId,
        to: AccountId,
        amount: u64,
    },
}

impl Step {
    fn apply(&self, bank: &mut dyn TokenTransfer) -> std::result::Result<(), TransferError> {
        match *self {
            Step::In { token, from, amount } => bank.transfer_in(&token, &from, amount),
            Step::Out { token, to, amount } => bank.transfer_out(&token, &to, amount),
        }
    }

    fn revert(&self, bank: &mut dyn TokenTransfer) -> std::result::Result<(), TransferError> {
        match *self {
            Step::In { token, from, amount } => bank.transfer_out(&token, &from, amount),
            Step::Out { token, to, amount } => bank.transfer_in(&token, &to, amount),
        }
    }
}

/// Reverse already-completed steps, newest first. A refund the
/// collaborator refuses cannot be retried from here; it is logged and
/// the original failure is still reported to the caller.
fn unwind(bank: &mut dyn TokenTransfer, done: &[Step]) {
    for step in done.iter().rev() {
        if let Err(err) = step.revert(bank) {
            tracing::error!(error = %err, ?step, "compensating transfer failed");
        }
    }
}

/// Run a transfer sequence; on failure, unwind the completed prefix.
fn run_transfers(bank: &mut dyn TokenTransfer, steps: &[Step]) -> Result<()> {
    for (completed, step) in steps.iter().enumerate() {
        if let Err(err) = step.apply(bank) {
            unwind(bank, &steps[..completed]);
            return Err(err.into());
        }
    }
    Ok(())
}

impl Ledger {
    /// Create a ledger for one reward token.
    pub fn new(reward_token: TokenId, reward_rate: u64, emission_source: AccountId) -> Self {
        Self {
            registry: PoolRegistry::new(reward_token, reward_rate),
            positions: BTreeMap::new(),
            emission_source,
        }
    }

    /// Rebuild a ledger from persisted parts.
    pub fn restore(
        registry: PoolRegistry,
        positions: BTreeMap<(PoolId, AccountId), Position>,
        emission_source: AccountId,
    ) -> Self {
        Self {
            registry,
            positions,
            emission_source,
        }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn emission_source(&self) -> &AccountId {
        &self.emission_source
    }

    /// Iterate all positions with their pool id and account.
    pub fn positions(&self) -> impl Iterator<Item = (&(PoolId, AccountId), &Position)> {
        self.positions.iter()
    }

    /// Read a position, if the account ever deposited into the pool.
    pub fn position(&self, deposit_token: &TokenId, account: &AccountId) -> Result<Option<&Position>> {
        let id = self.registry.resolve(deposit_token)?;
        Ok(self.positions.get(&(id, *account)))
    }

    /// Reward owed to `account` if it settled right now. Read-only.
    pub fn pending_reward(&self, deposit_token: &TokenId, account: &AccountId, now: u64) -> Result<u64> {
        Ok(self.stage(deposit_token, account, now)?.pending)
    }

    fn stage(&self, deposit_token: &TokenId, account: &AccountId, now: u64) -> Result<Staged> {
        let pool_id = self.registry.resolve(deposit_token)?;
        let pool = self.registry.pool(pool_id)?;
        let settlement =
            pool.settle_at(self.registry.reward_rate, self.registry.total_allocation_weight, now)?;
        let pending = match self.positions.get(&(pool_id, *account)) {
            Some(p) if p.amount > 0 => p.pending_reward(settlement.acc_reward_per_share)?,
            _ => 0,
        };
        Ok(Staged {
            pool_id,
            settlement,
            pending,
            reward_token: pool.reward_token,
        })
    }

    /// Steps funding the staged reward from the emission source and
    /// paying the caller's pending reward. Zero amounts are omitted.
    fn reward_steps(&self, staged: &Staged, account: &AccountId, steps: &mut Vec<Step>) {
        if staged.settlement.reward > 0 {
            steps.push(Step::In {
                token: staged.reward_token,
                from: self.emission_source,
                amount: staged.settlement.reward,
            });
        }
        if staged.pending > 0 {
            steps.push(Step::Out {
                token: staged.reward_token,
                to: *account,
                amount: staged.pending,
            });
        }
    }

    /// Stake `amount` of the pool's deposit token for `account`.
    ///
    /// A deposit of zero is a valid harvest: it settles the pool and pays
    /// the pending reward without moving the deposit token. Returns the
    /// reward paid out. Afterwards the position's pending reward is zero.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Paused`] while the pause gate is closed
    /// - [`LedgerError::PoolNotFound`]
    /// - [`LedgerError::TransferFailed`] — nothing is committed
    /// - [`LedgerError::ArithmeticOverflow`]
    pub fn deposit(
        &mut self,
        bank: &mut dyn TokenTransfer,
        pause: &dyn PauseGate,
        account: &AccountId,
        deposit_token: &TokenId,
        amount: u64,
        now: u64,
    ) -> Result<u64> {
        if pause.is_paused() {
            return Err(LedgerError::Paused);
        }

        let staged = self.stage(deposit_token, account, now)?;
        let held = self
            .positions
            .get(&(staged.pool_id, *account))
            .map(|p| p.amount)
            .unwrap_or(0);
        let new_amount = held
            .checked_add(amount)
            .ok_or(tiller_math::MathError::Overflow)?;
        let new_total = self
            .registry
            .pool(staged.pool_id)?
            .total_staked
            .checked_add(amount)
            .ok_or(tiller_math::MathError::Overflow)?;
        let new_debt = scaled_share(new_amount, staged.settlement.acc_reward_per_share)?;

        let mut steps = Vec::with_capacity(3);
        self.reward_steps(&staged, account, &mut steps);
        if amount > 0 {
            steps.push(Step::In {
                token: *deposit_token,
                from: *account,
                amount,
            });
        }
        run_transfers(bank, &steps)?;

        let pool = self.registry.pool_mut(staged.pool_id)?;
        pool.commit(&staged.settlement);
        pool.total_staked = new_total;
        let position = self.positions.entry((staged.pool_id, *account)).or_default();
        position.amount = new_amount;
        position.reward_debt = new_debt;

        tracing::info!(
            pool = staged.pool_id,
            amount,
            paid = staged.pending,
            emitted = staged.settlement.reward,
            "deposit"
        );
        Ok(staged.pending)
    }

    /// Immediately withdraw `amount` of staked deposit tokens.
    ///
    /// Pays the pending reward first, like any settlement. The amount
    /// already committed to withdrawal requests is not available here.
    /// Returns the reward paid out.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] if `amount` exceeds the
    ///   un-requested staked balance
    /// - [`LedgerError::PoolNotFound`], [`LedgerError::TransferFailed`],
    ///   [`LedgerError::ArithmeticOverflow`]
    pub fn withdraw(
        &mut self,
        bank: &mut dyn TokenTransfer,
        account: &AccountId,
        deposit_token: &TokenId,
        amount: u64,
        now: u64,
    ) -> Result<u64> {
        let staged = self.stage(deposit_token, account, now)?;
        let key = (staged.pool_id, *account);
        let (held, available) = match self.positions.get(&key) {
            Some(p) => (p.amount, p.available()),
            None => (0, 0),
        };
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        // Both subtractions are covered by the check above.
        let new_amount = held.saturating_sub(amount);
        let new_total = self
            .registry
            .pool(staged.pool_id)?
            .total_staked
            .checked_sub(amount)
            .ok_or(tiller_math::MathError::Overflow)?;
        let new_debt = scaled_share(new_amount, staged.settlement.acc_reward_per_share)?;

        let mut steps = Vec::with_capacity(3);
        self.reward_steps(&staged, account, &mut steps);
        if amount > 0 {
            steps.push(Step::Out {
                token: *deposit_token,
                to: *account,
                amount,
            });
        }
        run_transfers(bank, &steps)?;

        let pool = self.registry.pool_mut(staged.pool_id)?;
        pool.commit(&staged.settlement);
        pool.total_staked = new_total;
        if let Some(position) = self.positions.get_mut(&key) {
            position.amount = new_amount;
            position.reward_debt = new_debt;
        }

        tracing::info!(
            pool = staged.pool_id,
            amount,
            paid = staged.pending,
            emitted = staged.settlement.reward,
            "withdraw"
        );
        Ok(staged.pending)
    }

    /// Harvest the pending reward without touching the staked amount.
    ///
    /// Stays available while paused: pausing blocks new exposure, not the
    /// realization of rewards already committed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`], [`LedgerError::TransferFailed`],
    ///   [`LedgerError::ArithmeticOverflow`]
    pub fn claim(
        &mut self,
        bank: &mut dyn TokenTransfer,
        account: &AccountId,
        deposit_token: &TokenId,
        now: u64,
    ) -> Result<u64> {
        let staged = self.stage(deposit_token, account, now)?;
        let key = (staged.pool_id, *account);
        let held = self.positions.get(&key).map(|p| p.amount).unwrap_or(0);
        let new_debt = scaled_share(held, staged.settlement.acc_reward_per_share)?;

        let mut steps = Vec::with_capacity(2);
        self.reward_steps(&staged, account, &mut steps);
        run_transfers(bank, &steps)?;

        self.registry.pool_mut(staged.pool_id)?.commit(&staged.settlement);
        if let Some(position) = self.positions.get_mut(&key) {
            position.reward_debt = new_debt;
        }

        tracing::info!(pool = staged.pool_id, paid = staged.pending, "claim");
        Ok(staged.pending)
    }

    /// Queue `amount` for withdrawal after the pool's lock period.
    ///
    /// Accrual continues on the full staked amount until the request is
    /// executed; only liquidity is locked. Returns the unlock time. The
    /// queue stays sorted by unlock time, so a request issued after a
    /// lock-period reduction can mature ahead of an earlier one.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Paused`] while the pause gate is closed
    /// - [`LedgerError::InsufficientBalance`] if `amount` exceeds the
    ///   staked balance minus already-queued requests
    /// - [`LedgerError::PoolNotFound`]
    pub fn request_withdrawal(
        &mut self,
        pause: &dyn PauseGate,
        account: &AccountId,
        deposit_token: &TokenId,
        amount: u64,
        now: u64,
    ) -> Result<u64> {
        if pause.is_paused() {
            return Err(LedgerError::Paused);
        }

        let pool_id = self.registry.resolve(deposit_token)?;
        let lock_period = self.registry.pool(pool_id)?.lock_period;
        let unlock_time = now.saturating_add(lock_period);

        let position = self
            .positions
            .get_mut(&(pool_id, *account))
            .ok_or(LedgerError::InsufficientBalance {
                requested: amount,
                available: 0,
            })?;
        let available = position.available();
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        if amount > 0 {
            queue::insert_sorted(
                &mut position.requests,
                WithdrawalRequest { amount, unlock_time },
            );
        }

        tracing::debug!(pool = pool_id, amount, unlock_time, "withdrawal requested");
        Ok(unlock_time)
    }

    /// Sum of the account's matured withdrawal requests at `now`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`]
    pub fn eligible_amount(&self, deposit_token: &TokenId, account: &AccountId, now: u64) -> Result<u64> {
        let pool_id = self.registry.resolve(deposit_token)?;
        Ok(self
            .positions
            .get(&(pool_id, *account))
            .map(|p| queue::eligible_amount(&p.requests, now))
            .unwrap_or(0))
    }

    /// Execute all matured withdrawal requests for the account.
    ///
    /// With nothing matured this is a no-op returning zero, not an error.
    /// Otherwise it settles, pays the pending reward, releases the
    /// matured amount, and recomputes the debt. Returns the amount of
    /// deposit tokens released.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`], [`LedgerError::TransferFailed`],
    ///   [`LedgerError::ArithmeticOverflow`]
    pub fn execute_withdrawal(
        &mut self,
        bank: &mut dyn TokenTransfer,
        account: &AccountId,
        deposit_token: &TokenId,
        now: u64,
    ) -> Result<u64> {
        let pool_id = self.registry.resolve(deposit_token)?;
        let key = (pool_id, *account);
        let eligible = self
            .positions
            .get(&key)
            .map(|p| queue::eligible_amount(&p.requests, now))
            .unwrap_or(0);
        if eligible == 0 {
            return Ok(0);
        }

        let staged = self.stage(deposit_token, account, now)?;
        let held = self.positions.get(&key).map(|p| p.amount).unwrap_or(0);
        let new_amount = held
            .checked_sub(eligible)
            .ok_or(tiller_math::MathError::Overflow)?;
        let new_total = self
            .registry
            .pool(pool_id)?
            .total_staked
            .checked_sub(eligible)
            .ok_or(tiller_math::MathError::Overflow)?;
        let new_debt = scaled_share(new_amount, staged.settlement.acc_reward_per_share)?;

        let mut steps = Vec::with_capacity(3);
        self.reward_steps(&staged, account, &mut steps);
        steps.push(Step::Out {
            token: *deposit_token,
            to: *account,
            amount: eligible,
        });
        run_transfers(bank, &steps)?;

        let pool = self.registry.pool_mut(pool_id)?;
        pool.commit(&staged.settlement);
        pool.total_staked = new_total;
        if let Some(position) = self.positions.get_mut(&key) {
            queue::take_eligible(&mut position.requests, now);
            position.amount = new_amount;
            position.reward_debt = new_debt;
        }

        tracing::info!(
            pool = pool_id,
            released = eligible,
            paid = staged.pending,
            "withdrawal executed"
        );
        Ok(eligible)
    }

    /// Register a new pool. Admin-gated.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`]
    /// - [`LedgerError::PoolAlreadyExists`]
    #[allow(clippy::too_many_arguments)]
    pub fn add_pool(
        &mut self,
        gate: &dyn AccessGate,
        caller: &AccountId,
        deposit_token: TokenId,
        allocation_weight: u64,
        lock_period: u64,
        start_time: u64,
        end_time: Option<u64>,
        now: u64,
    ) -> Result<PoolId> {
        self.authorize(gate, caller, AdminAction::AddPool)?;
        self.registry
            .add_pool(deposit_token, allocation_weight, lock_period, start_time, end_time, now)
    }

    /// Change a pool's allocation weight. Admin-gated.
    ///
    /// The pool is settled (and its reward funded) before the weight
    /// changes, so elapsed time accrues under the old weight.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`], [`LedgerError::PoolNotFound`],
    ///   [`LedgerError::TransferFailed`], [`LedgerError::ArithmeticOverflow`]
    pub fn set_allocation_weight(
        &mut self,
        gate: &dyn AccessGate,
        bank: &mut dyn TokenTransfer,
        caller: &AccountId,
        deposit_token: &TokenId,
        new_weight: u64,
        now: u64,
    ) -> Result<()> {
        self.authorize(gate, caller, AdminAction::SetAllocationWeight)?;

        let pool_id = self.registry.resolve(deposit_token)?;
        let pool = self.registry.pool(pool_id)?;
        let settlement =
            pool.settle_at(self.registry.reward_rate, self.registry.total_allocation_weight, now)?;
        let reward_token = pool.reward_token;

        if settlement.reward > 0 {
            bank.transfer_in(&reward_token, &self.emission_source, settlement.reward)?;
        }

        self.registry.pool_mut(pool_id)?.commit(&settlement);
        self.registry.set_allocation_weight(pool_id, new_weight)
    }

    /// Change a pool's lock period for future withdrawal requests.
    /// Admin-gated. Already-queued requests keep their unlock times.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`], [`LedgerError::PoolNotFound`]
    pub fn set_lock_period(
        &mut self,
        gate: &dyn AccessGate,
        caller: &AccountId,
        deposit_token: &TokenId,
        new_lock_period: u64,
    ) -> Result<()> {
        self.authorize(gate, caller, AdminAction::SetLockPeriod)?;
        let pool_id = self.registry.resolve(deposit_token)?;
        self.registry.pool_mut(pool_id)?.lock_period = new_lock_period;
        tracing::info!(pool = pool_id, new_lock_period, "lock period changed");
        Ok(())
    }

    /// Change the context-wide emission rate. Admin-gated.
    ///
    /// Every pool is settled under the old rate before the change, so no
    /// pool retroactively accrues elapsed time at the new rate. All
    /// settlements are staged first and funded in one transfer; commits
    /// happen only after the transfer succeeds.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`], [`LedgerError::TransferFailed`],
    ///   [`LedgerError::ArithmeticOverflow`]
    pub fn set_reward_rate(
        &mut self,
        gate: &dyn AccessGate,
        bank: &mut dyn TokenTransfer,
        caller: &AccountId,
        new_rate: u64,
        now: u64,
    ) -> Result<()> {
        self.authorize(gate, caller, AdminAction::SetRewardRate)?;

        let mut settlements: Vec<(PoolId, Settlement)> = Vec::with_capacity(self.registry.len());
        let mut total_reward: u64 = 0;
        for id in self.registry.pool_ids() {
            let pool = self.registry.pool(id)?;
            let settlement =
                pool.settle_at(self.registry.reward_rate, self.registry.total_allocation_weight, now)?;
            total_reward = total_reward
                .checked_add(settlement.reward)
                .ok_or(tiller_math::MathError::Overflow)?;
            settlements.push((id, settlement));
        }

        if total_reward > 0 {
            let reward_token = self.registry.reward_token;
            bank.transfer_in(&reward_token, &self.emission_source, total_reward)?;
        }

        for (id, settlement) in &settlements {
            self.registry.pool_mut(*id)?.commit(settlement);
        }
        let old_rate = self.registry.reward_rate;
        self.registry.reward_rate = new_rate;
        tracing::info!(old_rate, new_rate, funded = total_reward, "reward rate changed");
        Ok(())
    }

    /// Hand a pool's entire backing balance to a migrator and record the
    /// replacement deposit token. Admin-gated.
    ///
    /// The ledger moves both legs through the bank itself: the backing
    /// balance goes out to the migrator's account, the replacement comes
    /// back in from it. If the exchange comes up short, or the
    /// replacement token is rejected, both legs are reversed and the
    /// reserve keeps backing the positions in the old token.
    ///
    /// Positions, reward debts, the accumulator, and `total_staked` are
    /// untouched: they are denominated in share units now backed by the
    /// new token. Returns the new deposit token id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`], [`LedgerError::PoolNotFound`]
    /// - [`LedgerError::MigrationShortfall`] if the migrator provides a
    ///   different amount than it was handed
    /// - [`LedgerError::PoolAlreadyExists`] if the replacement token
    ///   already backs another pool
    /// - [`LedgerError::TransferFailed`]
    pub fn migrate(
        &mut self,
        gate: &dyn AccessGate,
        bank: &mut dyn TokenTransfer,
        caller: &AccountId,
        deposit_token: &TokenId,
        migrator: &mut dyn Migrator,
    ) -> Result<TokenId> {
        self.authorize(gate, caller, AdminAction::Migrate)?;

        let pool_id = self.registry.resolve(deposit_token)?;
        let staked = self.registry.pool(pool_id)?.total_staked;
        let counterparty = migrator.account();

        let mut done: Vec<Step> = Vec::with_capacity(2);
        if staked > 0 {
            let handover = Step::Out {
                token: *deposit_token,
                to: counterparty,
                amount: staked,
            };
            handover.apply(bank)?;
            done.push(handover);
        }

        let (new_token, received) = match migrator.exchange(deposit_token, staked) {
            Ok(exchanged) => exchanged,
            Err(err) => {
                unwind(bank, &done);
                return Err(err.into());
            }
        };
        if received > 0 {
            let takeback = Step::In {
                token: new_token,
                from: counterparty,
                amount: received,
            };
            if let Err(err) = takeback.apply(bank) {
                unwind(bank, &done);
                return Err(err.into());
            }
            done.push(takeback);
        }

        if received != staked {
            unwind(bank, &done);
            return Err(LedgerError::MigrationShortfall {
                sent: staked,
                received,
            });
        }
        if let Err(err) = self.registry.rekey_deposit_token(pool_id, new_token) {
            unwind(bank, &done);
            return Err(err);
        }
        tracing::info!(pool = pool_id, staked, "deposit token migrated");
        Ok(new_token)
    }

    fn authorize(&self, gate: &dyn AccessGate, caller: &AccountId, action: AdminAction) -> Result<()> {
        if gate.is_authorized(caller, action) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}
