//! Pool collection and allocation weighting for one reward-token context.
//!
//! All pools in a registry share one emission rate; each pool's slice of
//! it is `allocation_weight / total_allocation_weight`. A deposit token
//! may back at most one pool at a time, and pools are never removed —
//! participation ends only by positions going to zero.
//!
//! Pools are stored in creation order and addressed internally by a
//! stable [`PoolId`], so migrating a pool's deposit token re-keys only
//! the deposit-token index, never the pool or its positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tiller_types::TokenId;

use crate::pool::{Pool, PoolId};
use crate::{token_hex, LedgerError, Result};

/// Ordered collection of pools sharing one reward token and emission rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolRegistry {
    /// Reward token emitted to every pool in this context.
    pub reward_token: TokenId,
    /// Reward units emitted per unit time across the whole context.
    pub reward_rate: u64,
    /// Sum of all member pools' allocation weights.
    pub total_allocation_weight: u64,
    pools: Vec<Pool>,
    by_deposit_token: BTreeMap<TokenId, PoolId>,
}

impl PoolRegistry {
    /// Create an empty registry for a reward token.
    pub fn new(reward_token: TokenId, reward_rate: u64) -> Self {
        Self {
            reward_token,
            reward_rate,
            total_allocation_weight: 0,
            pools: Vec::new(),
            by_deposit_token: BTreeMap::new(),
        }
    }

    /// Rebuild a registry from persisted pools, in creation order.
    ///
    /// The total allocation weight and the deposit-token index are
    /// recomputed from the pools rather than trusted from storage.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolAlreadyExists`] if two pools share a deposit
    ///   token (corrupt snapshot)
    /// - [`LedgerError::ArithmeticOverflow`] if the weight total overflows
    pub fn restore(reward_token: TokenId, reward_rate: u64, pools: Vec<Pool>) -> Result<Self> {
        let mut by_deposit_token = BTreeMap::new();
        let mut total_allocation_weight: u64 = 0;
        for (id, pool) in pools.iter().enumerate() {
            if by_deposit_token.insert(pool.deposit_token, id as PoolId).is_some() {
                return Err(LedgerError::PoolAlreadyExists {
                    deposit_token: token_hex(&pool.deposit_token),
                });
            }
            total_allocation_weight = total_allocation_weight
                .checked_add(pool.allocation_weight)
                .ok_or(tiller_math::MathError::Overflow)?;
        }
        Ok(Self {
            reward_token,
            reward_rate,
            total_allocation_weight,
            pools,
            by_deposit_token,
        })
    }

    /// Register a new pool.
    ///
    /// A fresh pool has an empty accumulator and nothing staked, so there
    /// is nothing to settle; its settlement clock starts at `now`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolAlreadyExists`] if `deposit_token` already
    ///   backs a pool in this context
    /// - [`LedgerError::ArithmeticOverflow`] if the weight total overflows
    pub fn add_pool(
        &mut self,
        deposit_token: TokenId,
        allocation_weight: u64,
        lock_period: u64,
        start_time: u64,
        end_time: Option<u64>,
        now: u64,
    ) -> Result<PoolId> {
        if self.by_deposit_token.contains_key(&deposit_token) {
            return Err(LedgerError::PoolAlreadyExists {
                deposit_token: token_hex(&deposit_token),
            });
        }

        self.total_allocation_weight = self
            .total_allocation_weight
            .checked_add(allocation_weight)
            .ok_or(tiller_math::MathError::Overflow)?;

        let id = self.pools.len() as PoolId;
        self.pools.push(Pool::new(
            deposit_token,
            self.reward_token,
            allocation_weight,
            lock_period,
            start_time,
            end_time,
            now,
        ));
        self.by_deposit_token.insert(deposit_token, id);

        tracing::info!(
            pool = id,
            weight = allocation_weight,
            lock_period,
            "pool added"
        );
        Ok(id)
    }

    /// Resolve a deposit token to its pool id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`] if no pool is backed by this token
    pub fn resolve(&self, deposit_token: &TokenId) -> Result<PoolId> {
        self.by_deposit_token
            .get(deposit_token)
            .copied()
            .ok_or_else(|| LedgerError::PoolNotFound {
                deposit_token: token_hex(deposit_token),
            })
    }

    /// Look up a pool by id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`] for an id this registry never issued
    pub fn pool(&self, id: PoolId) -> Result<&Pool> {
        self.pools
            .get(id as usize)
            .ok_or_else(|| LedgerError::PoolNotFound {
                deposit_token: format!("pool #{id}"),
            })
    }

    /// Look up a pool by id, mutably.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`] for an id this registry never issued
    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool> {
        self.pools
            .get_mut(id as usize)
            .ok_or_else(|| LedgerError::PoolNotFound {
                deposit_token: format!("pool #{id}"),
            })
    }

    /// Ids of all pools, in creation order.
    pub fn pool_ids(&self) -> std::ops::Range<PoolId> {
        0..self.pools.len() as PoolId
    }

    /// Number of pools in the context.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether the registry has no pools.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Change a pool's allocation weight, adjusting the context total by
    /// the delta. The caller must have settled the pool first so that
    /// already-elapsed time accrues under the old weight.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`]
    /// - [`LedgerError::ArithmeticOverflow`] if the weight total overflows
    pub fn set_allocation_weight(&mut self, id: PoolId, new_weight: u64) -> Result<()> {
        let old_weight = self.pool(id)?.allocation_weight;
        let total = self
            .total_allocation_weight
            .checked_sub(old_weight)
            .and_then(|t| t.checked_add(new_weight))
            .ok_or(tiller_math::MathError::Overflow)?;
        self.total_allocation_weight = total;
        self.pool_mut(id)?.allocation_weight = new_weight;
        tracing::info!(pool = id, old_weight, new_weight, "allocation weight changed");
        Ok(())
    }

    /// Re-point a pool at a replacement deposit token after migration.
    ///
    /// The old token becomes free to back a new pool; the pool keeps its
    /// id, accumulator, and staked total.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolNotFound`]
    /// - [`LedgerError::PoolAlreadyExists`] if the replacement token
    ///   already backs another pool
    pub fn rekey_deposit_token(&mut self, id: PoolId, new_token: TokenId) -> Result<()> {
        let old_token = self.pool(id)?.deposit_token;
        if old_token == new_token {
            return Ok(());
        }
        if self.by_deposit_token.contains_key(&new_token) {
            return Err(LedgerError::PoolAlreadyExists {
                deposit_token: token_hex(&new_token),
            });
        }
        self.by_deposit_token.remove(&old_token);
        self.by_deposit_token.insert(new_token, id);
        self.pool_mut(id)?.deposit_token = new_token;
        Ok(())
    }
}
