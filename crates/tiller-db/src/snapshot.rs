//! Whole-ledger snapshot save and load.
//!
//! One reward-token context is written as a unit inside a transaction:
//! the context row, all pool rows, all position rows, and each
//! position's withdrawal queue.

use std::collections::BTreeMap;

use rusqlite::Connection;
use tiller_engine::ledger::Ledger;
use tiller_engine::pool::PoolId;
use tiller_engine::position::Position;
use tiller_engine::registry::PoolRegistry;
use tiller_types::{AccountId, TokenId};

use crate::queries::{self, id32};
use crate::{DbError, Result};

/// Persist the entire ledger, replacing any previous snapshot of the
/// same reward context.
pub fn save(conn: &mut Connection, ledger: &Ledger) -> Result<()> {
    let registry = ledger.registry();
    let reward_token = registry.reward_token;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR REPLACE INTO contexts (reward_token, reward_rate, emission_source)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![
            reward_token.as_slice(),
            registry.reward_rate as i64,
            ledger.emission_source().as_slice(),
        ],
    )?;

    // Cascades into positions and withdrawal_requests.
    tx.execute(
        "DELETE FROM pools WHERE reward_token = ?1",
        [reward_token.as_slice()],
    )?;

    for id in registry.pool_ids() {
        let pool = registry
            .pool(id)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        queries::pools::upsert(&tx, &reward_token, id, pool)?;
    }
    for ((pool_id, account), position) in ledger.positions() {
        queries::positions::upsert(&tx, &reward_token, *pool_id, account, position)?;
        queries::requests::replace(&tx, &reward_token, *pool_id, account, &position.requests)?;
    }

    tx.commit()?;
    tracing::debug!("ledger snapshot saved");
    Ok(())
}

/// Load a ledger snapshot for a reward context, if one exists.
pub fn load(conn: &Connection, reward_token: &TokenId) -> Result<Option<Ledger>> {
    let context = conn
        .query_row(
            "SELECT reward_rate, emission_source FROM contexts WHERE reward_token = ?1",
            [reward_token.as_slice()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(DbError::Sqlite(other)),
        })?;
    let Some((reward_rate, emission_source)) = context else {
        return Ok(None);
    };
    let emission_source: AccountId = id32(emission_source, "contexts.emission_source")?;

    let pools = queries::pools::list(conn, reward_token)?;
    let registry = PoolRegistry::restore(*reward_token, reward_rate as u64, pools)
        .map_err(|e| DbError::Corrupt(e.to_string()))?;

    let mut positions: BTreeMap<(PoolId, AccountId), Position> = BTreeMap::new();
    for (pool_id, account, mut position) in queries::positions::list(conn, reward_token)? {
        position.requests = queries::requests::list(conn, reward_token, pool_id, &account)?;
        positions.insert((pool_id, account), position);
    }

    Ok(Some(Ledger::restore(registry, positions, emission_source)))
}
