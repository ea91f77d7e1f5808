//! Position table queries.
//!
//! The `positions` table holds amount and reward debt; withdrawal
//! requests live in their own table (see [`crate::queries::requests`])
//! and are stitched back in by the snapshot loader.

use rusqlite::Connection;
use tiller_engine::pool::PoolId;
use tiller_engine::position::Position;
use tiller_types::{AccountId, TokenId};

use crate::queries::{id32, parse_u128};
use crate::Result;

/// Insert or replace a position row (amount and debt only).
pub fn upsert(
    conn: &Connection,
    reward_token: &TokenId,
    pool_id: PoolId,
    account: &AccountId,
    position: &Position,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO positions (reward_token, pool_id, account, amount, reward_debt)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            reward_token.as_slice(),
            pool_id as i64,
            account.as_slice(),
            position.amount as i64,
            position.reward_debt.to_string(),
        ],
    )?;
    Ok(())
}

/// List every position of a reward context, without requests.
pub fn list(conn: &Connection, reward_token: &TokenId) -> Result<Vec<(PoolId, AccountId, Position)>> {
    let mut stmt = conn.prepare(
        "SELECT pool_id, account, amount, reward_debt
         FROM positions WHERE reward_token = ?1 ORDER BY pool_id, account",
    )?;

    let rows = stmt
        .query_map([reward_token.as_slice()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut positions = Vec::with_capacity(rows.len());
    for (pool_id, account, amount, debt) in rows {
        positions.push((
            pool_id as PoolId,
            id32(account, "positions.account")?,
            Position {
                amount: amount as u64,
                reward_debt: parse_u128(debt, "positions.reward_debt")?,
                requests: Vec::new(),
            },
        ));
    }
    Ok(positions)
}
