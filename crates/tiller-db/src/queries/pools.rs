//! Pool table queries.

use rusqlite::Connection;
use tiller_engine::pool::{Pool, PoolId};
use tiller_types::TokenId;

use crate::queries::{id32, parse_u128};
use crate::Result;

/// Insert or replace a pool row.
pub fn upsert(conn: &Connection, reward_token: &TokenId, pool_id: PoolId, pool: &Pool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pools
         (reward_token, pool_id, deposit_token, allocation_weight, acc_reward_per_share,
          last_settlement_time, total_staked, start_time, end_time, lock_period)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            reward_token.as_slice(),
            pool_id as i64,
            pool.deposit_token.as_slice(),
            pool.allocation_weight as i64,
            pool.acc_reward_per_share.to_string(),
            pool.last_settlement_time as i64,
            pool.total_staked as i64,
            pool.start_time as i64,
            pool.end_time.map(|t| t as i64),
            pool.lock_period as i64,
        ],
    )?;
    Ok(())
}

/// List all pools of a reward context, ordered by pool id.
pub fn list(conn: &Connection, reward_token: &TokenId) -> Result<Vec<Pool>> {
    let mut stmt = conn.prepare(
        "SELECT deposit_token, allocation_weight, acc_reward_per_share,
                last_settlement_time, total_staked, start_time, end_time, lock_period
         FROM pools WHERE reward_token = ?1 ORDER BY pool_id ASC",
    )?;

    let rows = stmt
        .query_map([reward_token.as_slice()], |row| {
            Ok((
                row.get::<_, Vec<u8>>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut pools = Vec::with_capacity(rows.len());
    for (deposit, weight, acc, last, staked, start, end, lock) in rows {
        pools.push(Pool {
            deposit_token: id32(deposit, "pools.deposit_token")?,
            reward_token: *reward_token,
            allocation_weight: weight as u64,
            acc_reward_per_share: parse_u128(acc, "pools.acc_reward_per_share")?,
            last_settlement_time: last as u64,
            total_staked: staked as u64,
            start_time: start as u64,
            end_time: end.map(|t| t as u64),
            lock_period: lock as u64,
        });
    }
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_types::id_from_tag;

    fn sample_pool() -> Pool {
        Pool {
            deposit_token: id_from_tag("lp"),
            reward_token: id_from_tag("gov"),
            allocation_weight: 100,
            acc_reward_per_share: 5_000_000_000_000,
            last_settlement_time: 42,
            total_staked: 9_000,
            start_time: 0,
            end_time: Some(1_000),
            lock_period: 10,
        }
    }

    fn insert_context(conn: &Connection, reward_token: &TokenId) {
        conn.execute(
            "INSERT INTO contexts (reward_token, reward_rate, emission_source) VALUES (?1, ?2, ?3)",
            rusqlite::params![reward_token.as_slice(), 10_000i64, id_from_tag("treasury").as_slice()],
        )
        .expect("insert context");
    }

    #[test]
    fn test_upsert_and_list_round_trip() {
        let conn = crate::open_memory().expect("open");
        let gov = id_from_tag("gov");
        insert_context(&conn, &gov);

        let pool = sample_pool();
        upsert(&conn, &gov, 0, &pool).expect("upsert");

        let pools = list(&conn, &gov).expect("list");
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].deposit_token, pool.deposit_token);
        assert_eq!(pools[0].acc_reward_per_share, pool.acc_reward_per_share);
        assert_eq!(pools[0].end_time, Some(1_000));
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = crate::open_memory().expect("open");
        let gov = id_from_tag("gov");
        insert_context(&conn, &gov);

        let mut pool = sample_pool();
        upsert(&conn, &gov, 0, &pool).expect("first");
        pool.total_staked = 1;
        upsert(&conn, &gov, 0, &pool).expect("second");

        let pools = list(&conn, &gov).expect("list");
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].total_staked, 1);
    }

    #[test]
    fn test_list_preserves_pool_id_order() {
        let conn = crate::open_memory().expect("open");
        let gov = id_from_tag("gov");
        insert_context(&conn, &gov);

        let mut a = sample_pool();
        a.deposit_token = id_from_tag("lp-a");
        let mut b = sample_pool();
        b.deposit_token = id_from_tag("lp-b");
        // Insert out of order; listing must come back by pool id.
        upsert(&conn, &gov, 1, &b).expect("b");
        upsert(&conn, &gov, 0, &a).expect("a");

        let pools = list(&conn, &gov).expect("list");
        assert_eq!(pools[0].deposit_token, id_from_tag("lp-a"));
        assert_eq!(pools[1].deposit_token, id_from_tag("lp-b"));
    }
}
