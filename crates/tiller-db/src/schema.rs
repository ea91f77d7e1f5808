//! SQL schema definitions.

/// Complete schema for the v1 ledger database.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS contexts (
    reward_token BLOB PRIMARY KEY,
    reward_rate INTEGER NOT NULL,
    emission_source BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS pools (
    reward_token BLOB NOT NULL REFERENCES contexts(reward_token),
    pool_id INTEGER NOT NULL,
    deposit_token BLOB NOT NULL,
    allocation_weight INTEGER NOT NULL,
    acc_reward_per_share TEXT NOT NULL,
    last_settlement_time INTEGER NOT NULL,
    total_staked INTEGER NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    lock_period INTEGER NOT NULL,
    PRIMARY KEY (reward_token, pool_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_pools_deposit_token
    ON pools(reward_token, deposit_token);

CREATE TABLE IF NOT EXISTS positions (
    reward_token BLOB NOT NULL,
    pool_id INTEGER NOT NULL,
    account BLOB NOT NULL,
    amount INTEGER NOT NULL,
    reward_debt TEXT NOT NULL,
    PRIMARY KEY (reward_token, pool_id, account),
    FOREIGN KEY (reward_token, pool_id)
        REFERENCES pools(reward_token, pool_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS withdrawal_requests (
    reward_token BLOB NOT NULL,
    pool_id INTEGER NOT NULL,
    account BLOB NOT NULL,
    seq INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    unlock_time INTEGER NOT NULL,
    PRIMARY KEY (reward_token, pool_id, account, seq),
    FOREIGN KEY (reward_token, pool_id, account)
        REFERENCES positions(reward_token, pool_id, account) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_requests_unlock
    ON withdrawal_requests(reward_token, pool_id, account, unlock_time);
"#;
