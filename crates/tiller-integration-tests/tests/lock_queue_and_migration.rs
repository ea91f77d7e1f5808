//! Integration test: locked-withdrawal vault lifecycle.
//!
//! Drives one pool through the full governance-vault flow:
//! 1. Stake under a lock period, queue withdrawal requests
//! 2. Hand the admin role over with the two-phase handshake
//! 3. Shorten the lock period and verify maturity ordering
//! 4. Execute matured requests, including while paused
//! 5. Migrate the deposit token and withdraw in the new token
//!
//! Rewards are checked against hand-computed totals at each step.

use tiller_engine::admin::TwoPhaseAdmin;
use tiller_engine::ledger::Ledger;
use tiller_engine::stub::{StubBank, StubMigrator, StubPause};
use tiller_engine::LedgerError;
use tiller_types::{id_from_tag, AccountId, TokenId};

/// Emission per time unit into the sole pool.
const RATE: u64 = 10_000;

fn vlt() -> TokenId {
    id_from_tag("vlt")
}

fn lp() -> TokenId {
    id_from_tag("lp")
}

fn alice() -> AccountId {
    id_from_tag("alice")
}

fn setup() -> (Ledger, TwoPhaseAdmin, StubBank) {
    let founder = id_from_tag("founder");
    let mut ledger = Ledger::new(vlt(), RATE, id_from_tag("treasury"));
    let admin = TwoPhaseAdmin::new(founder);
    // Sole pool, full weight, 10-unit lock.
    ledger
        .add_pool(&admin, &founder, lp(), 100, 10, 0, None, 0)
        .expect("add pool");

    let mut bank = StubBank::new();
    bank.fund(&vlt(), &id_from_tag("treasury"), 1_000_000_000);
    bank.fund(&lp(), &alice(), 1_000);
    (ledger, admin, bank)
}

#[test]
fn vault_lifecycle_with_admin_handover_and_migration() {
    tiller_integration_tests::init_tracing();
    let (mut ledger, mut admin, mut bank) = setup();
    let founder = id_from_tag("founder");
    let ops = id_from_tag("ops");
    let mut pause = StubPause::default();

    // =========================================================
    // t=0: stake and queue the first request under the long lock
    // =========================================================
    ledger
        .deposit(&mut bank, &pause, &alice(), &lp(), 1_000, 0)
        .expect("deposit");
    let unlock = ledger
        .request_withdrawal(&pause, &alice(), &lp(), 400, 0)
        .expect("first request");
    assert_eq!(unlock, 10);

    // =========================================================
    // Admin handover: founder nominates ops, ops accepts
    // =========================================================
    admin.set_pending_admin(&founder, ops).expect("nominate");
    admin.accept_admin(&ops).expect("accept");
    assert!(matches!(
        ledger.set_lock_period(&admin, &founder, &lp(), 2),
        Err(LedgerError::Unauthorized)
    ));
    ledger.set_lock_period(&admin, &ops, &lp(), 2).expect("shorten lock");

    // =========================================================
    // t=1: a request under the short lock matures first
    // =========================================================
    let unlock = ledger
        .request_withdrawal(&pause, &alice(), &lp(), 300, 1)
        .expect("second request");
    assert_eq!(unlock, 3);
    assert_eq!(ledger.eligible_amount(&lp(), &alice(), 3).expect("eligible"), 300);

    // Queued stake keeps accruing until release: 3 units at full rate.
    let released = ledger
        .execute_withdrawal(&mut bank, &alice(), &lp(), 3)
        .expect("execute short request");
    assert_eq!(released, 300);
    assert_eq!(bank.balance_of(&lp(), &alice()), 300);
    assert_eq!(bank.balance_of(&vlt(), &alice()), 3 * RATE);

    // =========================================================
    // Paused: no new exposure, but maturity and claims stay open
    // =========================================================
    pause.paused = true;
    assert!(matches!(
        ledger.deposit(&mut bank, &pause, &alice(), &lp(), 10, 5),
        Err(LedgerError::Paused)
    ));
    assert!(matches!(
        ledger.request_withdrawal(&pause, &alice(), &lp(), 10, 5),
        Err(LedgerError::Paused)
    ));

    // t=10: the original request matures and executes while paused.
    let released = ledger
        .execute_withdrawal(&mut bank, &alice(), &lp(), 10)
        .expect("execute long request");
    assert_eq!(released, 400);
    assert_eq!(bank.balance_of(&lp(), &alice()), 700);
    // 7 further units accrued on the remaining 700 staked.
    assert_eq!(bank.balance_of(&vlt(), &alice()), 10 * RATE);
    pause.paused = false;

    // =========================================================
    // Migrate the backing token, then exit in the new token
    // =========================================================
    let lp_v2 = id_from_tag("lp-v2");
    let mut migrator = StubMigrator {
        account: id_from_tag("amm"),
        replacement_token: lp_v2,
        shortfall: 0,
    };
    bank.fund(&lp_v2, &id_from_tag("amm"), 300);

    assert!(matches!(
        ledger.migrate(&admin, &mut bank, &id_from_tag("mallory"), &lp(), &mut migrator),
        Err(LedgerError::Unauthorized)
    ));
    let new_token = ledger
        .migrate(&admin, &mut bank, &ops, &lp(), &mut migrator)
        .expect("migrate");
    assert_eq!(new_token, lp_v2);

    // t=13: full exit pays the last 3 units and moves the new token.
    let paid = ledger
        .withdraw(&mut bank, &alice(), &lp_v2, 300, 13)
        .expect("final withdraw");
    assert_eq!(paid, 3 * RATE);
    assert_eq!(bank.balance_of(&lp_v2, &alice()), 300);
    assert_eq!(ledger.registry().pool(0).expect("pool").total_staked, 0);

    // Every emitted token ended up with alice; the reserve is empty.
    assert_eq!(bank.balance_of(&vlt(), &alice()), 13 * RATE);
    assert_eq!(bank.reserve_of(&vlt()), 0);
}

#[test]
fn shortened_lock_never_rewrites_queued_requests() {
    let (mut ledger, admin, mut bank) = setup();
    let founder = id_from_tag("founder");
    let pause = StubPause::default();

    ledger
        .deposit(&mut bank, &pause, &alice(), &lp(), 1_000, 0)
        .expect("deposit");
    ledger
        .request_withdrawal(&pause, &alice(), &lp(), 500, 0)
        .expect("request");
    ledger.set_lock_period(&admin, &founder, &lp(), 0).expect("drop lock");

    // The queued request keeps its original unlock time.
    assert_eq!(ledger.eligible_amount(&lp(), &alice(), 9).expect("eligible"), 0);
    assert_eq!(ledger.eligible_amount(&lp(), &alice(), 10).expect("eligible"), 500);

    // New requests mature immediately under the zero lock.
    let unlock = ledger
        .request_withdrawal(&pause, &alice(), &lp(), 100, 4)
        .expect("instant request");
    assert_eq!(unlock, 4);
    let released = ledger
        .execute_withdrawal(&mut bank, &alice(), &lp(), 4)
        .expect("execute");
    assert_eq!(released, 100);
}
