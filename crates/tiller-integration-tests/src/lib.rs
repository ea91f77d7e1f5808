//! Integration test crate for the Tiller ledger.
//!
//! This crate contains no production code — only integration tests that
//! exercise end-to-end accrual flows across multiple workspace crates,
//! plus the shared test-logging helper below.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tiller-integration-tests
//! ```

/// Install a tracing subscriber honoring `RUST_LOG`, writing through the
/// test harness. Safe to call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
