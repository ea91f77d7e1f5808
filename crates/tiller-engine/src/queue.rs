//! Timed withdrawal-request queue.
//!
//! The locking variant queues withdrawals as `{amount, unlock_time}`
//! requests. The queue is kept sorted by ascending `unlock_time`, not by
//! insertion order: a lock-period reduction can make a later request
//! mature before an earlier one, and eligibility must follow maturity.
//! Matured requests therefore always form a prefix of the queue.

use serde::{Deserialize, Serialize};

/// A single pending withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Amount of the deposit token requested.
    pub amount: u64,
    /// Time at which the request matures.
    pub unlock_time: u64,
}

/// Insert a request, keeping the queue sorted by `unlock_time`.
///
/// Ties keep insertion order (the new request goes after existing equal
/// keys).
pub fn insert_sorted(queue: &mut Vec<WithdrawalRequest>, request: WithdrawalRequest) {
    let at = queue.partition_point(|r| r.unlock_time <= request.unlock_time);
    queue.insert(at, request);
}

/// Sum of all requests that have matured at `now`.
pub fn eligible_amount(queue: &[WithdrawalRequest], now: u64) -> u64 {
    queue
        .iter()
        .take_while(|r| r.unlock_time <= now)
        .fold(0u64, |sum, r| sum.saturating_add(r.amount))
}

/// Sum of all requests, matured or not.
pub fn requested_total(queue: &[WithdrawalRequest]) -> u64 {
    queue.iter().fold(0u64, |sum, r| sum.saturating_add(r.amount))
}

/// Remove all matured requests and return their total amount.
pub fn take_eligible(queue: &mut Vec<WithdrawalRequest>, now: u64) -> u64 {
    let matured = queue.partition_point(|r| r.unlock_time <= now);
    queue
        .drain(..matured)
        .fold(0u64, |sum, r| sum.saturating_add(r.amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(amount: u64, unlock_time: u64) -> WithdrawalRequest {
        WithdrawalRequest { amount, unlock_time }
    }

    #[test]
    fn test_insert_keeps_unlock_time_order() {
        // Issued with lock periods [10, 5] at t=0: the second request
        // matures first and must sort ahead of the first.
        let mut q = Vec::new();
        insert_sorted(&mut q, req(100, 10));
        insert_sorted(&mut q, req(50, 5));
        assert_eq!(q[0], req(50, 5));
        assert_eq!(q[1], req(100, 10));
    }

    #[test]
    fn test_insert_ties_keep_insertion_order() {
        let mut q = Vec::new();
        insert_sorted(&mut q, req(1, 5));
        insert_sorted(&mut q, req(2, 5));
        insert_sorted(&mut q, req(3, 5));
        assert_eq!(q.iter().map(|r| r.amount).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn test_eligible_amount_only_matured() {
        let mut q = Vec::new();
        insert_sorted(&mut q, req(100, 10));
        insert_sorted(&mut q, req(50, 5));
        assert_eq!(eligible_amount(&q, 4), 0);
        assert_eq!(eligible_amount(&q, 5), 50);
        assert_eq!(eligible_amount(&q, 10), 150);
    }

    #[test]
    fn test_take_eligible_drains_prefix() {
        let mut q = Vec::new();
        insert_sorted(&mut q, req(100, 10));
        insert_sorted(&mut q, req(50, 5));
        let taken = take_eligible(&mut q, 7);
        assert_eq!(taken, 50);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0], req(100, 10));
    }

    #[test]
    fn test_take_eligible_nothing_matured() {
        let mut q = vec![req(10, 100)];
        assert_eq!(take_eligible(&mut q, 99), 0);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_requested_total() {
        let q = vec![req(10, 1), req(20, 2), req(30, 3)];
        assert_eq!(requested_total(&q), 60);
    }
}
