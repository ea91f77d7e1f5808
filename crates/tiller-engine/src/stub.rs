//! In-memory collaborator stubs.
//!
//! These back the unit and integration tests and double as reference
//! implementations of the gate traits. [`StubBank`] keeps a full double
//! entry of external account balances plus the engine reserve, so tests
//! can assert conservation of every token across operations.

use std::collections::BTreeMap;

use tiller_types::{AccountId, AdminAction, TokenId};

use crate::gates::{AccessGate, Migrator, PauseGate, TokenTransfer, TransferError};

/// In-memory token bank.
#[derive(Clone, Debug, Default)]
pub struct StubBank {
    balances: BTreeMap<(TokenId, AccountId), u64>,
    reserve: BTreeMap<TokenId, u64>,
    /// When set, every transfer fails. Used to exercise rollback paths.
    pub fail_all: bool,
    /// Fail only the n-th transfer (1-based, counted across both
    /// directions). Exercises partial-sequence rollback.
    pub fail_call: Option<u64>,
    calls: u64,
}

impl StubBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an external account.
    pub fn fund(&mut self, token: &TokenId, account: &AccountId, amount: u64) {
        let entry = self.balances.entry((*token, *account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Balance of an external account.
    pub fn balance_of(&self, token: &TokenId, account: &AccountId) -> u64 {
        self.balances.get(&(*token, *account)).copied().unwrap_or(0)
    }

    /// Balance held by the engine reserve.
    pub fn reserve_of(&self, token: &TokenId) -> u64 {
        self.reserve.get(token).copied().unwrap_or(0)
    }

    /// Arm [`StubBank::fail_call`] to fail the n-th transfer from now.
    pub fn fail_call_in(&mut self, n: u64) {
        self.fail_call = Some(self.calls + n);
    }

    fn should_fail(&mut self) -> bool {
        self.calls += 1;
        self.fail_all || self.fail_call == Some(self.calls)
    }
}

impl TokenTransfer for StubBank {
    fn transfer_in(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError> {
        if self.should_fail() {
            return Err(TransferError("stub bank configured to fail".into()));
        }
        let balance = self.balances.entry((*token, *from)).or_insert(0);
        let have = *balance;
        *balance = have
            .checked_sub(amount)
            .ok_or_else(|| TransferError(format!("insufficient funds: have {have}, need {amount}")))?;
        let reserve = self.reserve.entry(*token).or_insert(0);
        *reserve = reserve.saturating_add(amount);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        token: &TokenId,
        to: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError> {
        if self.should_fail() {
            return Err(TransferError("stub bank configured to fail".into()));
        }
        let reserve = self.reserve.entry(*token).or_insert(0);
        let have = *reserve;
        *reserve = have
            .checked_sub(amount)
            .ok_or_else(|| TransferError(format!("reserve short: have {have}, need {amount}")))?;
        let balance = self.balances.entry((*token, *to)).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(())
    }
}

/// Access gate that authorizes everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn is_authorized(&self, _caller: &AccountId, _action: AdminAction) -> bool {
        true
    }
}

/// Pause gate with a settable flag.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubPause {
    pub paused: bool,
}

impl PauseGate for StubPause {
    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Migrator that swaps the backing balance for a preconfigured token.
///
/// Offers `amount - shortfall` units of the replacement token from its
/// own account; the ledger moves both legs through the bank. A nonzero
/// `shortfall` models a faulty exchanger.
#[derive(Clone, Debug)]
pub struct StubMigrator {
    pub account: AccountId,
    pub replacement_token: TokenId,
    pub shortfall: u64,
}

impl Migrator for StubMigrator {
    fn account(&self) -> AccountId {
        self.account
    }

    fn exchange(
        &mut self,
        _deposit_token: &TokenId,
        amount: u64,
    ) -> std::result::Result<(TokenId, u64), TransferError> {
        Ok((self.replacement_token, amount.saturating_sub(self.shortfall)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_types::id_from_tag;

    #[test]
    fn test_bank_round_trip() {
        let token = id_from_tag("gov");
        let alice = id_from_tag("alice");
        let mut bank = StubBank::new();
        bank.fund(&token, &alice, 100);

        bank.transfer_in(&token, &alice, 60).expect("in");
        assert_eq!(bank.balance_of(&token, &alice), 40);
        assert_eq!(bank.reserve_of(&token), 60);

        bank.transfer_out(&token, &alice, 25).expect("out");
        assert_eq!(bank.balance_of(&token, &alice), 65);
        assert_eq!(bank.reserve_of(&token), 35);
    }

    #[test]
    fn test_bank_rejects_overdraft() {
        let token = id_from_tag("gov");
        let alice = id_from_tag("alice");
        let mut bank = StubBank::new();
        assert!(bank.transfer_in(&token, &alice, 1).is_err());
        assert!(bank.transfer_out(&token, &alice, 1).is_err());
    }

    #[test]
    fn test_bank_fail_all() {
        let token = id_from_tag("gov");
        let alice = id_from_tag("alice");
        let mut bank = StubBank::new();
        bank.fund(&token, &alice, 100);
        bank.fail_all = true;
        assert!(bank.transfer_in(&token, &alice, 1).is_err());
    }

    #[test]
    fn test_bank_fail_call_targets_single_transfer() {
        let token = id_from_tag("gov");
        let alice = id_from_tag("alice");
        let mut bank = StubBank::new();
        bank.fund(&token, &alice, 100);

        bank.fail_call_in(2);
        bank.transfer_in(&token, &alice, 10).expect("first passes");
        assert!(bank.transfer_in(&token, &alice, 10).is_err());
        bank.transfer_in(&token, &alice, 10).expect("third passes");
        assert_eq!(bank.reserve_of(&token), 20);
    }
}
