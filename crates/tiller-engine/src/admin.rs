//! Two-phase pending/accept admin handshake.
//!
//! Admin transfer is a two-step protocol: the current admin nominates a
//! pending admin, and only the nominee can complete the transfer by
//! accepting. A mistyped nomination is recoverable (nominate again); the
//! admin pointer can never be overwritten directly.

use serde::{Deserialize, Serialize};
use tiller_types::{AccountId, AdminAction};

use crate::gates::AccessGate;
use crate::{LedgerError, Result};

/// Admin role with a pending/accept transfer protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TwoPhaseAdmin {
    admin: AccountId,
    pending_admin: Option<AccountId>,
}

impl TwoPhaseAdmin {
    /// Create with an initial admin and no pending transfer.
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            pending_admin: None,
        }
    }

    /// The current admin.
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// The nominated-but-unaccepted admin, if any.
    pub fn pending_admin(&self) -> Option<&AccountId> {
        self.pending_admin.as_ref()
    }

    /// Nominate a new admin. Only the current admin may call this;
    /// nominating again replaces any previous nomination.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] if `caller` is not the admin
    pub fn set_pending_admin(&mut self, caller: &AccountId, new_admin: AccountId) -> Result<()> {
        if caller != &self.admin {
            return Err(LedgerError::Unauthorized);
        }
        self.pending_admin = Some(new_admin);
        tracing::info!("pending admin nominated");
        Ok(())
    }

    /// Complete the transfer. Only the pending admin may call this.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] if `caller` is not the pending
    ///   admin (or no transfer is pending)
    pub fn accept_admin(&mut self, caller: &AccountId) -> Result<()> {
        match self.pending_admin {
            Some(pending) if caller == &pending => {
                self.admin = pending;
                self.pending_admin = None;
                tracing::info!("admin transfer accepted");
                Ok(())
            }
            _ => Err(LedgerError::Unauthorized),
        }
    }
}

impl AccessGate for TwoPhaseAdmin {
    fn is_authorized(&self, caller: &AccountId, _action: AdminAction) -> bool {
        caller == &self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_types::id_from_tag;

    #[test]
    fn test_admin_is_authorized_for_all_actions() {
        let admin = TwoPhaseAdmin::new(id_from_tag("admin"));
        for action in [
            AdminAction::AddPool,
            AdminAction::SetAllocationWeight,
            AdminAction::SetRewardRate,
            AdminAction::SetLockPeriod,
            AdminAction::Migrate,
        ] {
            assert!(admin.is_authorized(&id_from_tag("admin"), action));
            assert!(!admin.is_authorized(&id_from_tag("mallory"), action));
        }
    }

    #[test]
    fn test_transfer_requires_both_steps() {
        let mut admin = TwoPhaseAdmin::new(id_from_tag("alice"));
        admin
            .set_pending_admin(&id_from_tag("alice"), id_from_tag("bob"))
            .expect("nominate");

        // Nomination alone changes nothing.
        assert_eq!(admin.admin(), &id_from_tag("alice"));
        assert!(!admin.is_authorized(&id_from_tag("bob"), AdminAction::AddPool));

        admin.accept_admin(&id_from_tag("bob")).expect("accept");
        assert_eq!(admin.admin(), &id_from_tag("bob"));
        assert!(admin.pending_admin().is_none());
        assert!(!admin.is_authorized(&id_from_tag("alice"), AdminAction::AddPool));
    }

    #[test]
    fn test_only_admin_nominates() {
        let mut admin = TwoPhaseAdmin::new(id_from_tag("alice"));
        assert!(matches!(
            admin.set_pending_admin(&id_from_tag("mallory"), id_from_tag("mallory")),
            Err(LedgerError::Unauthorized)
        ));
    }

    #[test]
    fn test_only_nominee_accepts() {
        let mut admin = TwoPhaseAdmin::new(id_from_tag("alice"));
        admin
            .set_pending_admin(&id_from_tag("alice"), id_from_tag("bob"))
            .expect("nominate");
        assert!(matches!(
            admin.accept_admin(&id_from_tag("mallory")),
            Err(LedgerError::Unauthorized)
        ));
        assert!(matches!(
            admin.accept_admin(&id_from_tag("alice")),
            Err(LedgerError::Unauthorized)
        ));
    }

    #[test]
    fn test_accept_without_nomination_rejected() {
        let mut admin = TwoPhaseAdmin::new(id_from_tag("alice"));
        assert!(matches!(
            admin.accept_admin(&id_from_tag("alice")),
            Err(LedgerError::Unauthorized)
        ));
    }

    #[test]
    fn test_renomination_replaces_pending() {
        let mut admin = TwoPhaseAdmin::new(id_from_tag("alice"));
        admin
            .set_pending_admin(&id_from_tag("alice"), id_from_tag("bob"))
            .expect("first");
        admin
            .set_pending_admin(&id_from_tag("alice"), id_from_tag("carol"))
            .expect("second");
        assert!(admin.accept_admin(&id_from_tag("bob")).is_err());
        admin.accept_admin(&id_from_tag("carol")).expect("accept");
        assert_eq!(admin.admin(), &id_from_tag("carol"));
    }
}
