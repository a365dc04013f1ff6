// 13.0 registry.rs: who may do what. one registry is shared by every market built from it;
// markets hold it behind an Arc and read it on every call.
// 13.1 operators act for an account, 13.2 referral fee overrides.

use crate::fixed::UFixed6;
use crate::types::AccountId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{sender} is not the owner")]
    NotOwner { sender: AccountId },

    #[error("{sender} is not the owner or coordinator")]
    NotCoordinator { sender: AccountId },

    #[error("{sender} may not change operators of {account}")]
    NotAccount { sender: AccountId, account: AccountId },

    #[error("referral fee {0} exceeds 1")]
    InvalidReferralFee(UFixed6),
}

#[derive(Debug)]
pub struct Registry {
    owner: AccountId,
    coordinator: RwLock<AccountId>,
    // (account, operator) pairs
    operators: RwLock<HashSet<(AccountId, AccountId)>>,
    referral_fees: RwLock<HashMap<AccountId, UFixed6>>,
}

impl Registry {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            coordinator: RwLock::new(owner),
            operators: RwLock::new(HashSet::new()),
            referral_fees: RwLock::new(HashMap::new()),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn coordinator(&self) -> AccountId {
        *self.coordinator.read()
    }

    pub fn update_coordinator(
        &self,
        sender: AccountId,
        coordinator: AccountId,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;
        *self.coordinator.write() = coordinator;
        info!(%coordinator, "coordinator updated");
        Ok(())
    }

    pub fn only_owner(&self, sender: AccountId) -> Result<(), RegistryError> {
        if sender != self.owner {
            return Err(RegistryError::NotOwner { sender });
        }
        Ok(())
    }

    /// Parameter changes are open to the owner and the coordinator.
    pub fn only_coordinator(&self, sender: AccountId) -> Result<(), RegistryError> {
        if sender != self.owner && sender != self.coordinator() {
            return Err(RegistryError::NotCoordinator { sender });
        }
        Ok(())
    }

    // 13.1: only the account itself approves or revokes its operators
    pub fn update_operator(
        &self,
        sender: AccountId,
        account: AccountId,
        operator: AccountId,
        approved: bool,
    ) -> Result<(), RegistryError> {
        if sender != account {
            return Err(RegistryError::NotAccount { sender, account });
        }
        let mut operators = self.operators.write();
        if approved {
            operators.insert((account, operator));
        } else {
            operators.remove(&(account, operator));
        }
        info!(%account, %operator, approved, "operator updated");
        Ok(())
    }

    pub fn is_operator(&self, account: AccountId, operator: AccountId) -> bool {
        self.operators.read().contains(&(account, operator))
    }

    /// An account acts for itself; an approved operator acts for it too.
    pub fn authorized(&self, account: AccountId, sender: AccountId) -> bool {
        account == sender || self.is_operator(account, sender)
    }

    // 13.2
    pub fn update_referral_fee(
        &self,
        sender: AccountId,
        referrer: AccountId,
        fee: UFixed6,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;
        if fee > UFixed6::ONE {
            return Err(RegistryError::InvalidReferralFee(fee));
        }
        self.referral_fees.write().insert(referrer, fee);
        Ok(())
    }

    /// Fee fraction a referrer earns, if it has an override.
    pub fn referral_fee(&self, referrer: AccountId) -> Option<UFixed6> {
        self.referral_fees.read().get(&referrer).copied()
    }
}
