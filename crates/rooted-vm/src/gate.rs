// SPDX-License-Identifier: AGPL-3.0-only
//! Transfer gate: the authorization predicate a gated token consults before
//! liquidity for it is provided. Only "unrestricted controllers" may seed or
//! add to a pool holding the gated token.

use crate::{Address, VmError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferGate {
    /// Token this gate guards.
    pub token: Address,
    pub owner: Address,
    pub unrestricted_controllers: BTreeSet<Address>,
}

impl TransferGate {
    pub fn new(token: Address, owner: Address) -> Self {
        Self {
            token,
            owner,
            unrestricted_controllers: BTreeSet::new(),
        }
    }

    pub fn set_unrestricted_controller(
        &mut self,
        caller: &Address,
        controller: Address,
        allow: bool,
    ) -> Result<(), VmError> {
        if *caller != self.owner {
            return Err(VmError::Unauthorized("Owner only"));
        }
        if allow {
            self.unrestricted_controllers.insert(controller);
        } else {
            self.unrestricted_controllers.remove(&controller);
        }
        Ok(())
    }

    pub fn is_unrestricted(&self, who: &Address) -> bool {
        self.unrestricted_controllers.contains(who)
    }

    /// May `provider` supply liquidity for the guarded token?
    pub fn allows_liquidity(&self, provider: &Address) -> bool {
        self.is_unrestricted(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_manages_controllers() {
        let owner = Address::from_label("owner");
        let controller = Address::from_label("distribution");
        let mut gate = TransferGate::new(Address::from_label("rooted"), owner);

        assert!(!gate.allows_liquidity(&controller));
        gate.set_unrestricted_controller(&owner, controller, true)
            .unwrap();
        assert!(gate.allows_liquidity(&controller));
        gate.set_unrestricted_controller(&owner, controller, false)
            .unwrap();
        assert!(!gate.allows_liquidity(&controller));
    }

    #[test]
    fn test_non_owner_rejected() {
        let mut gate = TransferGate::new(Address::from_label("rooted"), Address::from_label("owner"));
        let intruder = Address::from_label("intruder");
        let err = gate
            .set_unrestricted_controller(&intruder, intruder, true)
            .unwrap_err();
        assert_eq!(err, VmError::Unauthorized("Owner only"));
        assert!(gate.unrestricted_controllers.is_empty());
    }
}
