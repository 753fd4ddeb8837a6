// SPDX-License-Identifier: AGPL-3.0-only
//! Referral resolution.
//!
//! Every participant is introduced at most once. An introduction is only
//! recorded for an address nobody has been introduced through yet, so edges
//! always leave a source node and the introducer graph stays acyclic. The
//! root of each introduced address is cached when the edge is recorded;
//! since an address that introduced someone never gets an introducer of its
//! own, cached roots never go stale and `root_referrer` is a plain lookup.

use crate::config::ReferralMode;
use rooted_vm::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralBook {
    pub mode: ReferralMode,
    /// contributor → the address that introduced it
    introducer: BTreeMap<Address, Address>,
    /// contributor → root of its introduction chain
    root: BTreeMap<Address, Address>,
    /// addresses somebody was introduced through
    introducers: BTreeSet<Address>,
}

impl ReferralBook {
    pub fn new(mode: ReferralMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Root of `address`'s introduction chain (itself when never introduced).
    pub fn root_referrer(&self, address: &Address) -> Address {
        self.root.get(address).copied().unwrap_or(*address)
    }

    pub fn introducer_of(&self, address: &Address) -> Option<Address> {
        self.introducer.get(address).copied()
    }

    /// Address credited for a contribution by `contributor` naming `referrer`.
    pub fn credit_target(&self, contributor: &Address, referrer: &Address, dev: &Address) -> Address {
        if referrer.is_zero()
            || referrer == contributor
            || self.root_referrer(referrer) == *contributor
        {
            return *dev;
        }
        match self.mode {
            ReferralMode::Root => self.root_referrer(referrer),
            ReferralMode::Direct => *referrer,
        }
    }

    /// Record `referrer` as `contributor`'s introducer when allowed.
    /// Returns whether an introduction was recorded.
    pub fn introduce(&mut self, contributor: &Address, referrer: &Address) -> bool {
        if referrer.is_zero()
            || referrer == contributor
            || self.introducer.contains_key(contributor)
            || self.introducers.contains(contributor)
        {
            return false;
        }
        let root = self.root_referrer(referrer);
        if root == *contributor {
            return false;
        }
        self.introducer.insert(*contributor, *referrer);
        self.root.insert(*contributor, root);
        self.introducers.insert(*referrer);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_zero_and_self_referrer_credit_dev() {
        let book = ReferralBook::default();
        let (user, dev) = (addr("user"), addr("dev"));
        assert_eq!(book.credit_target(&user, &Address::ZERO, &dev), dev);
        assert_eq!(book.credit_target(&user, &user, &dev), dev);
    }

    #[test]
    fn test_root_mode_collapses_chain() {
        let mut book = ReferralBook::new(ReferralMode::Root);
        let (owner, user1, user2, dev) = (addr("owner"), addr("user1"), addr("user2"), addr("dev"));

        assert_eq!(book.credit_target(&user1, &owner, &dev), owner);
        assert!(book.introduce(&user1, &owner));
        // user2 names user1, credit flows to user1's root
        assert_eq!(book.credit_target(&user2, &user1, &dev), owner);
        assert!(book.introduce(&user2, &user1));
        assert_eq!(book.root_referrer(&user2), owner);
        assert_eq!(book.introducer_of(&user2), Some(user1));
    }

    #[test]
    fn test_direct_mode_credits_named_referrer() {
        let mut book = ReferralBook::new(ReferralMode::Direct);
        let (owner, user1, user2, dev) = (addr("owner"), addr("user1"), addr("user2"), addr("dev"));
        book.introduce(&user1, &owner);
        assert_eq!(book.credit_target(&user2, &user1, &dev), user1);
    }

    #[test]
    fn test_chain_back_to_contributor_credits_dev() {
        let mut book = ReferralBook::default();
        let (a, b, dev) = (addr("a"), addr("b"), addr("dev"));
        assert!(book.introduce(&a, &b));
        // b naming a would credit b itself through the chain
        assert_eq!(book.credit_target(&b, &a, &dev), dev);
        assert!(!book.introduce(&b, &a));
    }

    #[test]
    fn test_introducers_never_get_introduced() {
        let mut book = ReferralBook::default();
        let (a, b, c) = (addr("a"), addr("b"), addr("c"));
        assert!(book.introduce(&a, &b));
        // b already introduced someone: stays a root
        assert!(!book.introduce(&b, &c));
        assert_eq!(book.root_referrer(&a), b);
        assert_eq!(book.root_referrer(&b), b);
        // first introduction sticks
        assert!(!book.introduce(&a, &c));
        assert_eq!(book.introducer_of(&a), Some(b));
    }
}
