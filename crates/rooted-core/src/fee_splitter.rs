// SPDX-License-Identifier: AGPL-3.0-only
//! Treasury fee splitter: whatever balance of a token it holds is burned and
//! paid out to collectors by basis points of the whole balance. Basis points
//! left unallocated stay behind as residual balance.

use crate::error::LaunchError;
use rooted_vm::math::{bps_of, BPS_DENOMINATOR};
use rooted_vm::{Address, Chain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeConfig {
    pub burn_rate: u128,
    pub collectors: Vec<Address>,
    /// Aligned by index with `collectors`.
    pub rates: Vec<u128>,
}

/// Result of one payout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payout {
    pub burned: u128,
    pub paid: Vec<(Address, u128)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSplitter {
    pub address: Address,
    pub owner: Address,
    pub fees: BTreeMap<Address, FeeConfig>,
}

impl FeeSplitter {
    pub fn new(chain: &mut Chain, deployer: &Address) -> Self {
        Self {
            address: chain.next_address(deployer),
            owner: *deployer,
            fees: BTreeMap::new(),
        }
    }

    pub fn burn_rate(&self, token: &Address) -> u128 {
        self.fees.get(token).map(|f| f.burn_rate).unwrap_or(0)
    }

    pub fn fee_collectors(&self, token: &Address) -> &[Address] {
        self.fees
            .get(token)
            .map(|f| f.collectors.as_slice())
            .unwrap_or(&[])
    }

    pub fn fee_rates(&self, token: &Address) -> &[u128] {
        self.fees
            .get(token)
            .map(|f| f.rates.as_slice())
            .unwrap_or(&[])
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), LaunchError> {
        if *caller != self.owner {
            return Err(LaunchError::Unauthorized("Owner only"));
        }
        Ok(())
    }

    /// Replace the configuration for `token`. A balance held under a previous
    /// configuration is paid out with that configuration first.
    pub fn set_fees(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        token: &Address,
        burn_rate: u128,
        collectors: Vec<Address>,
        rates: Vec<u128>,
    ) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        if collectors.is_empty() || collectors.len() != rates.len() {
            return Err(LaunchError::InvalidInput(
                "Fee Collectors and Rates should be the same size and not empty",
            ));
        }
        let allocated = rates
            .iter()
            .try_fold(burn_rate, |acc, rate| acc.checked_add(*rate))
            .ok_or(rooted_vm::VmError::Overflow)?;
        if allocated > BPS_DENOMINATOR {
            return Err(LaunchError::InvalidInput("Fee rates exceed 100%"));
        }

        if self.fees.contains_key(token) && chain.balance_of(token, &self.address)? > 0 {
            self.pay_fees(chain, token)?;
        }
        self.fees.insert(
            *token,
            FeeConfig {
                burn_rate,
                collectors,
                rates,
            },
        );
        log::info!(
            "fee splitter {} configured {}: burn {} bps",
            self.address,
            token,
            burn_rate
        );
        Ok(())
    }

    pub fn pay_fees(&mut self, chain: &mut Chain, token: &Address) -> Result<Payout, LaunchError> {
        let balance = chain.balance_of(token, &self.address)?;
        if balance == 0 {
            return Err(LaunchError::Precondition("Nothing to pay"));
        }
        let config = self
            .fees
            .get(token)
            .ok_or(LaunchError::Precondition("Fees not configured"))?;

        let mut payout = Payout {
            burned: bps_of(balance, config.burn_rate)?,
            paid: Vec::with_capacity(config.collectors.len()),
        };
        if payout.burned > 0 {
            chain.burn(token, &self.address, payout.burned)?;
        }
        for (collector, rate) in config.collectors.iter().zip(&config.rates) {
            let amount = bps_of(balance, *rate)?;
            if amount > 0 {
                chain.transfer(token, &self.address, collector, amount)?;
            }
            payout.paid.push((*collector, amount));
        }
        log::info!(
            "fee splitter {} paid {} of {}: burned {}",
            self.address,
            balance,
            token,
            payout.burned
        );
        Ok(payout)
    }

    /// Sweep the whole balance of an unconfigured token to the owner.
    pub fn recover_tokens(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        token: &Address,
    ) -> Result<u128, LaunchError> {
        self.ensure_owner(caller)?;
        if self.fees.contains_key(token) {
            return Err(LaunchError::InvalidState("Fees configured for token"));
        }
        let balance = chain.balance_of(token, &self.address)?;
        if balance > 0 {
            chain.transfer(token, &self.address, &self.owner, balance)?;
        }
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rooted_vm::ONE_TOKEN;

    fn owner() -> Address {
        Address::from_label("owner")
    }
    fn collector1() -> Address {
        Address::from_label("collector1")
    }
    fn collector2() -> Address {
        Address::from_label("collector2")
    }

    fn setup() -> (Chain, Address, FeeSplitter) {
        let mut chain = Chain::default();
        let token = chain
            .deploy_token(&owner(), "Rooted", "ROOT", 18, 1_000 * ONE_TOKEN)
            .unwrap();
        let splitter = FeeSplitter::new(&mut chain, &owner());
        (chain, token, splitter)
    }

    fn configure(chain: &mut Chain, token: &Address, splitter: &mut FeeSplitter) {
        splitter
            .set_fees(
                chain,
                &owner(),
                token,
                2_000,
                vec![collector1(), collector2()],
                vec![2_500, 5_500],
            )
            .unwrap();
    }

    #[test]
    fn test_set_fees_stores_config() {
        let (mut chain, token, mut splitter) = setup();
        configure(&mut chain, &token, &mut splitter);
        assert_eq!(splitter.burn_rate(&token), 2_000);
        assert_eq!(splitter.fee_collectors(&token), &[collector1(), collector2()]);
        assert_eq!(splitter.fee_rates(&token), &[2_500, 5_500]);
    }

    #[test]
    fn test_set_fees_validation() {
        let (mut chain, token, mut splitter) = setup();
        let reason = "Fee Collectors and Rates should be the same size and not empty";
        let err = splitter
            .set_fees(&mut chain, &owner(), &token, 2_000, vec![collector1(), collector2()], vec![2_500])
            .unwrap_err();
        assert_eq!(err.to_string(), reason);
        let err = splitter
            .set_fees(&mut chain, &owner(), &token, 2_000, vec![], vec![])
            .unwrap_err();
        assert_eq!(err.to_string(), reason);
        assert!(splitter
            .set_fees(&mut chain, &owner(), &token, 5_000, vec![collector1()], vec![6_000])
            .is_err());
        assert_eq!(
            splitter
                .set_fees(&mut chain, &collector1(), &token, 0, vec![collector1()], vec![1])
                .unwrap_err(),
            LaunchError::Unauthorized("Owner only")
        );
    }

    #[test]
    fn test_pay_fees_nothing_to_pay() {
        let (mut chain, token, mut splitter) = setup();
        assert_eq!(
            splitter.pay_fees(&mut chain, &token).unwrap_err().to_string(),
            "Nothing to pay"
        );
    }

    #[test]
    fn test_pay_fees_splits_whole_balance() {
        let (mut chain, token, mut splitter) = setup();
        configure(&mut chain, &token, &mut splitter);
        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        let payout = splitter.pay_fees(&mut chain, &token).unwrap();
        assert_eq!(payout.burned, 20 * ONE_TOKEN);
        assert_eq!(chain.balance_of(&token, &splitter.address).unwrap(), 0);
        assert_eq!(chain.balance_of(&token, &collector1()).unwrap(), 25 * ONE_TOKEN);
        assert_eq!(chain.balance_of(&token, &collector2()).unwrap(), 55 * ONE_TOKEN);
        assert_eq!(chain.total_supply(&token).unwrap(), 980 * ONE_TOKEN);
    }

    #[test]
    fn test_unallocated_rates_stay_as_residual() {
        let (mut chain, token, mut splitter) = setup();
        splitter
            .set_fees(&mut chain, &owner(), &token, 1_000, vec![collector1()], vec![5_000])
            .unwrap();
        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        splitter.pay_fees(&mut chain, &token).unwrap();
        assert_eq!(chain.balance_of(&token, &splitter.address).unwrap(), 40 * ONE_TOKEN);
    }

    #[test]
    fn test_reconfigure_pays_previous_config() {
        let (mut chain, token, mut splitter) = setup();
        configure(&mut chain, &token, &mut splitter);
        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        splitter
            .set_fees(&mut chain, &owner(), &token, 0, vec![owner()], vec![10_000])
            .unwrap();
        assert_eq!(chain.balance_of(&token, &splitter.address).unwrap(), 0);
        assert_eq!(chain.balance_of(&token, &collector1()).unwrap(), 25 * ONE_TOKEN);
        assert_eq!(chain.balance_of(&token, &collector2()).unwrap(), 55 * ONE_TOKEN);
        assert_eq!(splitter.fee_collectors(&token), &[owner()]);
    }

    #[test]
    fn test_first_config_does_not_pay() {
        let (mut chain, token, mut splitter) = setup();
        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        configure(&mut chain, &token, &mut splitter);
        assert_eq!(
            chain.balance_of(&token, &splitter.address).unwrap(),
            100 * ONE_TOKEN
        );
    }

    #[test]
    fn test_recover_only_when_unconfigured() {
        let (mut chain, token, mut splitter) = setup();
        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        assert!(splitter
            .recover_tokens(&mut chain, &collector1(), &token)
            .is_err());
        let recovered = splitter.recover_tokens(&mut chain, &owner(), &token).unwrap();
        assert_eq!(recovered, 100 * ONE_TOKEN);
        assert_eq!(
            chain.balance_of(&token, &owner()).unwrap(),
            chain.total_supply(&token).unwrap()
        );

        chain
            .transfer(&token, &owner(), &splitter.address, 100 * ONE_TOKEN)
            .unwrap();
        configure(&mut chain, &token, &mut splitter);
        assert!(splitter.recover_tokens(&mut chain, &owner(), &token).is_err());
        assert_eq!(
            chain.balance_of(&token, &splitter.address).unwrap(),
            100 * ONE_TOKEN
        );
    }
}
