// SPDX-License-Identifier: AGPL-3.0-only
//! # World
//!
//! Host chain plus every deployed launch contract. Each entry point runs as
//! one transaction: the whole world is snapshotted first and restored when
//! the call fails anywhere down the call chain (ledger → controller → AMM →
//! tokens), so a rejected call never leaves partial state behind.

use crate::config::LaunchConfig;
use crate::error::LaunchError;
use crate::fee_splitter::{FeeSplitter, Payout};
use crate::market_distribution::{MarketDistribution, MarketDistributor};
use crate::market_generation::{Claimed, MarketGeneration};
use rooted_vm::{Address, Chain, VmError, GENESIS_TIMESTAMP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct World {
    pub chain: Chain,
    pub generations: BTreeMap<Address, MarketGeneration>,
    pub distributions: BTreeMap<Address, MarketDistribution>,
    pub splitters: BTreeMap<Address, FeeSplitter>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(&LaunchConfig::default())
    }
}

impl World {
    pub fn new(config: &LaunchConfig) -> Self {
        Self {
            chain: Chain::new(GENESIS_TIMESTAMP, config.swap_fee_bps),
            generations: BTreeMap::new(),
            distributions: BTreeMap::new(),
            splitters: BTreeMap::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }

    pub fn now(&self) -> u64 {
        self.chain.now()
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.chain.advance_time(secs);
    }

    /// Run `f` atomically over the whole world.
    pub fn transact<T, F>(&mut self, f: F) -> Result<T, LaunchError>
    where
        F: FnOnce(&mut Self) -> Result<T, LaunchError>,
    {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("transaction reverted: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // DEPLOYMENT
    // ─────────────────────────────────────────────────────────────────

    pub fn deploy_market_generation(
        &mut self,
        deployer: &Address,
        rooted_token: Address,
        base_token: Address,
        dev: Address,
        config: &LaunchConfig,
    ) -> Result<Address, LaunchError> {
        self.transact(|w| {
            let generation =
                MarketGeneration::new(&mut w.chain, deployer, rooted_token, base_token, dev, config)?;
            let address = generation.address;
            w.generations.insert(address, generation);
            log::info!("market generation deployed at {}", address);
            Ok(address)
        })
    }

    pub fn deploy_market_distribution(
        &mut self,
        deployer: &Address,
        rooted_token: Address,
        elite_token: Address,
        dev: Address,
        config: &LaunchConfig,
    ) -> Result<Address, LaunchError> {
        self.transact(|w| {
            let distribution = MarketDistribution::new(
                &mut w.chain,
                deployer,
                rooted_token,
                elite_token,
                dev,
                config,
            )?;
            let address = distribution.address;
            w.distributions.insert(address, distribution);
            log::info!("market distribution deployed at {}", address);
            Ok(address)
        })
    }

    pub fn deploy_fee_splitter(&mut self, deployer: &Address) -> Address {
        let splitter = FeeSplitter::new(&mut self.chain, deployer);
        let address = splitter.address;
        self.splitters.insert(address, splitter);
        address
    }

    // ─────────────────────────────────────────────────────────────────
    // LOOKUP
    // ─────────────────────────────────────────────────────────────────

    pub fn generation(&self, address: &Address) -> Result<&MarketGeneration, LaunchError> {
        self.generations
            .get(address)
            .ok_or(LaunchError::UnknownContract(*address))
    }

    pub fn distribution(&self, address: &Address) -> Result<&MarketDistribution, LaunchError> {
        self.distributions
            .get(address)
            .ok_or(LaunchError::UnknownContract(*address))
    }

    pub fn splitter(&self, address: &Address) -> Result<&FeeSplitter, LaunchError> {
        self.splitters
            .get(address)
            .ok_or(LaunchError::UnknownContract(*address))
    }

    /// Run `f` against a ledger, handing it the controller it is bound to
    /// (when that controller lives in this world).
    fn call_generation<T, F>(&mut self, generation: &Address, f: F) -> Result<T, LaunchError>
    where
        F: FnOnce(
            &mut MarketGeneration,
            &mut Chain,
            Option<&mut dyn MarketDistributor>,
        ) -> Result<T, LaunchError>,
    {
        self.transact(|w| {
            let ledger = w
                .generations
                .get_mut(generation)
                .ok_or(LaunchError::UnknownContract(*generation))?;
            let distributor = w
                .distributions
                .get_mut(&ledger.market_distribution)
                .map(|d| d as &mut dyn MarketDistributor);
            f(ledger, &mut w.chain, distributor)
        })
    }

    fn call_distribution<T, F>(&mut self, distribution: &Address, f: F) -> Result<T, LaunchError>
    where
        F: FnOnce(&mut MarketDistribution, &mut Chain) -> Result<T, LaunchError>,
    {
        self.transact(|w| {
            let controller = w
                .distributions
                .get_mut(distribution)
                .ok_or(LaunchError::UnknownContract(*distribution))?;
            f(controller, &mut w.chain)
        })
    }

    fn call_splitter<T, F>(&mut self, splitter: &Address, f: F) -> Result<T, LaunchError>
    where
        F: FnOnce(&mut FeeSplitter, &mut Chain) -> Result<T, LaunchError>,
    {
        self.transact(|w| {
            let contract = w
                .splitters
                .get_mut(splitter)
                .ok_or(LaunchError::UnknownContract(*splitter))?;
            f(contract, &mut w.chain)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // MARKET GENERATION
    // ─────────────────────────────────────────────────────────────────

    pub fn activate(
        &mut self,
        generation: &Address,
        caller: &Address,
        distribution: Address,
    ) -> Result<(), LaunchError> {
        self.call_generation(generation, |ledger, chain, _| {
            ledger.activate(chain, caller, distribution)
        })
    }

    pub fn set_market_distribution(
        &mut self,
        generation: &Address,
        caller: &Address,
        distribution: Address,
    ) -> Result<(), LaunchError> {
        self.call_generation(generation, |ledger, chain, _| {
            ledger.set_market_distribution(chain, caller, distribution)
        })
    }

    pub fn contribute(
        &mut self,
        generation: &Address,
        caller: &Address,
        amount: u128,
        round: u32,
        referrer: &Address,
    ) -> Result<(), LaunchError> {
        self.call_generation(generation, |ledger, chain, _| {
            ledger.contribute(chain, caller, amount, round, referrer)
        })
    }

    pub fn complete(&mut self, generation: &Address, caller: &Address) -> Result<(), LaunchError> {
        self.call_generation(generation, |ledger, chain, distributor| {
            ledger.complete(chain, caller, distributor)
        })
    }

    pub fn allow_refunds(&mut self, generation: &Address, caller: &Address) -> Result<(), LaunchError> {
        self.call_generation(generation, |ledger, _, _| ledger.allow_refunds(caller))
    }

    pub fn claim(
        &mut self,
        generation: &Address,
        caller: &Address,
        round: u32,
    ) -> Result<Claimed, LaunchError> {
        self.call_generation(generation, |ledger, chain, distributor| {
            ledger.claim(chain, caller, round, distributor)
        })
    }

    /// Returns (base refunded, launch tokens paid).
    pub fn claim_all(
        &mut self,
        generation: &Address,
        caller: &Address,
    ) -> Result<(u128, u128), LaunchError> {
        self.call_generation(generation, |ledger, chain, distributor| {
            ledger.claim_all(chain, caller, distributor)
        })
    }

    pub fn claim_referral_bonus(
        &mut self,
        generation: &Address,
        caller: &Address,
    ) -> Result<u128, LaunchError> {
        self.call_generation(generation, |ledger, chain, distributor| {
            ledger.claim_referral_bonus(chain, caller, distributor)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // MARKET DISTRIBUTION
    // ─────────────────────────────────────────────────────────────────

    pub fn setup_elite_rooted(
        &mut self,
        distribution: &Address,
        caller: &Address,
    ) -> Result<(), LaunchError> {
        self.call_distribution(distribution, |controller, chain| {
            controller.setup_elite_rooted(chain, caller)
        })
    }

    pub fn setup_base_rooted(
        &mut self,
        distribution: &Address,
        caller: &Address,
    ) -> Result<(), LaunchError> {
        self.call_distribution(distribution, |controller, chain| {
            controller.setup_base_rooted(chain, caller)
        })
    }

    pub fn complete_setup(
        &mut self,
        distribution: &Address,
        caller: &Address,
    ) -> Result<(), LaunchError> {
        self.call_distribution(distribution, |controller, chain| {
            controller.complete_setup(chain, caller)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // FEE SPLITTER
    // ─────────────────────────────────────────────────────────────────

    pub fn set_fees(
        &mut self,
        splitter: &Address,
        caller: &Address,
        token: &Address,
        burn_rate: u128,
        collectors: Vec<Address>,
        rates: Vec<u128>,
    ) -> Result<(), LaunchError> {
        self.call_splitter(splitter, |contract, chain| {
            contract.set_fees(chain, caller, token, burn_rate, collectors, rates)
        })
    }

    pub fn pay_fees(&mut self, splitter: &Address, token: &Address) -> Result<Payout, LaunchError> {
        self.call_splitter(splitter, |contract, chain| contract.pay_fees(chain, token))
    }

    pub fn recover_tokens(
        &mut self,
        splitter: &Address,
        caller: &Address,
        token: &Address,
    ) -> Result<u128, LaunchError> {
        self.call_splitter(splitter, |contract, chain| {
            contract.recover_tokens(chain, caller, token)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // PERSISTENCE
    // ─────────────────────────────────────────────────────────────────

    /// Serialize chain and contract state as JSON.
    pub fn export_state(&self) -> Result<String, LaunchError> {
        serde_json::to_string(self)
            .map_err(|e| LaunchError::Vm(VmError::Serialization(e.to_string())))
    }

    pub fn import_state(data: &str) -> Result<Self, LaunchError> {
        serde_json::from_str(data)
            .map_err(|e| LaunchError::Vm(VmError::Serialization(e.to_string())))
    }
}
