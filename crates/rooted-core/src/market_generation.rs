// SPDX-License-Identifier: AGPL-3.0-only
//! # Market Generation
//!
//! Contribution ledger of a launch. While active, users contribute the base
//! token into priority rounds and accrue referral points. The owner then
//! either completes the sale, handing the raised pool and the launch-token
//! supply to the bound distribution controller in one step, or aborts it with
//! `allow_refunds`.
//!
//! Rebinding the controller while active opens a refund-safety window
//! (`refund_window_secs`): until it ends `complete` is refused and every
//! contributor may take its contribution back with `claim`.

use crate::config::LaunchConfig;
use crate::error::LaunchError;
use crate::market_distribution::{GenerationSummary, MarketDistributor};
use crate::referral::ReferralBook;
use rooted_vm::{Address, Chain};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketGeneration {
    pub address: Address,
    pub owner: Address,
    pub rooted_token: Address,
    pub base_token: Address,
    /// Receives referral credit for unreferred contributions.
    pub dev: Address,
    pub hard_cap: u128,
    pub min_raise: u128,
    pub rounds: u32,
    pub refund_window_secs: u64,

    pub is_active: bool,
    pub market_distribution: Address,
    pub distribution_changed_at: Option<u64>,
    pub refunds_allowed_until: u64,

    /// user → round → amount
    pub contribution: BTreeMap<Address, BTreeMap<u32, u128>>,
    pub round_totals: BTreeMap<u32, u128>,
    pub total_raised: u128,
    /// Never decremented; reactivation is only allowed while zero.
    pub lifetime_raised: u128,

    pub referrals: ReferralBook,
    pub ref_points: BTreeMap<Address, u128>,
    pub total_ref_points: u128,
    /// user → round → credited address → points, for refund reversal
    ref_credits: BTreeMap<Address, BTreeMap<u32, BTreeMap<Address, u128>>>,

    pub claimed: BTreeMap<Address, BTreeSet<u32>>,
    pub ref_bonus_claimed: BTreeSet<Address>,
    /// Pool and supply forwarded to `market_distribution`.
    pub handed_off: bool,
}

/// Outcome of a single-round claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claimed {
    /// Base token returned during a refund window.
    Refund(u128),
    /// Launch tokens paid by the distribution controller.
    Rooted(u128),
}

impl MarketGeneration {
    pub fn new(
        chain: &mut Chain,
        deployer: &Address,
        rooted_token: Address,
        base_token: Address,
        dev: Address,
        config: &LaunchConfig,
    ) -> Result<Self, LaunchError> {
        config.validate()?;
        chain.token(&rooted_token)?;
        chain.token(&base_token)?;
        if dev.is_zero() {
            return Err(LaunchError::InvalidInput("Dev address required"));
        }
        Ok(Self {
            address: chain.next_address(deployer),
            owner: *deployer,
            rooted_token,
            base_token,
            dev,
            hard_cap: config.hard_cap,
            min_raise: config.min_raise,
            rounds: config.rounds,
            refund_window_secs: config.refund_window_secs,
            is_active: false,
            market_distribution: Address::ZERO,
            distribution_changed_at: None,
            refunds_allowed_until: 0,
            contribution: BTreeMap::new(),
            round_totals: BTreeMap::new(),
            total_raised: 0,
            lifetime_raised: 0,
            referrals: ReferralBook::new(config.referral_mode),
            ref_points: BTreeMap::new(),
            total_ref_points: 0,
            ref_credits: BTreeMap::new(),
            claimed: BTreeMap::new(),
            ref_bonus_claimed: BTreeSet::new(),
            handed_off: false,
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────────────

    pub fn contribution(&self, user: &Address, round: u32) -> u128 {
        self.contribution
            .get(user)
            .and_then(|rounds| rounds.get(&round))
            .copied()
            .unwrap_or(0)
    }

    pub fn round_total(&self, round: u32) -> u128 {
        self.round_totals.get(&round).copied().unwrap_or(0)
    }

    pub fn ref_points(&self, address: &Address) -> u128 {
        self.ref_points.get(address).copied().unwrap_or(0)
    }

    pub fn root_referrer(&self, address: &Address) -> Address {
        self.referrals.root_referrer(address)
    }

    pub fn is_claimed(&self, user: &Address, round: u32) -> bool {
        self.claimed
            .get(user)
            .is_some_and(|rounds| rounds.contains(&round))
    }

    pub fn refund_window_open(&self, now: u64) -> bool {
        now < self.refunds_allowed_until
    }

    fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            base_token: self.base_token,
            total_raised: self.total_raised,
            round_totals: self.round_totals.clone(),
            total_ref_points: self.total_ref_points,
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // OWNER
    // ─────────────────────────────────────────────────────────────────

    fn ensure_owner(&self, caller: &Address) -> Result<(), LaunchError> {
        if *caller != self.owner {
            return Err(LaunchError::Unauthorized("Owner only"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), LaunchError> {
        if !self.is_active {
            return Err(LaunchError::InvalidState("Distribution not active"));
        }
        Ok(())
    }

    pub fn activate(
        &mut self,
        chain: &Chain,
        caller: &Address,
        distribution: Address,
    ) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        if self.is_active || self.refund_window_open(chain.now()) || self.lifetime_raised > 0 {
            return Err(LaunchError::InvalidState("Already activated"));
        }
        if distribution.is_zero() {
            return Err(LaunchError::InvalidInput("Distribution address required"));
        }
        let supply = chain.total_supply(&self.rooted_token)?;
        if chain.balance_of(&self.rooted_token, &self.address)? != supply {
            return Err(LaunchError::Precondition("Missing supply"));
        }
        self.market_distribution = distribution;
        self.distribution_changed_at = Some(chain.now());
        self.is_active = true;
        log::info!("market generation {} active, distribution {}", self.address, distribution);
        Ok(())
    }

    pub fn set_market_distribution(
        &mut self,
        chain: &Chain,
        caller: &Address,
        distribution: Address,
    ) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        self.ensure_active()?;
        if distribution == self.market_distribution {
            return Err(LaunchError::InvalidInput("No change"));
        }
        if distribution.is_zero() {
            return Err(LaunchError::InvalidInput("Distribution address required"));
        }
        let now = chain.now();
        self.market_distribution = distribution;
        self.distribution_changed_at = Some(now);
        self.refunds_allowed_until = now.saturating_add(self.refund_window_secs);
        log::info!(
            "market generation {} rebound to {}, refunds open until {}",
            self.address,
            distribution,
            self.refunds_allowed_until
        );
        Ok(())
    }

    /// Close the sale. With nothing raised this only deactivates; a raise
    /// below `min_raise` is rejected (the owner can `allow_refunds`); otherwise
    /// the pool and the launch supply move to the bound controller, which is
    /// told about the hand-off in the same call.
    pub fn complete(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        distributor: Option<&mut (dyn MarketDistributor + '_)>,
    ) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        self.ensure_active()?;
        if self.refund_window_open(chain.now()) {
            return Err(LaunchError::InvalidState("Refund period is still active"));
        }
        if self.total_raised > 0 && self.total_raised < self.min_raise {
            return Err(LaunchError::Precondition("Raise too small"));
        }
        self.is_active = false;
        if self.total_raised == 0 {
            log::info!("market generation {} completed with nothing raised", self.address);
            return Ok(());
        }

        let distributor =
            distributor.ok_or(LaunchError::UnknownContract(self.market_distribution))?;
        if distributor.address() != self.market_distribution {
            return Err(LaunchError::UnknownContract(self.market_distribution));
        }
        let target = self.market_distribution;
        chain.transfer(&self.base_token, &self.address, &target, self.total_raised)?;
        let supply = chain.balance_of(&self.rooted_token, &self.address)?;
        if supply > 0 {
            chain.transfer(&self.rooted_token, &self.address, &target, supply)?;
        }
        self.handed_off = true;
        log::info!(
            "market generation {} handed {} base and {} rooted to {}",
            self.address,
            self.total_raised,
            supply,
            target
        );
        distributor.distribute(chain, &self.address, &self.summary())
    }

    /// Abort the sale: contributions stay refundable indefinitely.
    pub fn allow_refunds(&mut self, caller: &Address) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        self.ensure_active()?;
        self.is_active = false;
        self.refunds_allowed_until = u64::MAX;
        log::info!("market generation {} aborted, refunds allowed", self.address);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // CONTRIBUTORS
    // ─────────────────────────────────────────────────────────────────

    pub fn contribute(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        amount: u128,
        round: u32,
        referrer: &Address,
    ) -> Result<(), LaunchError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(LaunchError::InvalidInput("Amount must be > 0"));
        }
        if round == 0 || round > self.rounds {
            return Err(LaunchError::InvalidInput("Invalid round"));
        }
        let total = self
            .total_raised
            .checked_add(amount)
            .ok_or(rooted_vm::VmError::Overflow)?;
        if total > self.hard_cap {
            return Err(LaunchError::Precondition("Hard cap reached"));
        }
        chain.transfer_from(&self.base_token, &self.address, caller, &self.address, amount)?;

        *self
            .contribution
            .entry(*caller)
            .or_default()
            .entry(round)
            .or_insert(0) += amount;
        *self.round_totals.entry(round).or_insert(0) += amount;
        self.total_raised = total;
        self.lifetime_raised += amount;

        let target = self.referrals.credit_target(caller, referrer, &self.dev);
        self.referrals.introduce(caller, referrer);
        *self.ref_points.entry(target).or_insert(0) += amount;
        *self.ref_points.entry(*caller).or_insert(0) += amount;
        self.total_ref_points += 2 * amount;
        *self
            .ref_credits
            .entry(*caller)
            .or_default()
            .entry(round)
            .or_default()
            .entry(target)
            .or_insert(0) += amount;

        log::debug!(
            "{} contributed {} to round {}, referral credit to {}",
            caller,
            amount,
            round,
            target
        );
        Ok(())
    }

    /// Settle `caller`'s contribution to `round`: a base-token refund while
    /// refunds are open, otherwise its launch-token share.
    pub fn claim(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        round: u32,
        distributor: Option<&mut (dyn MarketDistributor + '_)>,
    ) -> Result<Claimed, LaunchError> {
        let amount = self.contribution(caller, round);
        if amount == 0 {
            return Err(LaunchError::Precondition("Nothing to claim"));
        }
        if self.is_claimed(caller, round) {
            return Err(LaunchError::AlreadyClaimed("Already claimed"));
        }

        if self.refund_window_open(chain.now()) {
            self.refund(chain, caller, round, amount)?;
            return Ok(Claimed::Refund(amount));
        }

        if !self.handed_off {
            return Err(LaunchError::InvalidState("Distribution not complete"));
        }
        let distributor =
            distributor.ok_or(LaunchError::UnknownContract(self.market_distribution))?;
        self.claimed.entry(*caller).or_default().insert(round);
        let paid = distributor.claim(chain, &self.address, caller, round, amount)?;
        Ok(Claimed::Rooted(paid))
    }

    fn refund(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        round: u32,
        amount: u128,
    ) -> Result<(), LaunchError> {
        chain.transfer(&self.base_token, &self.address, caller, amount)?;

        if let Some(rounds) = self.contribution.get_mut(caller) {
            rounds.remove(&round);
            if rounds.is_empty() {
                self.contribution.remove(caller);
            }
        }
        if let Some(total) = self.round_totals.get_mut(&round) {
            *total -= amount;
        }
        self.total_raised -= amount;

        let credits = self
            .ref_credits
            .get_mut(caller)
            .and_then(|rounds| rounds.remove(&round))
            .unwrap_or_default();
        for (target, points) in credits {
            self.debit_points(&target, points);
            self.debit_points(caller, points);
            self.total_ref_points -= 2 * points;
        }
        log::debug!("{} refunded {} from round {}", caller, amount, round);
        Ok(())
    }

    fn debit_points(&mut self, address: &Address, points: u128) {
        if let Some(balance) = self.ref_points.get_mut(address) {
            *balance = balance.saturating_sub(points);
            if *balance == 0 {
                self.ref_points.remove(address);
            }
        }
    }

    /// Claim every unclaimed round `caller` contributed to. Returns the total
    /// refunded and the total launch tokens paid.
    pub fn claim_all(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        mut distributor: Option<&mut (dyn MarketDistributor + '_)>,
    ) -> Result<(u128, u128), LaunchError> {
        let rounds: Vec<u32> = self
            .contribution
            .get(caller)
            .map(|rounds| {
                rounds
                    .iter()
                    .filter(|(round, amount)| **amount > 0 && !self.is_claimed(caller, **round))
                    .map(|(round, _)| *round)
                    .collect()
            })
            .unwrap_or_default();
        if rounds.is_empty() {
            return Err(LaunchError::Precondition("Nothing to claim"));
        }

        let (mut refunded, mut paid) = (0u128, 0u128);
        for round in rounds {
            match self.claim(chain, caller, round, distributor.as_deref_mut())? {
                Claimed::Refund(amount) => refunded += amount,
                Claimed::Rooted(amount) => paid += amount,
            }
        }
        Ok((refunded, paid))
    }

    pub fn claim_referral_bonus(
        &mut self,
        chain: &mut Chain,
        caller: &Address,
        distributor: Option<&mut (dyn MarketDistributor + '_)>,
    ) -> Result<u128, LaunchError> {
        if !self.handed_off {
            return Err(LaunchError::InvalidState("Distribution not complete"));
        }
        let points = self.ref_points(caller);
        if points == 0 || self.ref_bonus_claimed.contains(caller) {
            return Err(LaunchError::Precondition("No bonus to claim"));
        }
        let distributor =
            distributor.ok_or(LaunchError::UnknownContract(self.market_distribution))?;
        self.ref_bonus_claimed.insert(*caller);
        distributor.claim_ref_bonus(chain, &self.address, caller, points)
    }
}
