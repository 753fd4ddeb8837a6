// SPDX-License-Identifier: AGPL-3.0-only
//! # Market Distribution
//!
//! Receives the raised base-token pool and the launch-token supply from the
//! market generation ledger and turns them into two seeded markets plus
//! pre-bought launch tokens the ledger's contributors later claim.
//!
//! ```text
//!  collected ──┬─ dev cut (9%) ────────────── ½ base → dev, ½ buys rooted → dev
//!              └─ remaining ─┬─ referral (2%) ── buys rooted → referral reserve
//!                            └─ remaining ─┬─ manipulation (9%) ── buys rooted,
//!                                          │     split per round by round share
//!                                          └─ liquidity ─┬─ ½ wrapped → elite/rooted
//!                                                        └─ ½ base/rooted
//! ```
//!
//! Each percentage applies to what is left after the previous one, and
//! integer division truncates: dust always lands in the liquidity remainder.
//!
//! Lifecycle: `setup_elite_rooted` + `setup_base_rooted` → `complete_setup`,
//! and independently the ledger's hand-off (`distribute`). Whichever of
//! `complete_setup` and `distribute` comes last runs the distribution.

use crate::config::LaunchConfig;
use crate::error::LaunchError;
use rooted_vm::math::{bps_of, mul_div, BPS_DENOMINATOR};
use rooted_vm::{Address, Chain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the ledger hands over together with the tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationSummary {
    pub base_token: Address,
    pub total_raised: u128,
    pub round_totals: BTreeMap<u32, u128>,
    pub total_ref_points: u128,
}

/// The ledger-facing side of a distribution controller.
///
/// `ledger` is always the calling market generation's address; implementors
/// bind it on `distribute` and reject claims from anyone else.
pub trait MarketDistributor {
    fn address(&self) -> Address;

    /// Hand-off entry: the pool and the supply already sit at `address()`.
    fn distribute(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        summary: &GenerationSummary,
    ) -> Result<(), LaunchError>;

    /// Pay `user` its share of the launch tokens bought for `round`.
    fn claim(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        user: &Address,
        round: u32,
        contribution: u128,
    ) -> Result<u128, LaunchError>;

    /// Pay `user` its share of the referral pre-buy.
    fn claim_ref_bonus(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        user: &Address,
        points: u128,
    ) -> Result<u128, LaunchError>;
}

/// Split of the collected pool, in base-token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub dev_cut: u128,
    pub referral: u128,
    pub manipulation: u128,
    pub liquidity: u128,
}

impl Partition {
    pub fn compute(
        collected: u128,
        dev_cut_bps: u128,
        referral_bps: u128,
        manipulation_bps: u128,
    ) -> Result<Self, LaunchError> {
        if [dev_cut_bps, referral_bps, manipulation_bps]
            .iter()
            .any(|bps| *bps > BPS_DENOMINATOR)
        {
            return Err(LaunchError::InvalidInput("Percent exceeds 100%"));
        }
        let dev_cut = bps_of(collected, dev_cut_bps)?;
        let remaining = collected - dev_cut;
        let referral = bps_of(remaining, referral_bps)?;
        let remaining = remaining - referral;
        let manipulation = bps_of(remaining, manipulation_bps)?;
        Ok(Self {
            dev_cut,
            referral,
            manipulation,
            liquidity: remaining - manipulation,
        })
    }

    pub fn total(&self) -> u128 {
        self.dev_cut + self.referral + self.manipulation + self.liquidity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketDistribution {
    pub address: Address,
    pub owner: Address,
    pub rooted_token: Address,
    pub elite_token: Address,
    /// Backing token of the elite token; the raised asset.
    pub base_token: Address,
    pub dev: Address,

    pub dev_cut_bps: u128,
    pub pre_buy_for_referrals_bps: u128,
    pub pre_buy_for_market_manipulation_bps: u128,

    pub elite_rooted_pair: Address,
    pub base_rooted_pair: Address,
    pub setup_complete: bool,

    /// Ledger that handed off; bound on `distribute`.
    pub market_generation: Option<Address>,
    pub distribution_complete: bool,
    pub total_base_token_collected: u128,
    pub round_totals: BTreeMap<u32, u128>,
    pub total_ref_points: u128,

    pub total_rooted_token_bought_per_round: BTreeMap<u32, u128>,
    pub total_bought_for_referrals: u128,

    /// user → round → contribution the ledger forwarded
    pub claim_call_amount: BTreeMap<Address, BTreeMap<u32, u128>>,
    /// user → referral points the ledger forwarded
    pub claim_ref_bonus_call_amount: BTreeMap<Address, u128>,
}

impl MarketDistribution {
    /// Deploy a controller for `rooted_token`, seeding against `elite_token`
    /// and its backing token.
    pub fn new(
        chain: &mut Chain,
        deployer: &Address,
        rooted_token: Address,
        elite_token: Address,
        dev: Address,
        config: &LaunchConfig,
    ) -> Result<Self, LaunchError> {
        config.validate()?;
        chain.token(&rooted_token)?;
        let base_token = chain
            .token(&elite_token)?
            .backing
            .ok_or(LaunchError::InvalidInput("Elite token must wrap a base token"))?;
        if dev.is_zero() {
            return Err(LaunchError::InvalidInput("Dev address required"));
        }
        Ok(Self {
            address: chain.next_address(deployer),
            owner: *deployer,
            rooted_token,
            elite_token,
            base_token,
            dev,
            dev_cut_bps: config.dev_cut_bps,
            pre_buy_for_referrals_bps: config.pre_buy_for_referrals_bps,
            pre_buy_for_market_manipulation_bps: config.pre_buy_for_market_manipulation_bps,
            elite_rooted_pair: Address::ZERO,
            base_rooted_pair: Address::ZERO,
            setup_complete: false,
            market_generation: None,
            distribution_complete: false,
            total_base_token_collected: 0,
            round_totals: BTreeMap::new(),
            total_ref_points: 0,
            total_rooted_token_bought_per_round: BTreeMap::new(),
            total_bought_for_referrals: 0,
            claim_call_amount: BTreeMap::new(),
            claim_ref_bonus_call_amount: BTreeMap::new(),
        })
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), LaunchError> {
        if *caller != self.owner {
            return Err(LaunchError::Unauthorized("Owner only"));
        }
        Ok(())
    }

    fn ensure_ledger(&self, ledger: &Address) -> Result<(), LaunchError> {
        if self.market_generation != Some(*ledger) {
            return Err(LaunchError::Unauthorized("Market generation only"));
        }
        Ok(())
    }

    pub fn setup_elite_rooted(&mut self, chain: &mut Chain, caller: &Address) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        if !self.elite_rooted_pair.is_zero() {
            return Err(LaunchError::InvalidState("Already set up"));
        }
        self.elite_rooted_pair = self.ensure_pair(chain, self.elite_token)?;
        log::info!("elite/rooted pair {} ready", self.elite_rooted_pair);
        Ok(())
    }

    pub fn setup_base_rooted(&mut self, chain: &mut Chain, caller: &Address) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        if !self.base_rooted_pair.is_zero() {
            return Err(LaunchError::InvalidState("Already set up"));
        }
        self.base_rooted_pair = self.ensure_pair(chain, self.base_token)?;
        log::info!("base/rooted pair {} ready", self.base_rooted_pair);
        Ok(())
    }

    fn ensure_pair(&self, chain: &mut Chain, other: Address) -> Result<Address, LaunchError> {
        let existing = chain.get_pair(&other, &self.rooted_token);
        if !existing.is_zero() {
            return Ok(existing);
        }
        Ok(chain.create_pair(&self.address, &other, &self.rooted_token)?)
    }

    pub fn complete_setup(&mut self, chain: &mut Chain, caller: &Address) -> Result<(), LaunchError> {
        self.ensure_owner(caller)?;
        if self.setup_complete {
            return Err(LaunchError::InvalidState("Already set up"));
        }
        if self.elite_rooted_pair.is_zero() || self.base_rooted_pair.is_zero() {
            return Err(LaunchError::Precondition("Pairs not set up"));
        }
        self.setup_complete = true;
        log::info!("distribution {} setup complete", self.address);
        if self.market_generation.is_some() {
            self.run_distribution(chain)?;
        }
        Ok(())
    }

    pub fn is_distribution_complete(&self) -> bool {
        self.distribution_complete
    }

    pub fn claim_call_amount(&self, user: &Address, round: u32) -> u128 {
        self.claim_call_amount
            .get(user)
            .and_then(|rounds| rounds.get(&round))
            .copied()
            .unwrap_or(0)
    }

    pub fn claim_ref_bonus_call_amount(&self, user: &Address) -> u128 {
        self.claim_ref_bonus_call_amount
            .get(user)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_rooted_token_bought(&self, round: u32) -> u128 {
        self.total_rooted_token_bought_per_round
            .get(&round)
            .copied()
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────
    // DISTRIBUTION RUN
    // ─────────────────────────────────────────────────────────────────

    fn run_distribution(&mut self, chain: &mut Chain) -> Result<(), LaunchError> {
        let collected = self.total_base_token_collected;
        let mut rooted_supply = chain.balance_of(&self.rooted_token, &self.address)?;
        if rooted_supply == 0 {
            // zero-supply launch token: mint one launch token per base unit raised
            chain.mint(&self.rooted_token, &self.address, &self.address, collected)?;
            rooted_supply = collected;
        }

        let split = Partition::compute(
            collected,
            self.dev_cut_bps,
            self.pre_buy_for_referrals_bps,
            self.pre_buy_for_market_manipulation_bps,
        )?;
        log::debug!("partition of {}: {:?}", collected, split);

        let elite_base = split.liquidity / 2;
        let rooted_for_elite = rooted_supply / 2;
        chain.wrap(&self.elite_token, &self.address, elite_base)?;
        chain.add_liquidity(
            &self.address,
            &self.elite_token,
            &self.rooted_token,
            elite_base,
            rooted_for_elite,
        )?;
        chain.add_liquidity(
            &self.address,
            &self.base_token,
            &self.rooted_token,
            split.liquidity - elite_base,
            rooted_supply - rooted_for_elite,
        )?;

        self.total_bought_for_referrals = self.buy_rooted(chain, split.referral, &self.address)?;

        let bought = self.buy_rooted(chain, split.manipulation, &self.address)?;
        let mut per_round = BTreeMap::new();
        for (round, total) in &self.round_totals {
            per_round.insert(*round, mul_div(bought, *total, collected)?);
        }
        self.total_rooted_token_bought_per_round = per_round;

        let dev_base = split.dev_cut / 2;
        chain.transfer(&self.base_token, &self.address, &self.dev, dev_base)?;
        let dev = self.dev;
        self.buy_rooted(chain, split.dev_cut - dev_base, &dev)?;

        self.distribution_complete = true;
        log::info!(
            "distribution {} complete: collected {}, bought {} for rounds, {} for referrals",
            self.address,
            collected,
            bought,
            self.total_bought_for_referrals
        );
        Ok(())
    }

    /// Dust that would buy nothing stays with the controller.
    fn buy_rooted(&self, chain: &mut Chain, amount: u128, to: &Address) -> Result<u128, LaunchError> {
        if amount == 0 || chain.quote(&self.base_token, &self.rooted_token, amount)? == 0 {
            return Ok(0);
        }
        Ok(chain.swap_exact_in(
            &self.address,
            &self.base_token,
            &self.rooted_token,
            amount,
            0,
            to,
        )?)
    }
}

impl MarketDistributor for MarketDistribution {
    fn address(&self) -> Address {
        self.address
    }

    fn distribute(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        summary: &GenerationSummary,
    ) -> Result<(), LaunchError> {
        if self.market_generation.is_some() {
            return Err(LaunchError::InvalidState("Already distributed"));
        }
        if summary.base_token != self.base_token {
            return Err(LaunchError::InvalidInput("Base token mismatch"));
        }
        if chain.balance_of(&self.base_token, &self.address)? < summary.total_raised {
            return Err(LaunchError::Precondition("Missing base token"));
        }
        self.market_generation = Some(*ledger);
        self.total_base_token_collected = summary.total_raised;
        self.round_totals = summary.round_totals.clone();
        self.total_ref_points = summary.total_ref_points;
        log::info!(
            "distribution {} received {} base from {}",
            self.address,
            summary.total_raised,
            ledger
        );
        if self.setup_complete {
            self.run_distribution(chain)?;
        }
        Ok(())
    }

    fn claim(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        user: &Address,
        round: u32,
        contribution: u128,
    ) -> Result<u128, LaunchError> {
        self.ensure_ledger(ledger)?;
        if !self.distribution_complete {
            return Err(LaunchError::InvalidState("Distribution not complete"));
        }
        if self.claim_call_amount.get(user).is_some_and(|r| r.contains_key(&round)) {
            return Err(LaunchError::AlreadyClaimed("Already claimed"));
        }
        let round_total = self.round_totals.get(&round).copied().unwrap_or(0);
        if round_total == 0 || contribution == 0 {
            return Err(LaunchError::Precondition("Nothing to claim"));
        }
        let share = mul_div(self.total_rooted_token_bought(round), contribution, round_total)?;
        if share > 0 {
            chain.transfer(&self.rooted_token, &self.address, user, share)?;
        }
        self.claim_call_amount
            .entry(*user)
            .or_default()
            .insert(round, contribution);
        log::debug!("{} claimed {} rooted for round {}", user, share, round);
        Ok(share)
    }

    fn claim_ref_bonus(
        &mut self,
        chain: &mut Chain,
        ledger: &Address,
        user: &Address,
        points: u128,
    ) -> Result<u128, LaunchError> {
        self.ensure_ledger(ledger)?;
        if !self.distribution_complete {
            return Err(LaunchError::InvalidState("Distribution not complete"));
        }
        if self.claim_ref_bonus_call_amount.contains_key(user) {
            return Err(LaunchError::AlreadyClaimed("No bonus to claim"));
        }
        if points == 0 || self.total_ref_points == 0 {
            return Err(LaunchError::Precondition("No bonus to claim"));
        }
        let share = mul_div(self.total_bought_for_referrals, points, self.total_ref_points)?;
        if share > 0 {
            chain.transfer(&self.rooted_token, &self.address, user, share)?;
        }
        self.claim_ref_bonus_call_amount.insert(*user, points);
        log::debug!("{} claimed {} rooted referral bonus", user, share);
        Ok(share)
    }
}
