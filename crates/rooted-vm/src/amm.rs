// SPDX-License-Identifier: AGPL-3.0-only
//! # Constant-Product AMM
//!
//! Factory + pair bookkeeping for an x·y=k market. The `Chain` acts as the
//! router: it moves tokens into and out of pair addresses and calls into the
//! pair state kept here.
//!
//! ## Pair Model
//! - token_a < token_b (sorted, like the pool id convention)
//! - reserves mirror the token balances held at the pair address
//! - first deposit mints `√(a·b) − MINIMUM_LIQUIDITY` LP, the minimum is locked
//!   at the zero address forever
//! - swaps charge `fee_bps` on the input (30 bps default)

use crate::math::{compute_output, deduct_fee, mul_div, sqrt_product};
use crate::{Address, VmError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default swap fee: 30 bps = 0.3%
pub const DEFAULT_FEE_BPS: u128 = 30;
/// Max fee: 1000 bps = 10%
pub const MAX_FEE_BPS: u128 = 1_000;
/// Minimum liquidity locked forever (prevents price manipulation of empty pools)
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pair {
    pub address: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub total_lp: u128,
    pub fee_bps: u128,
    pub creator: Address,
    /// Timestamp of last trade
    pub last_trade: u64,
    pub lp: BTreeMap<Address, u128>,
}

impl Pair {
    fn new(token_x: Address, token_y: Address, fee_bps: u128, creator: Address) -> Self {
        let (token_a, token_b) = crate::address::sort_pair(&token_x, &token_y);
        Self {
            address: Address::for_pair(&token_a, &token_b),
            token_a,
            token_b,
            reserve_a: 0,
            reserve_b: 0,
            total_lp: 0,
            fee_bps,
            creator,
            last_trade: 0,
            lp: BTreeMap::new(),
        }
    }

    pub fn contains(&self, token: &Address) -> bool {
        *token == self.token_a || *token == self.token_b
    }

    /// Reserve of `token` in this pair.
    pub fn reserve_of(&self, token: &Address) -> Result<u128, VmError> {
        if *token == self.token_a {
            Ok(self.reserve_a)
        } else if *token == self.token_b {
            Ok(self.reserve_b)
        } else {
            Err(VmError::TokenNotInPair(*token))
        }
    }

    pub fn lp_of(&self, holder: &Address) -> u128 {
        self.lp.get(holder).copied().unwrap_or(0)
    }

    /// Output for an exact input of `token_in`, fee included.
    pub fn quote(&self, token_in: &Address, amount_in: u128) -> Result<u128, VmError> {
        let token_out = self.other(token_in)?;
        let reserve_in = self.reserve_of(token_in)?;
        let reserve_out = self.reserve_of(&token_out)?;
        let (after_fee, _fee) = deduct_fee(amount_in, self.fee_bps)?;
        compute_output(after_fee, reserve_in, reserve_out)
    }

    pub fn other(&self, token: &Address) -> Result<Address, VmError> {
        if *token == self.token_a {
            Ok(self.token_b)
        } else if *token == self.token_b {
            Ok(self.token_a)
        } else {
            Err(VmError::TokenNotInPair(*token))
        }
    }

    /// Credit LP shares and reserves for a deposit of `amount_a`/`amount_b`
    /// (sorted order). The caller has already moved the tokens.
    fn mint_liquidity(
        &mut self,
        provider: &Address,
        amount_a: u128,
        amount_b: u128,
    ) -> Result<u128, VmError> {
        if amount_a == 0 || amount_b == 0 {
            return Err(VmError::InvalidInput("Liquidity must be > 0 for both tokens"));
        }
        let minted = if self.total_lp == 0 {
            let initial = sqrt_product(amount_a, amount_b);
            if initial <= MINIMUM_LIQUIDITY {
                return Err(VmError::LiquidityTooSmall);
            }
            *self.lp.entry(Address::ZERO).or_insert(0) += MINIMUM_LIQUIDITY;
            self.total_lp = MINIMUM_LIQUIDITY;
            initial - MINIMUM_LIQUIDITY
        } else {
            let by_a = mul_div(amount_a, self.total_lp, self.reserve_a)?;
            let by_b = mul_div(amount_b, self.total_lp, self.reserve_b)?;
            by_a.min(by_b)
        };
        if minted == 0 {
            return Err(VmError::LiquidityTooSmall);
        }
        self.total_lp = self.total_lp.checked_add(minted).ok_or(VmError::Overflow)?;
        *self.lp.entry(*provider).or_insert(0) += minted;
        self.reserve_a = self.reserve_a.checked_add(amount_a).ok_or(VmError::Overflow)?;
        self.reserve_b = self.reserve_b.checked_add(amount_b).ok_or(VmError::Overflow)?;
        Ok(minted)
    }

    fn apply_swap(
        &mut self,
        token_in: &Address,
        amount_in: u128,
        amount_out: u128,
        now: u64,
    ) -> Result<(), VmError> {
        if *token_in == self.token_a {
            self.reserve_a = self.reserve_a.checked_add(amount_in).ok_or(VmError::Overflow)?;
            self.reserve_b -= amount_out;
        } else {
            self.reserve_b = self.reserve_b.checked_add(amount_in).ok_or(VmError::Overflow)?;
            self.reserve_a -= amount_out;
        }
        self.last_trade = now;
        Ok(())
    }
}

/// Pair factory; pairs are keyed by their derived address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Amm {
    pub fee_bps: u128,
    pub pairs: BTreeMap<Address, Pair>,
}

impl Default for Amm {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_BPS)
    }
}

impl Amm {
    pub fn new(fee_bps: u128) -> Self {
        Self {
            fee_bps: fee_bps.min(MAX_FEE_BPS),
            pairs: BTreeMap::new(),
        }
    }

    /// Pair address for a token pair, or the zero address when none exists.
    pub fn get_pair(&self, token_x: &Address, token_y: &Address) -> Address {
        let address = Address::for_pair(token_x, token_y);
        if self.pairs.contains_key(&address) {
            address
        } else {
            Address::ZERO
        }
    }

    pub fn pair(&self, address: &Address) -> Option<&Pair> {
        self.pairs.get(address)
    }

    pub(crate) fn create_pair(
        &mut self,
        creator: Address,
        token_x: Address,
        token_y: Address,
    ) -> Result<Address, VmError> {
        if token_x == token_y {
            return Err(VmError::InvalidInput("Cannot create pair with identical tokens"));
        }
        if token_x.is_zero() || token_y.is_zero() {
            return Err(VmError::InvalidInput("Cannot create pair with the zero address"));
        }
        let pair = Pair::new(token_x, token_y, self.fee_bps, creator);
        if self.pairs.contains_key(&pair.address) {
            return Err(VmError::PairExists(pair.address));
        }
        let address = pair.address;
        self.pairs.insert(address, pair);
        Ok(address)
    }

    pub(crate) fn pair_mut(&mut self, address: &Address) -> Result<&mut Pair, VmError> {
        self.pairs
            .get_mut(address)
            .ok_or(VmError::PairNotFound(*address))
    }

    /// Record a deposit. Amounts are given per token and sorted here.
    pub(crate) fn record_liquidity(
        &mut self,
        pair: &Address,
        provider: &Address,
        token_x: &Address,
        amount_x: u128,
        amount_y: u128,
    ) -> Result<u128, VmError> {
        let pair = self.pair_mut(pair)?;
        let (amount_a, amount_b) = if *token_x == pair.token_a {
            (amount_x, amount_y)
        } else {
            (amount_y, amount_x)
        };
        pair.mint_liquidity(provider, amount_a, amount_b)
    }

    pub(crate) fn record_swap(
        &mut self,
        pair: &Address,
        token_in: &Address,
        amount_in: u128,
        amount_out: u128,
        now: u64,
    ) -> Result<(), VmError> {
        self.pair_mut(pair)?
            .apply_swap(token_in, amount_in, amount_out, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> (Address, Address) {
        (Address::from_label("base"), Address::from_label("rooted"))
    }

    #[test]
    fn test_get_pair_zero_until_created() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        assert_eq!(amm.get_pair(&x, &y), Address::ZERO);
        let pair = amm.create_pair(Address::from_label("owner"), x, y).unwrap();
        assert_eq!(amm.get_pair(&x, &y), pair);
        assert_eq!(amm.get_pair(&y, &x), pair);
    }

    #[test]
    fn test_create_pair_rejects_duplicates_and_identical() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        let creator = Address::from_label("owner");
        amm.create_pair(creator, x, y).unwrap();
        assert!(matches!(
            amm.create_pair(creator, y, x),
            Err(VmError::PairExists(_))
        ));
        assert!(amm.create_pair(creator, x, x).is_err());
    }

    #[test]
    fn test_initial_liquidity_locks_minimum() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        let provider = Address::from_label("lp");
        let pair = amm.create_pair(provider, x, y).unwrap();
        let minted = amm
            .record_liquidity(&pair, &provider, &x, 1_000_000, 4_000_000)
            .unwrap();
        // √(4·10^12) = 2_000_000
        assert_eq!(minted, 2_000_000 - MINIMUM_LIQUIDITY);
        let p = amm.pair(&pair).unwrap();
        assert_eq!(p.total_lp, 2_000_000);
        assert_eq!(p.lp_of(&Address::ZERO), MINIMUM_LIQUIDITY);
        assert_eq!(p.reserve_of(&x).unwrap(), 1_000_000);
        assert_eq!(p.reserve_of(&y).unwrap(), 4_000_000);
    }

    #[test]
    fn test_initial_liquidity_too_small() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        let provider = Address::from_label("lp");
        let pair = amm.create_pair(provider, x, y).unwrap();
        assert_eq!(
            amm.record_liquidity(&pair, &provider, &x, 10, 10),
            Err(VmError::LiquidityTooSmall)
        );
    }

    #[test]
    fn test_proportional_liquidity() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        let provider = Address::from_label("lp");
        let pair = amm.create_pair(provider, x, y).unwrap();
        amm.record_liquidity(&pair, &provider, &x, 1_000_000, 1_000_000)
            .unwrap();
        let minted = amm
            .record_liquidity(&pair, &provider, &x, 500_000, 900_000)
            .unwrap();
        // limited by the smaller ratio (x side): 500_000 · 1_000_000 / 1_000_000
        assert_eq!(minted, 500_000);
    }

    #[test]
    fn test_quote_includes_fee() {
        let (x, y) = tokens();
        let mut amm = Amm::default();
        let provider = Address::from_label("lp");
        let pair = amm.create_pair(provider, x, y).unwrap();
        amm.record_liquidity(&pair, &provider, &x, 10_000_000, 10_000_000)
            .unwrap();
        let p = amm.pair(&pair).unwrap();
        // 1_000_000 in, 3_000 fee → 997_000 · 10^7 / 10_997_000
        assert_eq!(p.quote(&x, 1_000_000).unwrap(), 906_610);
        assert!(p.quote(&Address::from_label("other"), 1).is_err());
    }
}
