// SPDX-License-Identifier: AGPL-3.0-only
//! # Fungible Tokens
//!
//! In-process ERC-20-style token ledger used for every asset in a launch:
//! plain test tokens (the base asset), the rooted launch token (owner-settable
//! minter and transfer gate) and the elite token (a 1:1 wrapper over a backing
//! token).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Token                                              │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────────────┐  │
//! │  │ Metadata  │  │ Balances │  │ Allowances       │  │
//! │  │ name      │  │ addr→u128│  │ owner→spender    │  │
//! │  │ symbol    │  │          │  │   →u128          │  │
//! │  │ decimals  │  │          │  │                  │  │
//! │  │ supply    │  │          │  │                  │  │
//! │  └──────────┘  └──────────┘  └──────────────────┘  │
//! │  owner · minter · transfer_gate · backing          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are atomic units (`u128`). Methods validate before mutating, so a
//! failed call never leaves a half-applied balance change.

use crate::{Address, VmError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token metadata fixed at deployment (supply tracks mint/burn).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Human-readable name (e.g. "Rooted")
    pub name: String,
    /// Ticker symbol, max 8 characters
    pub symbol: String,
    /// Decimal places for display (0-18)
    pub decimals: u8,
    /// Current total supply in atomic units
    pub total_supply: u128,
}

impl TokenMetadata {
    pub fn validate(&self) -> Result<(), VmError> {
        if self.name.is_empty() || self.name.len() > 64 {
            return Err(VmError::InvalidInput("Name must be 1-64 characters"));
        }
        if self.symbol.is_empty() || self.symbol.len() > 8 {
            return Err(VmError::InvalidInput("Symbol must be 1-8 characters"));
        }
        if self.decimals > 18 {
            return Err(VmError::InvalidInput("Decimals must be 0-18"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub metadata: TokenMetadata,
    /// Deployer; may set the minter and the transfer gate.
    pub owner: Address,
    pub balances: BTreeMap<Address, u128>,
    /// owner → spender → allowance
    pub allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// Only address allowed to mint (none = fixed supply).
    #[serde(default)]
    pub minter: Option<Address>,
    /// Gate consulted before liquidity for this token is provided.
    #[serde(default)]
    pub transfer_gate: Option<Address>,
    /// Backing token for wrapper tokens (elite): 1 wrapped = 1 backing.
    #[serde(default)]
    pub backing: Option<Address>,
}

impl Token {
    /// Create a token with `total_supply` assigned to `creator`.
    pub fn new(
        name: &str,
        symbol: &str,
        decimals: u8,
        total_supply: u128,
        creator: Address,
    ) -> Result<Self, VmError> {
        let metadata = TokenMetadata {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply,
        };
        metadata.validate()?;

        let mut balances = BTreeMap::new();
        if total_supply > 0 {
            balances.insert(creator, total_supply);
        }

        Ok(Self {
            metadata,
            owner: creator,
            balances,
            allowances: BTreeMap::new(),
            minter: None,
            transfer_gate: None,
            backing: None,
        })
    }

    /// Create a wrapper token over `backing`. Supply starts at zero and
    /// follows wraps/unwraps.
    pub fn new_wrapper(
        name: &str,
        symbol: &str,
        decimals: u8,
        backing: Address,
        creator: Address,
    ) -> Result<Self, VmError> {
        if backing.is_zero() {
            return Err(VmError::InvalidInput("Wrapper must specify a backing token"));
        }
        let mut token = Self::new(name, symbol, decimals, 0, creator)?;
        token.backing = Some(backing);
        Ok(token)
    }

    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.metadata.total_supply
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), VmError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(VmError::InsufficientBalance {
                holder: *from,
                have: from_balance,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(VmError::Overflow)?;
        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), VmError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(VmError::AllowanceExceeded {
                have: allowance,
                need: amount,
            });
        }
        self.transfer(from, to, amount)?;
        self.approve(from, spender, allowance - amount);
        Ok(())
    }

    /// Permanently remove `amount` from `holder` and from the supply.
    pub fn burn(&mut self, holder: &Address, amount: u128) -> Result<(), VmError> {
        let balance = self.balance_of(holder);
        if balance < amount {
            return Err(VmError::InsufficientBalance {
                holder: *holder,
                have: balance,
                need: amount,
            });
        }
        self.set_balance(holder, balance - amount);
        self.metadata.total_supply = self.metadata.total_supply.saturating_sub(amount);
        Ok(())
    }

    /// Mint without authorization checks (wrap path and `mint`).
    pub(crate) fn credit(&mut self, to: &Address, amount: u128) -> Result<(), VmError> {
        let supply = self
            .metadata
            .total_supply
            .checked_add(amount)
            .ok_or(VmError::Overflow)?;
        let balance = self.balance_of(to).checked_add(amount).ok_or(VmError::Overflow)?;
        self.metadata.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    pub fn mint(&mut self, caller: &Address, to: &Address, amount: u128) -> Result<(), VmError> {
        if self.minter != Some(*caller) {
            return Err(VmError::Unauthorized("Minter only"));
        }
        self.credit(to, amount)
    }

    pub fn set_minter(&mut self, caller: &Address, minter: Address) -> Result<(), VmError> {
        self.ensure_owner(caller)?;
        self.minter = Some(minter);
        Ok(())
    }

    pub fn set_transfer_gate(&mut self, caller: &Address, gate: Address) -> Result<(), VmError> {
        self.ensure_owner(caller)?;
        self.transfer_gate = if gate.is_zero() { None } else { Some(gate) };
        Ok(())
    }

    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), VmError> {
        if *caller != self.owner {
            return Err(VmError::Unauthorized("Owner only"));
        }
        Ok(())
    }

    // Zero balances are pruned so snapshots compare by value.
    fn set_balance(&mut self, holder: &Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(*holder, amount);
        }
    }
}
