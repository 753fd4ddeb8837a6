// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ROOTED - EXECUTION HOST
//
// In-process chain the launch contracts run against.
// - Monotonic block clock (seconds)
// - Fungible token ledgers, elite wrapper tokens, transfer gates
// - Constant-product AMM factory/router
// - All-or-nothing execution via snapshot/rollback (`transact`)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// 20-byte addresses, deterministic derivation
pub mod address;
// Constant-product pairs + factory
pub mod amm;
// Liquidity authorization for gated tokens
pub mod gate;
// Integer math (isqrt, mul_div, basis points)
pub mod math;
// ERC-20-style token ledger
pub mod token;

pub use address::Address;
pub use amm::{Amm, Pair, DEFAULT_FEE_BPS, MINIMUM_LIQUIDITY};
pub use gate::TransferGate;
pub use token::{Token, TokenMetadata};

/// One whole token at 18 decimals.
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Insufficient balance: {holder} has {have}, needs {need}")]
    InsufficientBalance {
        holder: Address,
        have: u128,
        need: u128,
    },
    #[error("Allowance exceeded: approved {have}, requested {need}")]
    AllowanceExceeded { have: u128, need: u128 },
    #[error("Unknown token {0}")]
    UnknownToken(Address),
    #[error("Unknown transfer gate {0}")]
    UnknownGate(Address),
    #[error("Pair not found: {0}")]
    PairNotFound(Address),
    #[error("Token {0} is not part of this pair")]
    TokenNotInPair(Address),
    #[error("Pair already exists: {0}")]
    PairExists(Address),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Insufficient liquidity minted")]
    LiquidityTooSmall,
    #[error("Slippage: output {out} below minimum {min}")]
    Slippage { out: u128, min: u128 },
    #[error("Transfer gate restricts liquidity for {0}")]
    GateRestricted(Address),
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Clock cannot go backwards: now {now}, requested {requested}")]
    ClockRewind { now: u64, requested: u64 },
    #[error("State serialization failed: {0}")]
    Serialization(String),
}

/// Event emitted during execution (stored for inspection by tests/indexers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainEvent {
    pub emitter: Address,
    pub event_type: String,
    pub data: BTreeMap<String, String>,
    pub timestamp: u64,
}

/// Genesis timestamp used by `Chain::default()`.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chain {
    timestamp: u64,
    /// Deployment nonce per deployer (address derivation).
    nonces: BTreeMap<Address, u64>,
    tokens: BTreeMap<Address, Token>,
    gates: BTreeMap<Address, TransferGate>,
    amm: Amm,
    events: Vec<ChainEvent>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(GENESIS_TIMESTAMP, DEFAULT_FEE_BPS)
    }
}

impl Chain {
    pub fn new(timestamp: u64, swap_fee_bps: u128) -> Self {
        Self {
            timestamp,
            nonces: BTreeMap::new(),
            tokens: BTreeMap::new(),
            gates: BTreeMap::new(),
            amm: Amm::new(swap_fee_bps),
            events: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // CLOCK
    // ─────────────────────────────────────────────────────────────────

    pub fn now(&self) -> u64 {
        self.timestamp
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.timestamp = self.timestamp.saturating_add(secs);
    }

    pub fn set_time(&mut self, timestamp: u64) -> Result<(), VmError> {
        if timestamp < self.timestamp {
            return Err(VmError::ClockRewind {
                now: self.timestamp,
                requested: timestamp,
            });
        }
        self.timestamp = timestamp;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // EXECUTION
    // ─────────────────────────────────────────────────────────────────

    /// Next contract address for `deployer` (bumps its nonce).
    pub fn next_address(&mut self, deployer: &Address) -> Address {
        let nonce = self.nonces.entry(*deployer).or_insert(0);
        let address = Address::derive(deployer, *nonce);
        *nonce += 1;
        address
    }

    /// Run `f` atomically: on error every change made by `f` is discarded.
    pub fn transact<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("chain transaction reverted: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    pub fn emit(&mut self, emitter: Address, event_type: &str, data: BTreeMap<String, String>) {
        self.events.push(ChainEvent {
            emitter,
            event_type: event_type.to_string(),
            data,
            timestamp: self.timestamp,
        });
    }

    pub fn events(&self) -> &[ChainEvent] {
        &self.events
    }

    // ─────────────────────────────────────────────────────────────────
    // DEPLOYMENT
    // ─────────────────────────────────────────────────────────────────

    /// Deploy a token; the whole supply goes to `deployer`, who becomes owner.
    pub fn deploy_token(
        &mut self,
        deployer: &Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        total_supply: u128,
    ) -> Result<Address, VmError> {
        let token = Token::new(name, symbol, decimals, total_supply, *deployer)?;
        let address = self.next_address(deployer);
        self.tokens.insert(address, token);
        let mut data = BTreeMap::new();
        data.insert("symbol".to_string(), symbol.to_string());
        data.insert("supply".to_string(), total_supply.to_string());
        self.emit(address, "TokenDeployed", data);
        log::info!("token {} deployed at {}", symbol, address);
        Ok(address)
    }

    /// Deploy an elite wrapper over `backing`.
    pub fn deploy_elite_token(
        &mut self,
        deployer: &Address,
        name: &str,
        symbol: &str,
        backing: &Address,
    ) -> Result<Address, VmError> {
        let decimals = self.token(backing)?.metadata.decimals;
        let token = Token::new_wrapper(name, symbol, decimals, *backing, *deployer)?;
        let address = self.next_address(deployer);
        self.tokens.insert(address, token);
        log::info!("elite token {} deployed at {} backed by {}", symbol, address, backing);
        Ok(address)
    }

    /// Deploy a transfer gate guarding `token`, owned by `deployer`.
    pub fn deploy_transfer_gate(
        &mut self,
        deployer: &Address,
        token: &Address,
    ) -> Result<Address, VmError> {
        self.token(token)?;
        let address = self.next_address(deployer);
        self.gates
            .insert(address, TransferGate::new(*token, *deployer));
        Ok(address)
    }

    // ─────────────────────────────────────────────────────────────────
    // TOKENS
    // ─────────────────────────────────────────────────────────────────

    pub fn token(&self, token: &Address) -> Result<&Token, VmError> {
        self.tokens.get(token).ok_or(VmError::UnknownToken(*token))
    }

    fn token_mut(&mut self, token: &Address) -> Result<&mut Token, VmError> {
        self.tokens
            .get_mut(token)
            .ok_or(VmError::UnknownToken(*token))
    }

    pub fn gate(&self, gate: &Address) -> Result<&TransferGate, VmError> {
        self.gates.get(gate).ok_or(VmError::UnknownGate(*gate))
    }

    pub fn balance_of(&self, token: &Address, holder: &Address) -> Result<u128, VmError> {
        Ok(self.token(token)?.balance_of(holder))
    }

    pub fn total_supply(&self, token: &Address) -> Result<u128, VmError> {
        Ok(self.token(token)?.total_supply())
    }

    pub fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128, VmError> {
        Ok(self.token(token)?.allowance(owner, spender))
    }

    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), VmError> {
        self.token_mut(token)?.transfer(from, to, amount)?;
        self.emit_transfer(token, from, to, amount);
        Ok(())
    }

    pub fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), VmError> {
        self.token_mut(token)?.approve(owner, spender, amount);
        let mut data = BTreeMap::new();
        data.insert("owner".to_string(), owner.to_string());
        data.insert("spender".to_string(), spender.to_string());
        data.insert("amount".to_string(), amount.to_string());
        self.emit(*token, "Approval", data);
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), VmError> {
        self.token_mut(token)?
            .transfer_from(spender, from, to, amount)?;
        self.emit_transfer(token, from, to, amount);
        Ok(())
    }

    pub fn burn(&mut self, token: &Address, holder: &Address, amount: u128) -> Result<(), VmError> {
        self.token_mut(token)?.burn(holder, amount)?;
        self.emit_transfer(token, holder, &Address::ZERO, amount);
        Ok(())
    }

    pub fn set_minter(
        &mut self,
        token: &Address,
        caller: &Address,
        minter: Address,
    ) -> Result<(), VmError> {
        self.token_mut(token)?.set_minter(caller, minter)
    }

    pub fn mint(
        &mut self,
        token: &Address,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), VmError> {
        self.token_mut(token)?.mint(caller, to, amount)?;
        self.emit_transfer(token, &Address::ZERO, to, amount);
        Ok(())
    }

    /// Attach (or detach with the zero address) a transfer gate to `token`.
    pub fn set_transfer_gate(
        &mut self,
        token: &Address,
        caller: &Address,
        gate: Address,
    ) -> Result<(), VmError> {
        if !gate.is_zero() && self.gate(&gate)?.token != *token {
            return Err(VmError::InvalidInput("Gate guards a different token"));
        }
        self.token_mut(token)?.set_transfer_gate(caller, gate)
    }

    pub fn set_unrestricted_controller(
        &mut self,
        gate: &Address,
        caller: &Address,
        controller: Address,
        allow: bool,
    ) -> Result<(), VmError> {
        self.gates
            .get_mut(gate)
            .ok_or(VmError::UnknownGate(*gate))?
            .set_unrestricted_controller(caller, controller, allow)
    }

    /// Lock `amount` of the backing token in `elite` and mint the same amount
    /// of elite to `holder`.
    pub fn wrap(&mut self, elite: &Address, holder: &Address, amount: u128) -> Result<(), VmError> {
        self.transact(|chain| {
            let backing = chain.backing_of(elite)?;
            chain.transfer(&backing, holder, elite, amount)?;
            chain.token_mut(elite)?.credit(holder, amount)?;
            chain.emit_transfer(elite, &Address::ZERO, holder, amount);
            Ok(())
        })
    }

    /// Burn `amount` of elite from `holder` and release the backing token.
    pub fn unwrap(&mut self, elite: &Address, holder: &Address, amount: u128) -> Result<(), VmError> {
        self.transact(|chain| {
            let backing = chain.backing_of(elite)?;
            chain.burn(elite, holder, amount)?;
            chain.transfer(&backing, elite, holder, amount)
        })
    }

    fn backing_of(&self, elite: &Address) -> Result<Address, VmError> {
        self.token(elite)?
            .backing
            .ok_or(VmError::InvalidInput("Token is not a wrapper"))
    }

    fn emit_transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128) {
        let mut data = BTreeMap::new();
        data.insert("from".to_string(), from.to_string());
        data.insert("to".to_string(), to.to_string());
        data.insert("amount".to_string(), amount.to_string());
        self.emit(*token, "Transfer", data);
    }

    // ─────────────────────────────────────────────────────────────────
    // AMM (factory + router)
    // ─────────────────────────────────────────────────────────────────

    pub fn create_pair(
        &mut self,
        creator: &Address,
        token_x: &Address,
        token_y: &Address,
    ) -> Result<Address, VmError> {
        self.token(token_x)?;
        self.token(token_y)?;
        let pair = self.amm.create_pair(*creator, *token_x, *token_y)?;
        let mut data = BTreeMap::new();
        data.insert("token_x".to_string(), token_x.to_string());
        data.insert("token_y".to_string(), token_y.to_string());
        self.emit(pair, "PairCreated", data);
        log::debug!("pair {} created for {}/{}", pair, token_x, token_y);
        Ok(pair)
    }

    /// Pair address, or the zero address when the pair does not exist.
    pub fn get_pair(&self, token_x: &Address, token_y: &Address) -> Address {
        self.amm.get_pair(token_x, token_y)
    }

    pub fn pair(&self, pair: &Address) -> Option<&Pair> {
        self.amm.pair(pair)
    }

    /// Deposit both sides into the pair (created if missing). Gated tokens
    /// only accept liquidity from their gate's unrestricted controllers.
    /// Returns the pair address and the LP minted to `provider`.
    pub fn add_liquidity(
        &mut self,
        provider: &Address,
        token_x: &Address,
        token_y: &Address,
        amount_x: u128,
        amount_y: u128,
    ) -> Result<(Address, u128), VmError> {
        self.transact(|chain| {
            chain.ensure_liquidity_allowed(token_x, provider)?;
            chain.ensure_liquidity_allowed(token_y, provider)?;
            let mut pair = chain.get_pair(token_x, token_y);
            if pair.is_zero() {
                pair = chain.create_pair(provider, token_x, token_y)?;
            }
            chain.transfer(token_x, provider, &pair, amount_x)?;
            chain.transfer(token_y, provider, &pair, amount_y)?;
            let minted = chain
                .amm
                .record_liquidity(&pair, provider, token_x, amount_x, amount_y)?;
            let mut data = BTreeMap::new();
            data.insert("provider".to_string(), provider.to_string());
            data.insert("amount_x".to_string(), amount_x.to_string());
            data.insert("amount_y".to_string(), amount_y.to_string());
            data.insert("lp".to_string(), minted.to_string());
            chain.emit(pair, "LiquidityAdded", data);
            Ok((pair, minted))
        })
    }

    fn ensure_liquidity_allowed(&self, token: &Address, provider: &Address) -> Result<(), VmError> {
        match self.token(token)?.transfer_gate {
            Some(gate) if !self.gate(&gate)?.allows_liquidity(provider) => {
                Err(VmError::GateRestricted(*token))
            }
            _ => Ok(()),
        }
    }

    /// Output for an exact input, fee included.
    pub fn quote(
        &self,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
    ) -> Result<u128, VmError> {
        let pair = self.amm.get_pair(token_in, token_out);
        self.amm
            .pair(&pair)
            .ok_or(VmError::PairNotFound(pair))?
            .quote(token_in, amount_in)
    }

    /// Swap an exact `amount_in` of `token_in` from `trader`; the output is
    /// sent to `to`. Fails when the output is below `min_out`.
    pub fn swap_exact_in(
        &mut self,
        trader: &Address,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
        min_out: u128,
        to: &Address,
    ) -> Result<u128, VmError> {
        if amount_in == 0 {
            return Err(VmError::InvalidInput("Swap amount must be > 0"));
        }
        self.transact(|chain| {
            let pair = chain.get_pair(token_in, token_out);
            let amount_out = chain.quote(token_in, token_out, amount_in)?;
            if amount_out == 0 || amount_out < min_out {
                return Err(VmError::Slippage {
                    out: amount_out,
                    min: min_out,
                });
            }
            chain.transfer(token_in, trader, &pair, amount_in)?;
            chain.transfer(token_out, &pair, to, amount_out)?;
            let now = chain.timestamp;
            chain
                .amm
                .record_swap(&pair, token_in, amount_in, amount_out, now)?;
            let mut data = BTreeMap::new();
            data.insert("trader".to_string(), trader.to_string());
            data.insert("token_in".to_string(), token_in.to_string());
            data.insert("amount_in".to_string(), amount_in.to_string());
            data.insert("amount_out".to_string(), amount_out.to_string());
            chain.emit(pair, "Swap", data);
            log::debug!(
                "swap {} {} -> {} {} via {}",
                amount_in,
                token_in,
                amount_out,
                token_out,
                pair
            );
            Ok(amount_out)
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // PERSISTENCE
    // ─────────────────────────────────────────────────────────────────

    /// Serialize the whole chain (tokens, gates, pairs, clock, events).
    pub fn export_state(&self) -> Result<String, VmError> {
        serde_json::to_string(self).map_err(|e| VmError::Serialization(e.to_string()))
    }

    pub fn import_state(data: &str) -> Result<Self, VmError> {
        serde_json::from_str(data).map_err(|e| VmError::Serialization(e.to_string()))
    }
}
