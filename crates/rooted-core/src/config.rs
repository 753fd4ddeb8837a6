// SPDX-License-Identifier: AGPL-3.0-only
use crate::error::LaunchError;
use rooted_vm::math::BPS_DENOMINATOR;
use rooted_vm::{DEFAULT_FEE_BPS, ONE_TOKEN};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::Path;

/// Serde adapter for u128 ↔ TOML: serialize as string, deserialize from string or integer.
/// TOML crate doesn't natively support u128, so we round-trip through strings.
mod u128_toml {
    use super::*;

    pub fn serialize<S: Serializer>(val: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        use serde::de::{self, Visitor};
        struct U128Visitor;

        impl<'de> Visitor<'de> for U128Visitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a u128 as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                if v >= 0 {
                    Ok(v as u128)
                } else {
                    Err(E::custom("negative value for u128"))
                }
            }
        }

        d.deserialize_any(U128Visitor)
    }
}

/// Refund-safety window applied when the bound distribution changes (24h).
pub const DEFAULT_REFUND_WINDOW_SECS: u64 = 86_400;
pub const DEFAULT_ROUNDS: u32 = 3;
/// Smallest pool `complete` hands off; below it the seeded pairs cannot lock
/// their minimum liquidity.
pub const DEFAULT_MIN_RAISE: u128 = 1_000_000;
/// Upper bound on priority rounds a launch may configure.
pub const MAX_ROUNDS: u32 = 32;
pub const DEFAULT_DEV_CUT_BPS: u128 = 900;
pub const DEFAULT_PRE_BUY_FOR_REFERRALS_BPS: u128 = 200;
pub const DEFAULT_PRE_BUY_FOR_MARKET_MANIPULATION_BPS: u128 = 900;

/// Where referral credit for a contribution lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferralMode {
    /// Credit the root of the referrer's introduction chain.
    #[default]
    Root,
    /// Credit the named referrer itself.
    Direct,
}

impl std::str::FromStr for ReferralMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(ReferralMode::Root),
            "direct" => Ok(ReferralMode::Direct),
            other => Err(format!("Unknown referral mode: {}", other)),
        }
    }
}

/// Launch parameters shared by the ledger and the distribution controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    #[serde(with = "u128_toml")]
    pub hard_cap: u128,
    #[serde(with = "u128_toml")]
    pub min_raise: u128,
    pub refund_window_secs: u64,
    pub rounds: u32,
    pub referral_mode: ReferralMode,
    #[serde(with = "u128_toml")]
    pub dev_cut_bps: u128,
    #[serde(with = "u128_toml")]
    pub pre_buy_for_referrals_bps: u128,
    #[serde(with = "u128_toml")]
    pub pre_buy_for_market_manipulation_bps: u128,
    #[serde(with = "u128_toml")]
    pub swap_fee_bps: u128,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            hard_cap: 100 * ONE_TOKEN,
            min_raise: DEFAULT_MIN_RAISE,
            refund_window_secs: DEFAULT_REFUND_WINDOW_SECS,
            rounds: DEFAULT_ROUNDS,
            referral_mode: ReferralMode::Root,
            dev_cut_bps: DEFAULT_DEV_CUT_BPS,
            pre_buy_for_referrals_bps: DEFAULT_PRE_BUY_FOR_REFERRALS_BPS,
            pre_buy_for_market_manipulation_bps: DEFAULT_PRE_BUY_FOR_MARKET_MANIPULATION_BPS,
            swap_fee_bps: DEFAULT_FEE_BPS,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, LaunchError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| LaunchError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl LaunchConfig {
    /// Load launch config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, LaunchError> {
        let content = fs::read_to_string(path)
            .map_err(|e| LaunchError::Config(format!("{}: {}", path.display(), e)))?;
        let config: LaunchConfig =
            toml::from_str(&content).map_err(|e| LaunchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load launch config from `ROOTED_*` environment variables; unset
    /// variables keep their defaults.
    pub fn load_from_env() -> Result<Self, LaunchError> {
        let d = Self::default();
        let config = Self {
            hard_cap: env_or("ROOTED_HARD_CAP", d.hard_cap)?,
            min_raise: env_or("ROOTED_MIN_RAISE", d.min_raise)?,
            refund_window_secs: env_or("ROOTED_REFUND_WINDOW_SECS", d.refund_window_secs)?,
            rounds: env_or("ROOTED_ROUNDS", d.rounds)?,
            referral_mode: env_or("ROOTED_REFERRAL_MODE", d.referral_mode)?,
            dev_cut_bps: env_or("ROOTED_DEV_CUT_BPS", d.dev_cut_bps)?,
            pre_buy_for_referrals_bps: env_or(
                "ROOTED_PRE_BUY_FOR_REFERRALS_BPS",
                d.pre_buy_for_referrals_bps,
            )?,
            pre_buy_for_market_manipulation_bps: env_or(
                "ROOTED_PRE_BUY_FOR_MARKET_MANIPULATION_BPS",
                d.pre_buy_for_market_manipulation_bps,
            )?,
            swap_fee_bps: env_or("ROOTED_SWAP_FEE_BPS", d.swap_fee_bps)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save launch config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), LaunchError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LaunchError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| LaunchError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.hard_cap == 0 {
            return Err(LaunchError::Config("hard_cap must be > 0".to_string()));
        }
        if self.min_raise > self.hard_cap {
            return Err(LaunchError::Config(
                "min_raise must be <= hard_cap".to_string(),
            ));
        }
        if self.rounds == 0 || self.rounds > MAX_ROUNDS {
            return Err(LaunchError::Config(format!(
                "rounds must be 1-{}",
                MAX_ROUNDS
            )));
        }
        for (name, bps) in [
            ("dev_cut_bps", self.dev_cut_bps),
            ("pre_buy_for_referrals_bps", self.pre_buy_for_referrals_bps),
            (
                "pre_buy_for_market_manipulation_bps",
                self.pre_buy_for_market_manipulation_bps,
            ),
        ] {
            if bps > BPS_DENOMINATOR {
                return Err(LaunchError::Config(format!(
                    "{} must be <= {}",
                    name, BPS_DENOMINATOR
                )));
            }
        }
        if self.swap_fee_bps > rooted_vm::amm::MAX_FEE_BPS {
            return Err(LaunchError::Config(format!(
                "swap_fee_bps must be <= {}",
                rooted_vm::amm::MAX_FEE_BPS
            )));
        }
        Ok(())
    }
}
