// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ROOTED - LAUNCH CONTRACTS
//
// Token launch protocol on top of `rooted-vm`.
// - MarketGeneration: round-based contribution ledger with referral points
// - MarketDistribution: turns the raised pool into seeded markets
// - FeeSplitter: burns and pays out accumulated fee tokens
// - World: host chain + deployed contracts, one transaction per call
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// TOML / env configuration
pub mod config;
pub mod error;
// Burn + collector payouts by basis points
pub mod fee_splitter;
// Pool partitioning, pair seeding, pre-buys and claims
pub mod market_distribution;
// Contribution ledger
pub mod market_generation;
// Introducer graph + credit resolution
pub mod referral;
pub mod world;

pub use config::{LaunchConfig, ReferralMode};
pub use error::LaunchError;
pub use fee_splitter::{FeeConfig, FeeSplitter, Payout};
pub use market_distribution::{GenerationSummary, MarketDistribution, MarketDistributor, Partition};
pub use market_generation::{Claimed, MarketGeneration};
pub use referral::ReferralBook;
pub use world::World;
