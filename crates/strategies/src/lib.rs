//! # Strategy Library
//!
//! This crate contains the core trading logic for the system: normalization
//! of an untrusted strategy spec (§4.1), the condition evaluator dispatch
//! table (§4.5's signal evaluation contract), and `DeclarativeStrategy`, the
//! spec-driven `MultiAssetStrategy` that backs every generated strategy.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of
//!   databases, APIs, or execution. It depends only on `core-types` and
//!   `indicators`.
//! - **Strategy Agnostic Engine:** higher-level crates (`backtester`,
//!   `live-engine`) operate against the `MultiAssetStrategy` trait, never
//!   against `DeclarativeStrategy` directly.
//!
//! ## Public API
//!
//! - `MultiAssetStrategy`: the trait the backtest core / live engine host.
//! - `normalize`: untrusted JSON -> validated `StrategySpec`.
//! - `conditions`: the condition evaluator dispatch table.
//! - `DeclarativeStrategy`: the concrete spec-driven strategy.

// Declare all the modules that constitute this crate.
pub mod conditions;
pub mod declarative;
pub mod error;
pub mod feeds;
pub mod normalize;

// Re-export the key components to create a clean, public-facing API.
pub use declarative::{AdditionalInfoSnapshot, DeclarativeStrategy, MultiAssetStrategy};
pub use error::StrategyError;
pub use feeds::{DataFeeds, NoFeeds, PrefetchedFeeds};
pub use normalize::{normalize, normalize_pct};