//! # Broker abstraction crate (SPEC_FULL §4.4)
//!
//! This crate provides the uniform `Broker` trait over a simulated broker
//! (backtesting) and a live broker (an external broker API), plus the
//! `Portfolio` state machine that both implementations apply trades against.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** `Portfolio` is the state machine that
//!   applies the effect of a fill to cash/positions; `Broker` impls are the
//!   thing that decides whether and at what price a fill happens.
//! - **Execution Abstraction:** higher-level components (`backtester`,
//!   `live-engine`) depend only on `Broker`, never on which impl backs it.
//!
//! ## Public API
//!
//! - `Broker`: the core trait for both broker implementations.
//! - `SimulatedBroker` / `LiveBroker`: the two implementations.
//! - `Portfolio`: the in-memory state manager for a trading account.
//! - `ExecutorError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod broker;
pub mod error;
pub mod portfolio;

// Re-export the key components to provide a clean, public-facing API.
pub use broker::{Broker, LiveBroker, SimulatedBroker};
pub use error::ExecutorError;
pub use portfolio::Portfolio;