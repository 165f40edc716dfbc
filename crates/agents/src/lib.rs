//! # Agents Crate
//!
//! The multi-agent pieces of the workflow engine: the generator (natural
//! language -> `StrategySpec`), the analyst (judges a backtest against the
//! user's request), the insights agent (proposes visualizations), and the
//! data-driven threshold recommender. None of these agents run the
//! iteration loop themselves — that belongs to the `workflow` crate, which
//! calls into this crate once per step.
//!
//! ## Architectural Principles
//!
//! - **Layer 2 Logic:** depends on `core-types`, `strategies`, `backtester`
//!   only; knows nothing about sessions, channels, or persistence.
//! - **Oracle abstraction:** every LLM call goes through `OracleClient`, a
//!   plain `reqwest`-based HTTP client (no LLM SDK exists in the pack).

pub mod analyst;
pub mod error;
pub mod generator;
pub mod insights;
pub mod oracle;
pub mod protected;
pub mod recommender;

pub use analyst::AnalystOutput;
pub use error::AgentError;
pub use generator::GeneratorOutput;
pub use insights::InsightsConfig;
pub use oracle::OracleClient;
pub use protected::ProtectedParams;
pub use recommender::DataInsights;
