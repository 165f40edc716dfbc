//! # Database Crate
//!
//! A high-level, application-specific interface to the PostgreSQL database.
//! It is the system's permanent archive: saved bots, deployments and their
//! trade/position/metric ledgers, the cached kline bar store, and the
//! sentiment/news dataset cache.
//!
//! ## Architectural Principles
//!
//! - **Layer 3 Adapter:** This crate encapsulates all database-specific
//!   logic behind a clean, abstract API; callers never see SQL.
//! - **Runtime-Checked Queries:** Uses `sqlx`'s runtime-checked `query`/
//!   `query_as` (not the `query!`/`query_as!` compile-time macros, which
//!   require a live `DATABASE_URL` at build time).
//! - **Asynchronous & Pooled:** All operations are asynchronous and share a
//!   connection pool (`PgPool`).
//!
//! ## Public API
//!
//! - `connect`: establishes the database connection pool.
//! - `run_migrations`: applies pending migrations under `migrations/`.
//! - `DbRepository`: the main struct providing all data-access methods; also
//!   implements `sentiment::DatasetCacheStore`.
//! - `DbError`: this crate's error type.

pub mod connection;
pub mod error;
pub mod repository;

pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::{
    DbDeployment, DbDeploymentPosition, DbDeploymentTrade, DbMetricsSnapshot, DbRepository,
    DbTradingBot, DbUser,
};
