//! Paygate - Transactional Payments API
//!
//! A payments HTTP API backed by PostgreSQL. Users register, authenticate,
//! query balances, and move money via credit, debit, and peer-to-peer
//! transfer. Every monetary change is durable, auditable, and serializable
//! against concurrent operations on the same account.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - Connection pool and the scoped transaction helper
//! - [`models`] - Domain entities and request validation
//! - [`repository`] - Per-entity persistence
//! - [`auth`] - Bearer tokens and password hashing
//! - [`services`] - Business rules and the money-movement engine
//! - [`middleware`] - The HTTP request-processing chain
//! - [`migration`] - Checksum-validated schema migrations
//! - [`gateway`] - Router, handlers, shared state

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use db::Database;
pub use error::{ApiError, ApiResult};
