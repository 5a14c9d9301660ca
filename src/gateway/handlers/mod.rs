//! HTTP handlers: thin JSON adapters over the service layer.

pub mod auth;
pub mod balances;
pub mod health;
pub mod transactions;
pub mod users;
