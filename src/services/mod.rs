//! Business rules: user lifecycle, balance discipline, the money-movement
//! engine, and the transfer worker pool.

pub mod balance_service;
pub mod queue;
pub mod transaction_service;
pub mod user_service;

pub use balance_service::BalanceService;
pub use queue::TransactionQueue;
pub use transaction_service::TransactionService;
pub use user_service::{ClientMeta, UserService};
