//! Shared application state.

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db::Database;
use crate::middleware::metrics::MetricsRegistry;
use crate::middleware::ratelimit::RateLimiter;
use crate::services::{BalanceService, TransactionQueue, TransactionService, UserService};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub users: Arc<UserService>,
    pub balances: Arc<BalanceService>,
    pub transactions: Arc<TransactionService>,
    pub queue: Arc<TransactionQueue>,
    pub jwt: Arc<JwtKeys>,
    pub metrics: Arc<MetricsRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
}
