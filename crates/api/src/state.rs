use std::sync::Arc;

use onenumber_payments::PaymentGateway;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: onenumber_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Centralized event bus; the email notifier subscribes to it.
    pub event_bus: Arc<onenumber_events::EventBus>,
    /// Hosted-checkout gateway (BudPay in production, a mock in tests).
    pub gateway: Arc<dyn PaymentGateway>,
}
