use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use onenumber_api::background::{reservation_sweeper, subscription_expiry};
use onenumber_api::config::ServerConfig;
use onenumber_api::router::build_app_router;
use onenumber_api::state::AppState;
use onenumber_events::{EmailConfig, EmailDelivery, EmailNotifier, EmailSender, EventBus};
use onenumber_payments::{BudPayClient, BudPayConfig, PaymentGateway};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long each background task gets to finish after shutdown starts.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onenumber_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = onenumber_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    onenumber_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    onenumber_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready, migrations applied");

    // --- Payment gateway ---
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        BudPayClient::new(BudPayConfig::from_env()).expect("Failed to build BudPay client"),
    );
    tracing::info!(gateway = gateway.name(), "Payment gateway configured");

    // --- Event bus and email ---
    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    let email_sender: Option<Arc<dyn EmailSender>> = match EmailConfig::from_env() {
        Some(email_config) => {
            tracing::info!(smtp_host = %email_config.smtp_host, "SMTP email delivery enabled");
            Some(Arc::new(
                EmailDelivery::new(email_config).expect("Failed to build SMTP transport"),
            ))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will be logged and dropped");
            None
        }
    };
    let notifier = EmailNotifier::new(pool.clone(), email_sender, config.app_base_url.clone());
    let notifier_handle = tokio::spawn(notifier.run(event_bus.subscribe(), cancel.clone()));

    // --- Background jobs ---
    let reservation_handle = tokio::spawn(reservation_sweeper::run(
        pool.clone(),
        Duration::from_secs(config.reservation_sweep_interval_secs),
        cancel.clone(),
    ));
    let expiry_handle = tokio::spawn(subscription_expiry::run(
        pool.clone(),
        Arc::clone(&event_bus),
        Duration::from_secs(config.subscription_sweep_interval_secs),
        cancel.clone(),
    ));
    tracing::info!("Background jobs started (email notifier, reservation sweeper, subscription expiry)");

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState {
        pool,
        config: Arc::clone(&config),
        event_bus,
        gateway,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping background jobs");
    cancel.cancel();
    for (name, handle) in [
        ("email notifier", notifier_handle),
        ("reservation sweeper", reservation_handle),
        ("subscription expiry", expiry_handle),
    ] {
        if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await.is_err() {
            tracing::warn!(task = name, "Background task did not stop in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
