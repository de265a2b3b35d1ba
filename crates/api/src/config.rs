use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Public URL of the customer dashboard, used in email links.
    pub app_base_url: String,
    /// How long a checkout holds a number before the sweeper frees it.
    pub reservation_ttl_mins: i64,
    /// Currency for numbers created without an explicit one.
    pub default_currency: String,
    /// Where the gateway redirects the customer after paying.
    pub payment_callback_url: String,
    /// Secret used to check `merchantsignature` on payment callbacks.
    pub webhook_secret: String,
    /// Reservation sweeper period in seconds.
    pub reservation_sweep_interval_secs: u64,
    /// Subscription expiry sweeper period in seconds.
    pub subscription_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                             | Default                            |
    /// |-------------------------------------|------------------------------------|
    /// | `HOST`                              | `0.0.0.0`                          |
    /// | `PORT`                              | `5000`                             |
    /// | `CORS_ORIGINS`                      | `http://localhost:3000`            |
    /// | `REQUEST_TIMEOUT_SECS`              | `30`                               |
    /// | `APP_BASE_URL`                      | `http://localhost:3000`            |
    /// | `RESERVATION_TTL_MINS`              | `15`                               |
    /// | `DEFAULT_CURRENCY`                  | `NGN`                              |
    /// | `BUDPAY_CALLBACK_URL`               | `{APP_BASE_URL}/payment/callback`  |
    /// | `BUDPAY_SECRET_KEY`                 | required                           |
    /// | `RESERVATION_SWEEP_INTERVAL_SECS`   | `60`                               |
    /// | `SUBSCRIPTION_SWEEP_INTERVAL_SECS`  | `3600`                             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let reservation_ttl_mins: i64 = std::env::var("RESERVATION_TTL_MINS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .expect("RESERVATION_TTL_MINS must be a valid i64");
        assert!(reservation_ttl_mins > 0, "RESERVATION_TTL_MINS must be positive");

        let default_currency = std::env::var("DEFAULT_CURRENCY")
            .unwrap_or_else(|_| "NGN".into())
            .to_ascii_uppercase();

        let payment_callback_url = std::env::var("BUDPAY_CALLBACK_URL")
            .unwrap_or_else(|_| default_callback_url(&app_base_url));

        let webhook_secret = std::env::var("BUDPAY_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("BUDPAY_SECRET_KEY must be set");

        let reservation_sweep_interval_secs = sweep_interval(
            "RESERVATION_SWEEP_INTERVAL_SECS",
            std::env::var("RESERVATION_SWEEP_INTERVAL_SECS").ok().as_deref(),
            60,
        );

        let subscription_sweep_interval_secs = sweep_interval(
            "SUBSCRIPTION_SWEEP_INTERVAL_SECS",
            std::env::var("SUBSCRIPTION_SWEEP_INTERVAL_SECS").ok().as_deref(),
            3600,
        );

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            app_base_url,
            reservation_ttl_mins,
            default_currency,
            payment_callback_url,
            webhook_secret,
            reservation_sweep_interval_secs,
            subscription_sweep_interval_secs,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Seconds between background sweeps. Must be positive.
fn sweep_interval(name: &str, raw: Option<&str>, default: u64) -> u64 {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        None => default,
    };
    assert!(secs > 0, "{name} must be positive");
    secs
}

fn default_callback_url(app_base_url: &str) -> String {
    format!("{app_base_url}/payment/callback")
}
