#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use onenumber_api::auth::jwt::JwtConfig;
use onenumber_api::auth::password::hash_password;
use onenumber_api::config::ServerConfig;
use onenumber_api::router::build_app_router;
use onenumber_api::state::AppState;
use onenumber_core::types::MinorUnits;
use onenumber_db::models::phone_number::{CreatePhoneNumber, PhoneNumber};
use onenumber_db::models::user::{CreateUser, User};
use onenumber_db::repositories::{PhoneNumberRepo, RoleRepo, UserRepo};
use onenumber_events::EventBus;
use onenumber_payments::{
    GatewayError, GatewayPaymentStatus, InitializeRequest, InitializedPayment, PaymentGateway,
    VerifiedPayment,
};

pub const WEBHOOK_SECRET: &str = "sk_test_webhook_secret";
pub const PASSWORD: &str = "secret123";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-jwt-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 7,
        },
        app_base_url: "http://localhost:3000".to_string(),
        reservation_ttl_mins: 15,
        default_currency: "NGN".to_string(),
        payment_callback_url: "http://localhost:3000/payment/callback".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        reservation_sweep_interval_secs: 60,
        subscription_sweep_interval_secs: 3600,
    }
}

// ---------------------------------------------------------------------------
// Mock gateway
// ---------------------------------------------------------------------------

/// In-memory gateway. Every initialized reference verifies as pending until
/// a test settles it with [`MockGateway::settle`].
#[derive(Default)]
pub struct MockGateway {
    initialized: Mutex<HashMap<String, InitializeRequest>>,
    outcomes: Mutex<HashMap<String, (GatewayPaymentStatus, Option<MinorUnits>)>>,
    fail_initialize: AtomicBool,
}

impl MockGateway {
    /// Make the next verifications of `reference` report `status`.
    pub fn settle(&self, reference: &str, status: GatewayPaymentStatus) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(reference.to_string(), (status, None));
    }

    /// Report success but with a different amount than was charged.
    pub fn settle_with_amount(&self, reference: &str, amount: MinorUnits) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(reference.to_string(), (GatewayPaymentStatus::Success, Some(amount)));
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn initialized_count(&self) -> usize {
        self.initialized.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializedPayment, GatewayError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        self.initialized
            .lock()
            .unwrap()
            .insert(request.reference.clone(), request.clone());
        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.mock/{}", request.reference),
            access_code: Some("mock_access".to_string()),
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        let request = self
            .initialized
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or(GatewayError::Api {
                status: 404,
                message: "Transaction not found".to_string(),
            })?;
        let (status, amount) = self
            .outcomes
            .lock()
            .unwrap()
            .get(reference)
            .copied()
            .unwrap_or((GatewayPaymentStatus::Pending, None));

        Ok(VerifiedPayment {
            reference: reference.to_string(),
            status,
            amount: amount.unwrap_or(request.amount),
            currency: request.currency.clone(),
            raw: serde_json::json!({ "reference": reference, "mock": true }),
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// The router plus handles tests use to steer and inspect it.
pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<MockGateway>,
    pub event_bus: Arc<EventBus>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router, same middleware stack as `main.rs`,
/// backed by `pool` and a [`MockGateway`].
pub fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let gateway = Arc::new(MockGateway::default());
    let event_bus = Arc::new(EventBus::default());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        gateway: gateway.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        gateway,
        event_bus,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Send a raw body to the webhook with the given signature header.
pub async fn post_webhook(app: Router, body: &str, signature: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(onenumber_payments::signature::SIGNATURE_HEADER, signature);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user with [`PASSWORD`] and the given role name.
pub async fn create_user(pool: &PgPool, name: &str, role: &str) -> User {
    let role = RoleRepo::find_by_name(pool, role).await.unwrap().unwrap();
    UserRepo::create(
        pool,
        &CreateUser {
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            password_hash: hash_password(PASSWORD).unwrap(),
            role_id: role.id,
        },
    )
    .await
    .unwrap()
}

/// Log in through the API and return the access token.
pub async fn login(app: Router, email: &str) -> String {
    let response = post_json(
        app,
        "/api/users/login",
        serde_json::json!({ "email": email, "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), 200, "login should succeed for {email}");
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Create a user and log them in. Returns the user and an access token.
pub async fn signed_in(pool: &PgPool, app: Router, name: &str, role: &str) -> (User, String) {
    let user = create_user(pool, name, role).await;
    let token = login(app, &user.email).await;
    (user, token)
}

/// Insert an available Nigerian mobile number.
pub async fn create_number(pool: &PgPool, e164: &str, monthly_price: MinorUnits) -> PhoneNumber {
    PhoneNumberRepo::create(
        pool,
        &CreatePhoneNumber {
            number: e164.to_string(),
            display_number: onenumber_core::phone_number::format_display(e164, "234"),
            country_code: "234".to_string(),
            number_type: "mobile".to_string(),
            vanity_text: None,
            monthly_price,
            currency: "NGN".to_string(),
        },
    )
    .await
    .unwrap()
}
