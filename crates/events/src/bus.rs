//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` in the application state.
//! Handlers publish and move on; subscribers such as the email notifier do
//! the slow work on their own task.

use chrono::{DateTime, Utc};
use onenumber_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Dot-separated event names published by the API and background jobs.
pub mod event_types {
    /// Payload: `verification_token`.
    pub const USER_REGISTERED: &str = "user.registered";
    /// Payload: `verification_token`.
    pub const USER_VERIFICATION_REQUESTED: &str = "user.verification_requested";
    /// Payload: `reset_token`.
    pub const USER_PASSWORD_RESET_REQUESTED: &str = "user.password_reset_requested";
    /// Payload: `reference`, `amount`, `currency`, `display_number`.
    pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
    /// Payload: `reference`, `reason`.
    pub const PAYMENT_FAILED: &str = "payment.failed";
    /// Payload: `display_number`, `period_end`, `billing_cycle`.
    pub const SUBSCRIPTION_ACTIVATED: &str = "subscription.activated";
    /// Payload: `display_number`.
    pub const SUBSCRIPTION_EXPIRED: &str = "subscription.expired";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event.
///
/// `actor_user_id` is the customer the event concerns; the notifier emails
/// that user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// String field from the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PlatformEvent::new(event_types::PAYMENT_SUCCEEDED)
                .with_source("payment_transaction", 9)
                .with_actor(3)
                .with_payload(serde_json::json!({"reference": "ONE-1"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, event_types::PAYMENT_SUCCEEDED);
        assert_eq!(received.source_entity_id, Some(9));
        assert_eq!(received.actor_user_id, Some(3));
        assert_eq!(received.payload_str("reference"), Some("ONE-1"));
        assert_eq!(received.payload_str("missing"), None);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[tokio::test]
    async fn slow_receiver_observes_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..4 {
            bus.publish(PlatformEvent::new("burst"));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
    }
}
