//! Background task that turns bus events into customer emails.
//!
//! [`EmailNotifier`] subscribes to the [`EventBus`](crate::bus::EventBus),
//! looks up the recipient (`actor_user_id`) and sends the matching template.
//! Without an [`EmailSender`] configured it logs each email it would have
//! sent and drops it.

use std::sync::Arc;

use onenumber_db::models::user::User;
use onenumber_db::repositories::UserRepo;
use onenumber_db::DbPool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{event_types, PlatformEvent};
use crate::email::EmailSender;
use crate::templates::{self, EmailMessage};

/// Turns [`PlatformEvent`]s into emails.
pub struct EmailNotifier {
    pool: DbPool,
    sender: Option<Arc<dyn EmailSender>>,
    /// Frontend base URL used in verification and reset links.
    base_url: String,
}

impl EmailNotifier {
    pub fn new(pool: DbPool, sender: Option<Arc<dyn EmailSender>>, base_url: String) -> Self {
        Self {
            pool,
            sender,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run until `cancel` fires or the bus is dropped.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            email_enabled = self.sender.is_some(),
            "Email notifier started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Email notifier stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Email notifier lagged, some emails were not sent");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, email notifier shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&self, event: &PlatformEvent) {
        let Some(user_id) = event.actor_user_id else {
            return;
        };
        if !is_emailed(&event.event_type) {
            return;
        }

        let user = match UserRepo::find_by_id(&self.pool, user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id, event_type = %event.event_type, "Email recipient not found");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, user_id, "Failed to load email recipient");
                return;
            }
        };

        let Some(message) = render(event, &user, &self.base_url) else {
            tracing::warn!(event_type = %event.event_type, "Event is missing email payload fields");
            return;
        };

        match &self.sender {
            Some(sender) => {
                if let Err(e) = sender.send(&user.email, &message).await {
                    tracing::error!(
                        error = %e,
                        user_id,
                        event_type = %event.event_type,
                        "Failed to send email"
                    );
                }
            }
            None => {
                tracing::info!(
                    to = %user.email,
                    subject = %message.subject,
                    "Email not configured, dropping message"
                );
            }
        }
    }
}

fn is_emailed(event_type: &str) -> bool {
    matches!(
        event_type,
        event_types::USER_REGISTERED
            | event_types::USER_VERIFICATION_REQUESTED
            | event_types::USER_PASSWORD_RESET_REQUESTED
            | event_types::PAYMENT_SUCCEEDED
            | event_types::PAYMENT_FAILED
            | event_types::SUBSCRIPTION_ACTIVATED
            | event_types::SUBSCRIPTION_EXPIRED
    )
}

/// Pick and fill the template for an event. `None` when the event is not
/// emailed or its payload lacks a required field.
pub fn render(event: &PlatformEvent, user: &User, base_url: &str) -> Option<EmailMessage> {
    let name = user.full_name.as_str();
    let message = match event.event_type.as_str() {
        event_types::USER_REGISTERED => {
            templates::welcome(name, base_url, event.payload_str("verification_token")?)
        }
        event_types::USER_VERIFICATION_REQUESTED => {
            templates::email_verification(name, base_url, event.payload_str("verification_token")?)
        }
        event_types::USER_PASSWORD_RESET_REQUESTED => {
            templates::password_reset(name, base_url, event.payload_str("reset_token")?)
        }
        event_types::PAYMENT_SUCCEEDED => templates::payment_receipt(
            name,
            event.payload_str("reference")?,
            event.payload.get("amount")?.as_i64()?,
            event.payload_str("currency")?,
            event.payload_str("display_number").unwrap_or("your number"),
        ),
        event_types::PAYMENT_FAILED => templates::payment_failed(
            name,
            event.payload_str("reference")?,
            event.payload_str("reason").unwrap_or("the payment was declined"),
        ),
        event_types::SUBSCRIPTION_ACTIVATED => templates::subscription_activated(
            name,
            event.payload_str("display_number")?,
            event
                .payload_str("period_end")
                .and_then(|s| s.parse().ok()),
        ),
        event_types::SUBSCRIPTION_EXPIRED => {
            templates::subscription_expired(name, event.payload_str("display_number")?)
        }
        _ => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn user() -> User {
        User {
            id: 5,
            full_name: "Ada Obi".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password_hash: String::new(),
            role_id: 2,
            is_active: true,
            email_verified_at: None,
            last_login_at: None,
            failed_login_count: 0,
            locked_until: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn registration_renders_welcome_with_link() {
        let event = PlatformEvent::new(event_types::USER_REGISTERED)
            .with_actor(5)
            .with_payload(json!({"verification_token": "abc"}));
        let msg = render(&event, &user(), "http://localhost:3000").unwrap();
        assert!(msg.body.contains("http://localhost:3000/verify-email?token=abc"));
    }

    #[test]
    fn receipt_requires_amount() {
        let event = PlatformEvent::new(event_types::PAYMENT_SUCCEEDED)
            .with_payload(json!({"reference": "ONE-1", "currency": "NGN"}));
        assert!(render(&event, &user(), "http://x").is_none());

        let event = PlatformEvent::new(event_types::PAYMENT_SUCCEEDED).with_payload(json!({
            "reference": "ONE-1", "currency": "NGN", "amount": 150000
        }));
        let msg = render(&event, &user(), "http://x").unwrap();
        assert!(msg.body.contains("NGN 1,500.00"));
    }

    #[test]
    fn activation_parses_period_end() {
        let event = PlatformEvent::new(event_types::SUBSCRIPTION_ACTIVATED).with_payload(json!({
            "display_number": "+234 801 234 5678",
            "period_end": "2026-11-18T00:00:00Z"
        }));
        let msg = render(&event, &user(), "http://x").unwrap();
        assert!(msg.body.contains("18 November 2026"));
    }

    #[test]
    fn unrelated_events_are_not_emailed() {
        assert!(!is_emailed("number.created"));
        let event = PlatformEvent::new("number.created");
        assert!(render(&event, &user(), "http://x").is_none());
    }
}
