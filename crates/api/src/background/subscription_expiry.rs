//! Ends subscriptions whose paid period is over and returns their numbers
//! to inventory. Also purges dead sessions and used or expired
//! verification tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::types::DbId;
use onenumber_db::repositories::{
    PaymentTransactionRepo, PhoneNumberRepo, SessionRepo, SubscriptionRepo, VerificationTokenRepo,
};
use onenumber_events::{event_types, EventBus, PlatformEvent};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditRecord;

/// Counts from one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub expired_subscriptions: usize,
    pub released_numbers: usize,
    pub purged_sessions: u64,
    pub purged_tokens: u64,
}

/// Run the expiry pass every `interval` until `cancel` fires.
pub async fn run(
    pool: PgPool,
    event_bus: Arc<EventBus>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Subscription expiry job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Subscription expiry job stopping");
                break;
            }
            _ = ticker.tick() => {
                match expire_once(&pool, &event_bus).await {
                    Ok(outcome) => tracing::info!(
                        expired = outcome.expired_subscriptions,
                        released = outcome.released_numbers,
                        purged_sessions = outcome.purged_sessions,
                        purged_tokens = outcome.purged_tokens,
                        "Subscription expiry pass complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Subscription expiry pass failed"),
                }
            }
        }
    }
}

/// One expiry pass.
///
/// Suspended numbers stay suspended after their subscription ends; an admin
/// decides whether they return to inventory or get retired. They can no
/// longer be reinstated to `assigned`.
pub async fn expire_once(pool: &PgPool, event_bus: &EventBus) -> Result<ExpiryOutcome, sqlx::Error> {
    let expired = SubscriptionRepo::mark_expired_due(pool, Utc::now()).await?;

    let ids: Vec<DbId> = expired.iter().map(|s| s.id).collect();
    PaymentTransactionRepo::abandon_stale_pending(pool, &ids).await?;

    let mut released_numbers = 0;
    for sub in &expired {
        let released = PhoneNumberRepo::release_held_by(pool, sub.phone_number_id, sub.user_id).await?;
        let display_number = match &released {
            Some(number) => {
                released_numbers += 1;
                Some(number.display_number.clone())
            }
            None => PhoneNumberRepo::find_by_id(pool, sub.phone_number_id)
                .await?
                .map(|n| n.display_number),
        };

        AuditRecord::new(action_types::SUBSCRIPTION_EXPIRE)
            .actor(sub.user_id)
            .entity(entity_types::SUBSCRIPTION, sub.id)
            .details(serde_json::json!({
                "phone_number_id": sub.phone_number_id,
                "period_end": sub.current_period_end,
                "number_released": released.is_some(),
            }))
            .write(pool)
            .await;

        event_bus.publish(
            PlatformEvent::new(event_types::SUBSCRIPTION_EXPIRED)
                .with_source(entity_types::SUBSCRIPTION, sub.id)
                .with_actor(sub.user_id)
                .with_payload(serde_json::json!({ "display_number": display_number })),
        );
    }

    let purged_sessions = SessionRepo::cleanup_expired(pool).await?;
    let purged_tokens = VerificationTokenRepo::cleanup_expired(pool).await?;

    Ok(ExpiryOutcome {
        expired_subscriptions: expired.len(),
        released_numbers,
        purged_sessions,
        purged_tokens,
    })
}
