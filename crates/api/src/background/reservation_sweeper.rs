//! Releases numbers whose checkout reservation lapsed without payment.
//!
//! Each pass returns the numbers to inventory, expires the pending
//! subscriptions that were buying them and abandons their pending
//! transactions. A payment that settles after this point is flagged for
//! refund by the finalization path.

use std::time::Duration;

use chrono::Utc;
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::types::DbId;
use onenumber_db::repositories::{PaymentTransactionRepo, PhoneNumberRepo, SubscriptionRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditRecord;

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub released_numbers: usize,
    pub expired_subscriptions: usize,
    pub abandoned_payments: u64,
}

/// Run the sweep every `interval` until `cancel` fires.
pub async fn run(pool: PgPool, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Reservation sweeper started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reservation sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&pool).await {
                    Ok(outcome) if outcome.released_numbers > 0 => {
                        tracing::info!(
                            released = outcome.released_numbers,
                            expired_subscriptions = outcome.expired_subscriptions,
                            abandoned_payments = outcome.abandoned_payments,
                            "Released lapsed reservations"
                        );
                    }
                    Ok(_) => tracing::debug!("Reservation sweep: nothing to release"),
                    Err(e) => tracing::error!(error = %e, "Reservation sweep failed"),
                }
            }
        }
    }
}

/// One pass over lapsed reservations.
pub async fn sweep_once(pool: &PgPool) -> Result<SweepOutcome, sqlx::Error> {
    let released = PhoneNumberRepo::release_expired_reservations(pool, Utc::now()).await?;
    if released.is_empty() {
        return Ok(SweepOutcome::default());
    }

    let number_ids: Vec<DbId> = released.iter().map(|n| n.id).collect();
    let expired = SubscriptionRepo::expire_stale_pending(pool, &number_ids).await?;
    let subscription_ids: Vec<DbId> = expired.iter().map(|s| s.id).collect();
    let abandoned = PaymentTransactionRepo::abandon_stale_pending(pool, &subscription_ids).await?;

    for number in &released {
        let mut record = AuditRecord::new(action_types::NUMBER_RELEASE)
            .entity(entity_types::PHONE_NUMBER, number.id)
            .details(serde_json::json!({
                "reason": "reservation_expired",
                "reserved_until": number.reserved_until,
            }));
        if let Some(user_id) = number.reserved_by {
            record = record.actor(user_id);
        }
        record.write(pool).await;
    }

    Ok(SweepOutcome {
        released_numbers: released.len(),
        expired_subscriptions: expired.len(),
        abandoned_payments: abandoned,
    })
}
