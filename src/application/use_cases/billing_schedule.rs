//! Pure billing-schedule arithmetic. No clock reads, no I/O: callers pass
//! `now` in, which keeps every status check and webhook re-evaluation
//! deterministic and testable at day boundaries.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};

const SECS_PER_DAY: i64 = 86_400;

/// Schedule facts derived from a subscription record and a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleFacts {
    pub next_payment_date: DateTime<Utc>,
    pub days_overdue: i64,
    pub needs_payment: bool,
    /// `None` whenever a payment is currently due.
    pub days_until_next_payment: Option<i64>,
    /// Deterministic handle for the current billing cycle; present only when
    /// a payment is due. Repeated evaluations before a payment lands return
    /// the same handle, so the client UI cannot fan out duplicate
    /// charge-initiation flows.
    pub payment_initiation_handle: Option<String>,
}

/// Compute schedule facts for `subscription` as of `now`.
pub fn evaluate(subscription: &Subscription, now: DateTime<Utc>) -> ScheduleFacts {
    let next_payment_date = match subscription.last_payment_date {
        Some(last) => last + Duration::days(subscription.billing_period.days()),
        // Never paid: due immediately.
        None => now,
    };

    let overdue_secs = (now - next_payment_date).num_seconds();
    let days_overdue = (overdue_secs / SECS_PER_DAY).max(0);

    let due_now = matches!(
        subscription.status,
        SubscriptionStatus::Active | SubscriptionStatus::Overdue
    ) && now >= next_payment_date;
    let needs_payment = due_now || subscription.status == SubscriptionStatus::Pending;

    let days_until_next_payment = if needs_payment {
        None
    } else {
        let remaining_secs = (next_payment_date - now).num_seconds().max(0);
        // Ceiling division; `div_ceil` is feature-gated on this toolchain.
        Some((remaining_secs + SECS_PER_DAY - 1) / SECS_PER_DAY)
    };

    let payment_initiation_handle =
        needs_payment.then(|| initiation_handle(subscription));

    ScheduleFacts {
        next_payment_date,
        days_overdue,
        needs_payment,
        days_until_next_payment,
        payment_initiation_handle,
    }
}

/// Handle identifying the current billing cycle of a subscription. Stable
/// until `last_payment_date` moves, i.e. until the due payment reconciles.
fn initiation_handle(subscription: &Subscription) -> String {
    let cycle = subscription
        .last_payment_date
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "initial".to_string());
    format!(
        "momo-{}-{}-{}",
        subscription.id.simple(),
        subscription.billing_period.as_str(),
        cycle
    )
}
