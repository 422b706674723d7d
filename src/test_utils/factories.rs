//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields as needed.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::entities::{
    momo_network::MomoNetwork,
    subscription::{BillingPeriod, Subscription, SubscriptionStatus},
};

/// Create a test subscription with sensible defaults.
pub fn create_test_subscription(overrides: impl FnOnce(&mut Subscription)) -> Subscription {
    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        tier: "premium".to_string(),
        phone: "0244000000".to_string(),
        network: MomoNetwork::Mtn,
        amount_pesewas: 500,
        billing_period: BillingPeriod::Monthly,
        status: SubscriptionStatus::Active,
        last_payment_date: None,
        next_payment_date: None,
        failure_count: 0,
        latest_reference: None,
        version: 1,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut subscription);
    subscription
}
