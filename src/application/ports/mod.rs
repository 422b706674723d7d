pub mod billing_notifier;
pub mod momo_gateway;
