pub mod billing_schedule;
pub mod callback;
pub mod status_query;
pub mod subscription_lifecycle;
