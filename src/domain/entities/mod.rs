pub mod momo_network;
pub mod payment_attempt;
pub mod subscription;
