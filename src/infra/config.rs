use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Gateway REST API base, overridable for sandbox environments.
    pub gateway_base_url: String,
    /// Secret key used both for API auth and webhook signature checks.
    pub gateway_secret_key: SecretString,
    pub gateway_timeout_secs: u64,
    /// Failed attempts an overdue subscription gets before it is closed.
    pub max_payment_failures: i32,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let gateway_base_url: String = get_env_default(
            "GATEWAY_BASE_URL",
            "https://api.paystack.co".to_string(),
        );
        let gateway_secret_key: SecretString =
            SecretString::new(get_env::<String>("GATEWAY_SECRET_KEY").into());
        let gateway_timeout_secs: u64 = get_env_default("GATEWAY_TIMEOUT_SECS", 30);
        let max_payment_failures: i32 = get_env_default("MAX_PAYMENT_FAILURES", 3);
        let currency: String = get_env_default("CURRENCY", "GHS".to_string());

        Self {
            bind_addr,
            database_url,
            cors_origin,
            gateway_base_url,
            gateway_secret_key,
            gateway_timeout_secs,
            max_payment_failures,
            currency,
        }
    }
}
