use std::net::SocketAddr;

use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Shared secret the external auth provider signs access tokens with.
    pub jwt_secret: SecretString,
    /// Payment-processor API key.
    pub stripe_secret_key: SecretString,
    /// Webhook signing secret for delivery verification.
    pub stripe_webhook_secret: SecretString,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let stripe_secret_key: SecretString =
            SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());

        Self {
            bind_addr,
            database_url,
            jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
        }
    }
}
