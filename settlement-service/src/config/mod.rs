use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ExchangeConfig {
    pub base_url: String,
    /// Bounds the whole conversion call; when it fires, the settlement
    /// operation in flight aborts with no write.
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("SETTLEMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SETTLEMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()?;

        let db_url = env::var("SETTLEMENT_DATABASE_URL")
            .map_err(|_| anyhow!("SETTLEMENT_DATABASE_URL must be set"))?;
        let db_name =
            env::var("SETTLEMENT_DATABASE_NAME").unwrap_or_else(|_| "settlement_db".to_string());

        let exchange_base_url = env::var("EXCHANGE_GATEWAY_URL")
            .unwrap_or_else(|_| "https://api.exchangerate.host".to_string());
        let exchange_timeout = env::var("EXCHANGE_GATEWAY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            exchange: ExchangeConfig {
                base_url: exchange_base_url,
                timeout_seconds: exchange_timeout,
            },
            service_name: "settlement-service".to_string(),
        })
    }
}
