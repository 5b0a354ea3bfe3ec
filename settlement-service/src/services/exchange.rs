//! Exchange conversion gateway client.
//!
//! Every conversion is a live, rate-at-call-time request; nothing is
//! cached here. Historical amounts are read back from the frozen
//! per-event snapshots, never re-derived from current rates.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use std::time::Duration;

use crate::config::ExchangeConfig;
use crate::services::metrics;

/// The fixed intermediate currency all conversions are chained through.
pub const PIVOT_CURRENCY: &str = "INR";

/// Live currency conversion through the INR pivot.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Convert an amount of `currency` into INR at the current rate.
    async fn to_inr(&self, amount: Decimal, currency: &str) -> Result<Decimal, AppError>;

    /// Convert an INR amount into `currency` at the current rate.
    async fn from_inr(&self, amount_inr: Decimal, currency: &str) -> Result<Decimal, AppError>;
}

/// Response from the conversion API.
#[derive(Debug, Deserialize)]
struct ConvertResponse {
    result: Decimal,
}

/// HTTP client for the external exchange-rate service.
#[derive(Clone)]
pub struct ExchangeRateClient {
    client: Client,
    config: ExchangeConfig,
}

impl ExchangeRateClient {
    /// Create a new exchange client.
    ///
    /// The request timeout bounds the whole conversion call; when it
    /// fires the surrounding settlement operation aborts before any
    /// write happens.
    pub fn new(config: ExchangeConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::InternalError(anyhow!("Failed to build exchange HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal, AppError> {
        let direction = if to == PIVOT_CURRENCY { "to_inr" } else { "from_inr" };
        let url = format!("{}/convert", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", from),
                ("to", to),
                ("amount", amount.to_string().as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(from = from, to = to, "Conversion request failed: {}", e);
                metrics::record_conversion(direction, "unreachable");
                AppError::ConversionUnavailable(anyhow!("Exchange gateway unreachable: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            metrics::record_conversion(direction, "unreachable");
            AppError::ConversionUnavailable(anyhow!("Exchange gateway response lost: {}", e))
        })?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                from = from,
                to = to,
                "Exchange gateway rejected conversion"
            );
            metrics::record_conversion(direction, "error");
            return Err(AppError::ConversionUnavailable(anyhow!(
                "Exchange gateway returned {}: {}",
                status,
                body
            )));
        }

        let parsed: ConvertResponse = serde_json::from_str(&body).map_err(|e| {
            metrics::record_conversion(direction, "error");
            AppError::ConversionUnavailable(anyhow!("Malformed conversion response: {}", e))
        })?;

        metrics::record_conversion(direction, "ok");
        tracing::debug!(
            from = from,
            to = to,
            amount = %amount,
            result = %parsed.result,
            "Conversion completed"
        );

        Ok(parsed.result)
    }
}

#[async_trait]
impl ExchangeGateway for ExchangeRateClient {
    async fn to_inr(&self, amount: Decimal, currency: &str) -> Result<Decimal, AppError> {
        self.convert(amount, currency, PIVOT_CURRENCY).await
    }

    async fn from_inr(&self, amount_inr: Decimal, currency: &str) -> Result<Decimal, AppError> {
        self.convert(amount_inr, PIVOT_CURRENCY, currency).await
    }
}
