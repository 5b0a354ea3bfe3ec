//! Shared fixtures for settlement engine tests: an in-memory ledger
//! store with the same conditional-write semantics as the MongoDB
//! implementation, and exchange gateways with controllable rates.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use uuid::Uuid;

use settlement_service::models::{Invoice, Payment, RateSnapshot};
use settlement_service::services::{
    ExchangeGateway, LedgerStore, PutOutcome, SettlementEngine,
};

pub fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Gateway with per-currency to-INR rates. `to_inr` multiplies by the
/// currency's rate, `from_inr` divides, so a single rate table keeps
/// both directions consistent.
pub struct FixedRateGateway {
    rates: Mutex<HashMap<String, Decimal>>,
}

impl FixedRateGateway {
    pub fn new(rates: &[(&str, Decimal)]) -> Self {
        Self {
            rates: Mutex::new(
                rates
                    .iter()
                    .map(|(currency, rate)| (currency.to_string(), *rate))
                    .collect(),
            ),
        }
    }

    /// Simulate a live-rate move between calls.
    pub fn set_rate(&self, currency: &str, rate: Decimal) {
        self.rates
            .lock()
            .unwrap()
            .insert(currency.to_string(), rate);
    }

    fn rate(&self, currency: &str) -> Result<Decimal, AppError> {
        self.rates
            .lock()
            .unwrap()
            .get(currency)
            .copied()
            .ok_or_else(|| {
                AppError::ConversionUnavailable(anyhow!("No rate for currency {}", currency))
            })
    }
}

#[async_trait]
impl ExchangeGateway for FixedRateGateway {
    async fn to_inr(&self, amount: Decimal, currency: &str) -> Result<Decimal, AppError> {
        Ok(amount * self.rate(currency)?)
    }

    async fn from_inr(&self, amount_inr: Decimal, currency: &str) -> Result<Decimal, AppError> {
        Ok(amount_inr / self.rate(currency)?)
    }
}

/// Gateway that is always down.
pub struct UnreachableGateway;

#[async_trait]
impl ExchangeGateway for UnreachableGateway {
    async fn to_inr(&self, _amount: Decimal, _currency: &str) -> Result<Decimal, AppError> {
        Err(AppError::ConversionUnavailable(anyhow!(
            "Exchange gateway unreachable"
        )))
    }

    async fn from_inr(&self, _amount_inr: Decimal, _currency: &str) -> Result<Decimal, AppError> {
        Err(AppError::ConversionUnavailable(anyhow!(
            "Exchange gateway unreachable"
        )))
    }
}

/// Gateway quoting a zero rate for everything.
pub struct ZeroRateGateway;

#[async_trait]
impl ExchangeGateway for ZeroRateGateway {
    async fn to_inr(&self, _amount: Decimal, _currency: &str) -> Result<Decimal, AppError> {
        Ok(Decimal::ZERO)
    }

    async fn from_inr(&self, _amount_inr: Decimal, _currency: &str) -> Result<Decimal, AppError> {
        Ok(Decimal::ZERO)
    }
}

/// In-memory ledger store with version-checked payment writes.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    invoices: Mutex<HashMap<Uuid, Invoice>>,
    payments: Mutex<HashMap<Uuid, Payment>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .get(&invoice_id)
            .filter(|invoice| invoice.company_id == company_id)
            .cloned())
    }

    async fn update_invoice_settlement(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        amount_paid_by_client: Decimal,
    ) -> Result<(), AppError> {
        let mut invoices = self.invoices.lock().unwrap();
        if let Some(invoice) = invoices
            .get_mut(&invoice_id)
            .filter(|invoice| invoice.company_id == company_id)
        {
            invoice.amount_paid_by_client = amount_paid_by_client;
            invoice.updated_utc = DateTime::now();
        }
        Ok(())
    }

    async fn set_invoice_sent(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut invoices = self.invoices.lock().unwrap();
        match invoices
            .get_mut(&invoice_id)
            .filter(|invoice| invoice.company_id == company_id && invoice.draft)
        {
            Some(invoice) => {
                invoice.draft = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_payment(&self, invoice_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.lock().unwrap().get(&invoice_id).cloned())
    }

    async fn put_payment(
        &self,
        payment: &Payment,
        expected_version: Option<i64>,
    ) -> Result<PutOutcome, AppError> {
        let mut payments = self.payments.lock().unwrap();
        let stored_version = payments.get(&payment.invoice_id).map(|p| p.version);
        let outcome = match (stored_version, expected_version) {
            (None, None) => {
                payments.insert(payment.invoice_id, payment.clone());
                PutOutcome::Stored
            }
            (Some(stored), Some(expected)) if stored == expected => {
                payments.insert(payment.invoice_id, payment.clone());
                PutOutcome::Stored
            }
            _ => PutOutcome::Conflict,
        };
        Ok(outcome)
    }

    async fn list_invoices_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|invoice| invoice.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn list_payments_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|payment| payment.company_id == company_id)
            .cloned()
            .collect())
    }
}

/// Store wrapper that reports a version conflict for the first N
/// payment writes, then delegates.
pub struct ConflictInjectingStore {
    inner: InMemoryLedgerStore,
    conflicts_remaining: AtomicU32,
}

impl ConflictInjectingStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryLedgerStore::new(),
            conflicts_remaining: AtomicU32::new(conflicts),
        }
    }

    pub fn inner(&self) -> &InMemoryLedgerStore {
        &self.inner
    }
}

#[async_trait]
impl LedgerStore for ConflictInjectingStore {
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.inner.create_invoice(invoice).await
    }

    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.inner.get_invoice(company_id, invoice_id).await
    }

    async fn update_invoice_settlement(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        amount_paid_by_client: Decimal,
    ) -> Result<(), AppError> {
        self.inner
            .update_invoice_settlement(company_id, invoice_id, amount_paid_by_client)
            .await
    }

    async fn set_invoice_sent(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        self.inner.set_invoice_sent(company_id, invoice_id).await
    }

    async fn get_payment(&self, invoice_id: Uuid) -> Result<Option<Payment>, AppError> {
        self.inner.get_payment(invoice_id).await
    }

    async fn put_payment(
        &self,
        payment: &Payment,
        expected_version: Option<i64>,
    ) -> Result<PutOutcome, AppError> {
        let remaining = self.conflicts_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_remaining.store(remaining - 1, Ordering::SeqCst);
            return Ok(PutOutcome::Conflict);
        }
        self.inner.put_payment(payment, expected_version).await
    }

    async fn list_invoices_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        self.inner.list_invoices_for_company(company_id).await
    }

    async fn list_payments_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        self.inner.list_payments_for_company(company_id).await
    }
}

/// The invoice of the worked settlement example: 80,000 USD billed,
/// 75,000 INR at issuance, 1,000 EUR on the client side, due 2024-06-30.
pub fn sample_invoice(company_id: Uuid) -> Invoice {
    let now = DateTime::now();
    Invoice {
        id: Uuid::new_v4(),
        company_id,
        client_id: Uuid::new_v4(),
        invoice_number: format!("INV-{}", &Uuid::new_v4().to_string()[..8]),
        company_currency: "USD".to_string(),
        total_amount: dec!(80000),
        total_amount_inr: dec!(75000),
        client_currency: "EUR".to_string(),
        client_amount: dec!(1000),
        amount_paid_by_client: Decimal::ZERO,
        conversion_rate: RateSnapshot {
            company_to_inr: dec!(0.9375),
            inr_to_client: dec!(0.0133),
            timestamp: now,
        },
        issue_date: date("2024-06-01"),
        due_date: date("2024-06-30"),
        draft: false,
        created_utc: now,
        updated_utc: now,
    }
}

/// USD converts to INR at 0.9375 (40,000 USD -> 37,500 INR) and EUR at
/// 75 (37,500 INR -> 500 EUR), matching `sample_invoice`.
pub fn sample_gateway() -> Arc<FixedRateGateway> {
    Arc::new(FixedRateGateway::new(&[
        ("USD", dec!(0.9375)),
        ("EUR", dec!(75)),
    ]))
}

/// Engine over an in-memory store seeded with `sample_invoice`.
pub async fn seeded_engine() -> (SettlementEngine, Arc<InMemoryLedgerStore>, Invoice) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let invoice = sample_invoice(Uuid::new_v4());
    store.create_invoice(&invoice).await.unwrap();
    let engine = SettlementEngine::new(store.clone(), sample_gateway());
    (engine, store, invoice)
}
