//! Invoice model for settlement-service.

use chrono::NaiveDate;
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frozen two-hop conversion snapshot.
///
/// Both legs are captured against the same INR intermediate at one
/// instant, so the implied company-to-client cross rate is always
/// `company_to_inr * inr_to_client`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub company_to_inr: Decimal,
    pub inr_to_client: Decimal,
    pub timestamp: DateTime,
}

/// Invoice document.
///
/// Carries three currency views of the same economic amount: the
/// company's native billing currency, the INR pivot value fixed at
/// issuance, and the client's remittance currency. Lifecycle status is
/// derived on read (see [`crate::models::derive_status`]), never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub company_currency: String,
    /// Invoice total in company currency.
    pub total_amount: Decimal,
    /// Pivot value, fixed at issuance.
    pub total_amount_inr: Decimal,
    pub client_currency: String,
    /// Client-currency value at issuance.
    pub client_amount: Decimal,
    /// Cumulative amount paid, in client currency. Must always equal the
    /// sum of `amount_paid_by_client` over the invoice's payment events.
    pub amount_paid_by_client: Decimal,
    /// Issuance snapshot; used only to derive `client_amount` and
    /// `total_amount_inr` at creation time, never for later payments.
    pub conversion_rate: RateSnapshot,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub draft: bool,
    pub created_utc: DateTime,
    pub updated_utc: DateTime,
}

/// Input for issuing an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub company_currency: String,
    pub client_currency: String,
    pub total_amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub draft: bool,
}
