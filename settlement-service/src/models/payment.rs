//! Payment aggregate and partial-payment event models.

use chrono::NaiveDate;
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Invoice, RateSnapshot};

/// Cash receipt method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Neft,
    Rtgs,
    Imps,
    Upi,
    Cash,
    CreditCard,
    DebitCard,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Neft => "neft",
            PaymentMethod::Rtgs => "rtgs",
            PaymentMethod::Imps => "imps",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Cheque => "cheque",
        }
    }
}

/// Coarse rollup of settlement progress on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Completed => "completed",
        }
    }

    /// Rollup against the INR pivot total.
    pub fn from_totals(total_paid_inr: Decimal, total_inr: Decimal) -> Self {
        if total_paid_inr <= Decimal::ZERO {
            PaymentStatus::Pending
        } else if total_paid_inr < total_inr {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Completed
        }
    }
}

/// One immutable recorded cash receipt against an invoice.
///
/// `amount_inr` and `amount_paid_by_client` are both derived from the
/// same INR intermediate at this event's own submission time; the
/// snapshot is frozen for audit display and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialPayment {
    pub id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    /// Amount as entered by the user, in company currency.
    pub original_payment_amount: Decimal,
    /// The same receipt in INR, at the rate prevailing at submission.
    pub amount_inr: Decimal,
    /// The INR value converted on to the client currency, same instant.
    pub amount_paid_by_client: Decimal,
    pub conversion_rate: RateSnapshot,
    /// Remaining INR balance immediately after this event was applied.
    /// A point-in-time audit value; later mutations do not revise it.
    pub pending_inr_after: Decimal,
}

/// Per-invoice rollup of all partial payments, keyed 1:1 by invoice.
///
/// Every field except identity is recomputed from the full event list
/// on each mutation. `version` guards the read-modify-write cycle: a
/// conditional write keyed on it loses to a concurrent writer instead
/// of silently overwriting their event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    /// Sum of `original_payment_amount` over all events (company currency).
    pub total_paid_company: Decimal,
    /// Sum of `amount_inr` over all events.
    pub total_paid_inr: Decimal,
    /// `max(0, invoice.total_amount_inr - total_paid_inr)`.
    pub pending_inr: Decimal,
    pub status: PaymentStatus,
    /// Ordered, append-only event log.
    pub partial_payments: Vec<PartialPayment>,
    pub version: i64,
    pub created_utc: DateTime,
    pub updated_utc: DateTime,
}

impl Payment {
    /// Empty aggregate for an invoice with no receipts yet.
    pub fn empty(invoice: &Invoice) -> Self {
        let now = DateTime::now();
        Self {
            invoice_id: invoice.id,
            company_id: invoice.company_id,
            total_paid_company: Decimal::ZERO,
            total_paid_inr: Decimal::ZERO,
            pending_inr: invoice.total_amount_inr,
            status: PaymentStatus::Pending,
            partial_payments: Vec::new(),
            version: 0,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    /// Amount received, in company currency.
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
}
