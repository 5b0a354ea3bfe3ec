//! Request/response DTOs.
//!
//! Amounts are carried at full precision internally and rounded to two
//! places only here, at the presentation boundary. Rates are never
//! rounded.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Invoice, InvoiceStatus, PartialPayment, Payment, PaymentMethod, RateSnapshot,
};
use crate::services::{CompanyTotals, PaymentEventResult};

/// Request to issue an invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "Invoice number is required"))]
    pub invoice_number: String,
    #[validate(length(equal = 3, message = "Company currency must be a 3-letter code"))]
    pub company_currency: String,
    #[validate(length(equal = 3, message = "Client currency must be a 3-letter code"))]
    pub client_currency: String,
    pub total_amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub draft: bool,
}

/// Request to record a payment against an invoice.
#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    /// Amount received, in the invoice's company currency.
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RateSnapshotResponse {
    pub company_to_inr: Decimal,
    pub inr_to_client: Decimal,
    pub timestamp: String,
}

impl From<&RateSnapshot> for RateSnapshotResponse {
    fn from(snapshot: &RateSnapshot) -> Self {
        Self {
            company_to_inr: snapshot.company_to_inr,
            inr_to_client: snapshot.inr_to_client,
            timestamp: snapshot
                .timestamp
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PartialPaymentResponse {
    pub id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub original_payment_amount: Decimal,
    pub amount_inr: Decimal,
    pub amount_paid_by_client: Decimal,
    pub conversion_rate: RateSnapshotResponse,
    pub pending_inr_after: Decimal,
}

impl From<&PartialPayment> for PartialPaymentResponse {
    fn from(event: &PartialPayment) -> Self {
        Self {
            id: event.id,
            payment_date: event.payment_date,
            payment_method: event.payment_method,
            original_payment_amount: event.original_payment_amount.round_dp(2),
            amount_inr: event.amount_inr.round_dp(2),
            amount_paid_by_client: event.amount_paid_by_client.round_dp(2),
            conversion_rate: RateSnapshotResponse::from(&event.conversion_rate),
            pending_inr_after: event.pending_inr_after.round_dp(2),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub invoice_id: Uuid,
    pub total_paid_company: Decimal,
    pub total_paid_inr: Decimal,
    pub pending_inr: Decimal,
    pub status: String,
    pub partial_payments: Vec<PartialPaymentResponse>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            invoice_id: payment.invoice_id,
            total_paid_company: payment.total_paid_company.round_dp(2),
            total_paid_inr: payment.total_paid_inr.round_dp(2),
            pending_inr: payment.pending_inr.round_dp(2),
            status: payment.status.as_str().to_string(),
            partial_payments: payment
                .partial_payments
                .iter()
                .map(PartialPaymentResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub event: PartialPaymentResponse,
    pub payment: PaymentResponse,
}

impl From<&PaymentEventResult> for RecordPaymentResponse {
    fn from(result: &PaymentEventResult) -> Self {
        Self {
            event: PartialPaymentResponse::from(&result.event),
            payment: PaymentResponse::from(&result.payment),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub company_currency: String,
    pub total_amount: Decimal,
    pub total_amount_inr: Decimal,
    pub client_currency: String,
    pub client_amount: Decimal,
    pub amount_paid_by_client: Decimal,
    pub conversion_rate: RateSnapshotResponse,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Derived on this read; never a stored value.
    pub status: String,
}

impl InvoiceResponse {
    pub fn from_model(invoice: &Invoice, status: InvoiceStatus) -> Self {
        Self {
            id: invoice.id,
            company_id: invoice.company_id,
            client_id: invoice.client_id,
            invoice_number: invoice.invoice_number.clone(),
            company_currency: invoice.company_currency.clone(),
            total_amount: invoice.total_amount.round_dp(2),
            total_amount_inr: invoice.total_amount_inr.round_dp(2),
            client_currency: invoice.client_currency.clone(),
            client_amount: invoice.client_amount.round_dp(2),
            amount_paid_by_client: invoice.amount_paid_by_client.round_dp(2),
            conversion_rate: RateSnapshotResponse::from(&invoice.conversion_rate),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyTotalsResponse {
    pub total_received: Decimal,
    pub total_pending: Decimal,
}

impl From<&CompanyTotals> for CompanyTotalsResponse {
    fn from(totals: &CompanyTotals) -> Self {
        Self {
            total_received: totals.total_received.round_dp(2),
            total_pending: totals.total_pending.round_dp(2),
        }
    }
}
