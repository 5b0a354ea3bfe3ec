//! Invoice lifecycle status, derived on every read.
//!
//! Persisting a status field lets it drift from the event list after a
//! payment deletion; a pure function of current ledger state cannot.
//! Readers call [`derive_status`] instead of trusting any stored copy.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Invoice, PartialPayment};

/// Invoice lifecycle states.
///
/// `Paid` and `PaidAfterDue` are terminal; the rest are transient and
/// re-evaluated against the ledger and the clock on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
    PaidAfterDue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially-paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::PaidAfterDue => "paid-after-due",
        }
    }
}

/// Date of the event whose application first pushed the cumulative
/// client-currency total to the invoice amount, walking the event log
/// in recorded order.
pub fn qualifying_payment_date(
    partial_payments: &[PartialPayment],
    client_amount: Decimal,
) -> Option<NaiveDate> {
    let mut accumulated = Decimal::ZERO;
    for event in partial_payments {
        accumulated += event.amount_paid_by_client;
        if accumulated >= client_amount {
            return Some(event.payment_date);
        }
    }
    None
}

/// Derive the lifecycle status of an invoice from current ledger state.
///
/// Rules, first match wins:
/// 1. a draft invoice is `draft` until explicitly sent;
/// 2. fully settled invoices are `paid` when the qualifying event landed
///    on or before the due date, `paid-after-due` otherwise;
/// 3. an unsettled invoice past its due date is `overdue`;
/// 4. otherwise `sent` with nothing received yet, `partially-paid` once
///    any amount has been received.
pub fn derive_status(
    invoice: &Invoice,
    partial_payments: &[PartialPayment],
    today: NaiveDate,
) -> InvoiceStatus {
    if invoice.draft {
        return InvoiceStatus::Draft;
    }

    let paid = invoice.amount_paid_by_client;

    if paid >= invoice.client_amount {
        return match qualifying_payment_date(partial_payments, invoice.client_amount) {
            Some(date) if date > invoice.due_date => InvoiceStatus::PaidAfterDue,
            _ => InvoiceStatus::Paid,
        };
    }

    if today > invoice.due_date {
        return InvoiceStatus::Overdue;
    }

    if paid <= Decimal::ZERO {
        InvoiceStatus::Sent
    } else {
        InvoiceStatus::PartiallyPaid
    }
}
