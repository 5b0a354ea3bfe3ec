//! Settlement engine: payment accumulation, recomputation, reporting.
//!
//! The engine owns every payment-related mutation of the ledger.
//! Conversion and validation complete before the first write, and every
//! aggregate field is recomputed from the complete event list on each
//! mutation, so a failure at any point leaves the ledger exactly as it
//! was before the call began.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    CreateInvoice, Invoice, PartialPayment, Payment, PaymentStatus, RateSnapshot, RecordPayment,
};
use crate::services::exchange::ExchangeGateway;
use crate::services::metrics;
use crate::services::repository::{LedgerStore, PutOutcome};

/// Attempt bound for the optimistic read-recompute-write cycle.
const MAX_WRITE_ATTEMPTS: u32 = 10;

/// Result of recording a payment: the new event and the updated aggregate.
#[derive(Debug, Clone)]
pub struct PaymentEventResult {
    pub event: PartialPayment,
    pub payment: Payment,
}

/// Company-wide settlement totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyTotals {
    /// Sum of every recorded receipt, in company currency.
    pub total_received: Decimal,
    /// Sum of outstanding balances over open invoices, in client currency.
    pub total_pending: Decimal,
}

#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    exchange: Arc<dyn ExchangeGateway>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>, exchange: Arc<dyn ExchangeGateway>) -> Self {
        Self { store, exchange }
    }

    /// Issue a new invoice, freezing the issuance conversion snapshot.
    ///
    /// `total_amount_inr` and `client_amount` are derived here once,
    /// through the pivot, and never revised afterwards.
    pub async fn create_invoice(&self, input: CreateInvoice) -> Result<Invoice, AppError> {
        if input.total_amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow!(
                "Invoice amount must be positive"
            )));
        }

        let (total_amount_inr, client_amount, conversion_rate) = self
            .convert_through_pivot(
                input.total_amount,
                &input.company_currency,
                &input.client_currency,
            )
            .await?;

        let now = DateTime::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            client_id: input.client_id,
            invoice_number: input.invoice_number,
            company_currency: input.company_currency,
            total_amount: input.total_amount,
            total_amount_inr,
            client_currency: input.client_currency,
            client_amount,
            amount_paid_by_client: Decimal::ZERO,
            conversion_rate,
            issue_date: input.issue_date,
            due_date: input.due_date,
            draft: input.draft,
            created_utc: now,
            updated_utc: now,
        };

        self.store.create_invoice(&invoice).await?;

        info!(
            invoice_id = %invoice.id,
            company_id = %invoice.company_id,
            invoice_number = %invoice.invoice_number,
            total_amount_inr = %invoice.total_amount_inr,
            "Invoice issued"
        );
        metrics::record_invoice_issued(&invoice.company_currency);

        Ok(invoice)
    }

    /// Move a draft invoice into circulation.
    pub async fn mark_sent(&self, company_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let invoice = self.load_invoice(company_id, invoice_id).await?;
        if !invoice.draft {
            return Err(AppError::BadRequest(anyhow!("Invoice is not a draft")));
        }
        self.store.set_invoice_sent(company_id, invoice_id).await?;
        info!(invoice_id = %invoice_id, "Invoice sent");
        Ok(())
    }

    /// Record a payment against an invoice.
    ///
    /// Conversion happens exactly once, before any write: one hop into
    /// INR and one hop onward to the client currency, chained through
    /// the same intermediate so the two derived amounts can never
    /// disagree on the cross rate. The write cycle then loops on
    /// version conflict against a fresh read of the aggregate.
    pub async fn record_payment(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        input: RecordPayment,
    ) -> Result<PaymentEventResult, AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow!(
                "Payment amount must be positive"
            )));
        }

        let invoice = self.load_invoice(company_id, invoice_id).await?;

        let (amount_inr, amount_client, conversion_rate) = self
            .convert_through_pivot(
                input.amount,
                &invoice.company_currency,
                &invoice.client_currency,
            )
            .await?;

        let event = PartialPayment {
            id: Uuid::new_v4(),
            payment_date: input.payment_date,
            payment_method: input.payment_method,
            original_payment_amount: input.amount,
            amount_inr,
            amount_paid_by_client: amount_client,
            conversion_rate,
            // Filled in against the event list the write lands on.
            pending_inr_after: Decimal::ZERO,
        };

        let mut attempts = 0;
        let (payment, applied) = loop {
            attempts += 1;

            let (mut payment, expected_version) = match self.store.get_payment(invoice_id).await? {
                Some(existing) => {
                    let version = existing.version;
                    (existing, Some(version))
                }
                None => (Payment::empty(&invoice), None),
            };

            let prior_paid_inr: Decimal = payment
                .partial_payments
                .iter()
                .map(|p| p.amount_inr)
                .sum();

            let mut applied = event.clone();
            applied.pending_inr_after = (invoice.total_amount_inr - prior_paid_inr - amount_inr)
                .max(Decimal::ZERO);
            payment.partial_payments.push(applied.clone());

            recompute_aggregate(&mut payment, &invoice);
            payment.version += 1;
            payment.updated_utc = DateTime::now();

            match self.store.put_payment(&payment, expected_version).await? {
                PutOutcome::Stored => break (payment, applied),
                PutOutcome::Conflict if attempts < MAX_WRITE_ATTEMPTS => {
                    metrics::record_write_conflict("record_payment");
                    continue;
                }
                PutOutcome::Conflict => {
                    return Err(AppError::Conflict(anyhow!(
                        "Concurrent update on payment aggregate for invoice {}",
                        invoice_id
                    )));
                }
            }
        };

        // Invoice summary is written second; the recompute is a pure
        // function of the stored event list, so re-running it after a
        // crash between the two writes converges on the same value.
        self.store
            .update_invoice_settlement(
                company_id,
                invoice_id,
                total_paid_by_client(&payment.partial_payments),
            )
            .await?;

        info!(
            invoice_id = %invoice_id,
            payment_id = %applied.id,
            amount = %applied.original_payment_amount,
            amount_inr = %applied.amount_inr,
            payment_method = applied.payment_method.as_str(),
            "Payment recorded"
        );
        metrics::record_payment(applied.payment_method.as_str());

        Ok(PaymentEventResult {
            event: applied,
            payment,
        })
    }

    /// Remove a payment event and roll the aggregates back.
    ///
    /// Shares the recompute routine with the add path; status reverts on
    /// the next read because it is derived, so there is no separate
    /// "revert status" step.
    pub async fn delete_payment(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), AppError> {
        let invoice = self.load_invoice(company_id, invoice_id).await?;

        let mut attempts = 0;
        let payment = loop {
            attempts += 1;

            let mut payment = self.store.get_payment(invoice_id).await?.ok_or_else(|| {
                AppError::NotFound(anyhow!("No payments recorded for invoice {}", invoice_id))
            })?;
            let expected_version = payment.version;

            let before = payment.partial_payments.len();
            payment.partial_payments.retain(|p| p.id != payment_id);
            if payment.partial_payments.len() == before {
                return Err(AppError::NotFound(anyhow!(
                    "Payment event {} not found",
                    payment_id
                )));
            }

            recompute_aggregate(&mut payment, &invoice);
            payment.version += 1;
            payment.updated_utc = DateTime::now();

            match self
                .store
                .put_payment(&payment, Some(expected_version))
                .await?
            {
                PutOutcome::Stored => break payment,
                PutOutcome::Conflict if attempts < MAX_WRITE_ATTEMPTS => {
                    metrics::record_write_conflict("delete_payment");
                    continue;
                }
                PutOutcome::Conflict => {
                    return Err(AppError::Conflict(anyhow!(
                        "Concurrent update on payment aggregate for invoice {}",
                        invoice_id
                    )));
                }
            }
        };

        self.store
            .update_invoice_settlement(
                company_id,
                invoice_id,
                total_paid_by_client(&payment.partial_payments),
            )
            .await?;

        info!(
            invoice_id = %invoice_id,
            payment_id = %payment_id,
            "Payment deleted"
        );
        metrics::record_payment_deleted();

        Ok(())
    }

    /// Load an invoice together with its payment aggregate.
    ///
    /// Invoices without receipts get an empty aggregate so readers see a
    /// uniform shape.
    pub async fn invoice_with_payments(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<(Invoice, Payment), AppError> {
        let invoice = self.load_invoice(company_id, invoice_id).await?;
        let payment = self
            .store
            .get_payment(invoice_id)
            .await?
            .unwrap_or_else(|| Payment::empty(&invoice));
        Ok((invoice, payment))
    }

    /// Company-wide totals, recomputed by a full scan on every call.
    ///
    /// Strong consistency over read cost: there is no maintained counter
    /// that could drift from the ledger.
    pub async fn company_totals(&self, company_id: Uuid) -> Result<CompanyTotals, AppError> {
        let invoices = self.store.list_invoices_for_company(company_id).await?;
        let payments = self.store.list_payments_for_company(company_id).await?;

        let by_invoice: HashMap<Uuid, &Payment> =
            payments.iter().map(|p| (p.invoice_id, p)).collect();

        let mut total_received = Decimal::ZERO;
        let mut total_pending = Decimal::ZERO;

        for invoice in &invoices {
            if let Some(payment) = by_invoice.get(&invoice.id) {
                total_received += payment
                    .partial_payments
                    .iter()
                    .map(|p| p.original_payment_amount)
                    .sum::<Decimal>();
            }

            let outstanding = invoice.client_amount - invoice.amount_paid_by_client;
            if outstanding > Decimal::ZERO {
                total_pending += outstanding;
            }
        }

        Ok(CompanyTotals {
            total_received,
            total_pending,
        })
    }

    async fn load_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, AppError> {
        self.store
            .get_invoice(company_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Invoice {} not found", invoice_id)))
    }

    /// One `to_inr` hop, one `from_inr` hop, both chained through the
    /// same INR value, plus the frozen snapshot of the implied rates.
    async fn convert_through_pivot(
        &self,
        amount: Decimal,
        company_currency: &str,
        client_currency: &str,
    ) -> Result<(Decimal, Decimal, RateSnapshot), AppError> {
        let amount_inr = self.exchange.to_inr(amount, company_currency).await?;
        if amount_inr <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow!(
                "Degenerate conversion: {} {} converted to {} INR",
                amount,
                company_currency,
                amount_inr
            )));
        }

        let amount_client = self.exchange.from_inr(amount_inr, client_currency).await?;

        let snapshot = RateSnapshot {
            company_to_inr: amount_inr / amount,
            inr_to_client: amount_client / amount_inr,
            timestamp: DateTime::now(),
        };

        Ok((amount_inr, amount_client, snapshot))
    }
}

/// Sum of `amount_paid_by_client` over an event list; the invoice's
/// summary field is always rewritten from this, never delta-patched.
pub(crate) fn total_paid_by_client(partial_payments: &[PartialPayment]) -> Decimal {
    partial_payments
        .iter()
        .map(|p| p.amount_paid_by_client)
        .sum()
}

/// Rebuild every aggregate field from the full event list.
///
/// Shared by the add and delete paths. Pure with respect to the list:
/// running it twice yields identical fields, which is what makes a
/// retried write after a partial failure safe.
pub(crate) fn recompute_aggregate(payment: &mut Payment, invoice: &Invoice) {
    let total_paid_company: Decimal = payment
        .partial_payments
        .iter()
        .map(|p| p.original_payment_amount)
        .sum();
    let total_paid_inr: Decimal = payment
        .partial_payments
        .iter()
        .map(|p| p.amount_inr)
        .sum();

    payment.total_paid_company = total_paid_company;
    payment.total_paid_inr = total_paid_inr;
    payment.pending_inr = (invoice.total_amount_inr - total_paid_inr).max(Decimal::ZERO);
    payment.status = PaymentStatus::from_totals(total_paid_inr, invoice.total_amount_inr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, RateSnapshot};
    use rust_decimal_macros::dec;

    fn snapshot() -> RateSnapshot {
        RateSnapshot {
            company_to_inr: dec!(0.9375),
            inr_to_client: dec!(0.0133),
            timestamp: DateTime::now(),
        }
    }

    fn invoice() -> Invoice {
        let now = DateTime::now();
        Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            invoice_number: "INV-100".to_string(),
            company_currency: "USD".to_string(),
            total_amount: dec!(80000),
            total_amount_inr: dec!(75000),
            client_currency: "EUR".to_string(),
            client_amount: dec!(1000),
            amount_paid_by_client: Decimal::ZERO,
            conversion_rate: snapshot(),
            issue_date: "2024-06-01".parse().unwrap(),
            due_date: "2024-06-30".parse().unwrap(),
            draft: false,
            created_utc: now,
            updated_utc: now,
        }
    }

    fn event(original: Decimal, inr: Decimal, client: Decimal) -> PartialPayment {
        PartialPayment {
            id: Uuid::new_v4(),
            payment_date: "2024-06-10".parse().unwrap(),
            payment_method: PaymentMethod::Neft,
            original_payment_amount: original,
            amount_inr: inr,
            amount_paid_by_client: client,
            conversion_rate: snapshot(),
            pending_inr_after: Decimal::ZERO,
        }
    }

    #[test]
    fn recompute_sums_the_full_event_list() {
        let inv = invoice();
        let mut payment = Payment::empty(&inv);
        payment
            .partial_payments
            .push(event(dec!(40000), dec!(37500), dec!(500)));
        payment
            .partial_payments
            .push(event(dec!(20000), dec!(18750), dec!(250)));

        recompute_aggregate(&mut payment, &inv);

        assert_eq!(payment.total_paid_company, dec!(60000));
        assert_eq!(payment.total_paid_inr, dec!(56250));
        assert_eq!(payment.pending_inr, dec!(18750));
        assert_eq!(payment.status, PaymentStatus::Partial);
    }

    #[test]
    fn recompute_is_idempotent() {
        let inv = invoice();
        let mut payment = Payment::empty(&inv);
        payment
            .partial_payments
            .push(event(dec!(40000), dec!(37500), dec!(500)));

        recompute_aggregate(&mut payment, &inv);
        let first = payment.clone();
        recompute_aggregate(&mut payment, &inv);

        assert_eq!(payment.total_paid_company, first.total_paid_company);
        assert_eq!(payment.total_paid_inr, first.total_paid_inr);
        assert_eq!(payment.pending_inr, first.pending_inr);
        assert_eq!(payment.status, first.status);
        assert_eq!(payment.partial_payments, first.partial_payments);
    }

    #[test]
    fn pending_never_goes_negative_on_overpayment() {
        let inv = invoice();
        let mut payment = Payment::empty(&inv);
        payment
            .partial_payments
            .push(event(dec!(90000), dec!(84375), dec!(1125)));

        recompute_aggregate(&mut payment, &inv);

        assert_eq!(payment.pending_inr, Decimal::ZERO);
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[test]
    fn empty_list_recomputes_to_untouched_state() {
        let inv = invoice();
        let mut payment = Payment::empty(&inv);
        recompute_aggregate(&mut payment, &inv);

        assert_eq!(payment.total_paid_company, Decimal::ZERO);
        assert_eq!(payment.total_paid_inr, Decimal::ZERO);
        assert_eq!(payment.pending_inr, inv.total_amount_inr);
        assert_eq!(payment.status, PaymentStatus::Pending);
    }
}
