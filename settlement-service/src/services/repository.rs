//! Ledger store: invoice and payment documents in MongoDB.
//!
//! One invoice document and at most one payment aggregate per invoice.
//! No cross-document transaction is available; the engine orders its
//! writes and recomputes aggregates from the full event list, so the
//! store only has to provide per-document reads and conditional writes.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Collection, Database, IndexModel};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{Invoice, Payment};

/// Outcome of a conditional payment-aggregate write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Another writer advanced the aggregate since it was read.
    Conflict,
}

/// Store contract for the settlement engine.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>;

    /// Persist the settlement summary fields of an invoice.
    async fn update_invoice_settlement(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        amount_paid_by_client: Decimal,
    ) -> Result<(), AppError>;

    /// Clear the draft flag. Returns false when the invoice was not a draft.
    async fn set_invoice_sent(&self, company_id: Uuid, invoice_id: Uuid)
        -> Result<bool, AppError>;

    async fn get_payment(&self, invoice_id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Conditional write of the payment aggregate.
    ///
    /// Inserts when `expected_version` is `None`; otherwise replaces the
    /// stored document only if its version still matches. A lost race
    /// surfaces as [`PutOutcome::Conflict`] for the caller to retry
    /// against a fresh read.
    async fn put_payment(
        &self,
        payment: &Payment,
        expected_version: Option<i64>,
    ) -> Result<PutOutcome, AppError>;

    async fn list_invoices_for_company(&self, company_id: Uuid)
        -> Result<Vec<Invoice>, AppError>;

    async fn list_payments_for_company(&self, company_id: Uuid)
        -> Result<Vec<Payment>, AppError>;
}

/// MongoDB-backed ledger store.
#[derive(Clone)]
pub struct MongoLedgerStore {
    invoice_collection: Collection<Invoice>,
    payment_collection: Collection<Payment>,
}

fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

impl MongoLedgerStore {
    pub fn new(db: &Database) -> Self {
        Self {
            invoice_collection: db.collection("invoices"),
            payment_collection: db.collection("payments"),
        }
    }

    /// Initialize database indexes for company-scoped queries.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        // Compound index on (company_id, _id) for company-scoped invoice lookups
        let company_invoice_index = IndexModel::builder()
            .keys(doc! { "company_id": 1, "_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("company_invoice_idx".to_string())
                    .build(),
            )
            .build();

        // Unique invoice numbers within a company
        let invoice_number_index = IndexModel::builder()
            .keys(doc! { "company_id": 1, "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("company_invoice_number_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.invoice_collection
            .create_indexes([company_invoice_index, invoice_number_index], None)
            .await?;

        // Company-scoped payment scans for reporting
        let company_payment_index = IndexModel::builder()
            .keys(doc! { "company_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("company_payment_idx".to_string())
                    .build(),
            )
            .build();

        self.payment_collection
            .create_indexes([company_payment_index], None)
            .await?;

        tracing::info!("Settlement ledger indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoice_collection
            .insert_one(invoice, None)
            .await
            .map_err(|e| {
                if is_duplicate_key_error(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice number '{}' already exists for this company",
                        invoice.invoice_number
                    ))
                } else {
                    AppError::DatabaseError(e.into())
                }
            })?;
        Ok(())
    }

    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let filter = doc! {
            "_id": invoice_id.to_string(),
            "company_id": company_id.to_string(),
        };
        let invoice = self.invoice_collection.find_one(filter, None).await?;
        Ok(invoice)
    }

    #[instrument(skip(self, amount_paid_by_client), fields(invoice_id = %invoice_id))]
    async fn update_invoice_settlement(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        amount_paid_by_client: Decimal,
    ) -> Result<(), AppError> {
        let amount = mongodb::bson::to_bson(&amount_paid_by_client).map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to encode amount: {}", e))
        })?;

        let filter = doc! {
            "_id": invoice_id.to_string(),
            "company_id": company_id.to_string(),
        };
        let update = doc! {
            "$set": {
                "amount_paid_by_client": amount,
                "updated_utc": mongodb::bson::DateTime::now(),
            }
        };
        self.invoice_collection
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn set_invoice_sent(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let filter = doc! {
            "_id": invoice_id.to_string(),
            "company_id": company_id.to_string(),
            "draft": true,
        };
        let update = doc! {
            "$set": {
                "draft": false,
                "updated_utc": mongodb::bson::DateTime::now(),
            }
        };
        let result = self
            .invoice_collection
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn get_payment(&self, invoice_id: Uuid) -> Result<Option<Payment>, AppError> {
        let filter = doc! { "_id": invoice_id.to_string() };
        let payment = self.payment_collection.find_one(filter, None).await?;
        Ok(payment)
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, version = payment.version))]
    async fn put_payment(
        &self,
        payment: &Payment,
        expected_version: Option<i64>,
    ) -> Result<PutOutcome, AppError> {
        match expected_version {
            None => match self.payment_collection.insert_one(payment, None).await {
                Ok(_) => Ok(PutOutcome::Stored),
                Err(e) if is_duplicate_key_error(&e) => Ok(PutOutcome::Conflict),
                Err(e) => Err(AppError::DatabaseError(e.into())),
            },
            Some(version) => {
                let filter = doc! {
                    "_id": payment.invoice_id.to_string(),
                    "version": version,
                };
                let result = self
                    .payment_collection
                    .replace_one(filter, payment, None)
                    .await?;
                if result.matched_count == 0 {
                    Ok(PutOutcome::Conflict)
                } else {
                    Ok(PutOutcome::Stored)
                }
            }
        }
    }

    async fn list_invoices_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        let filter = doc! { "company_id": company_id.to_string() };
        let cursor = self.invoice_collection.find(filter, None).await?;
        let invoices: Vec<Invoice> = cursor.try_collect().await?;
        Ok(invoices)
    }

    async fn list_payments_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let filter = doc! { "company_id": company_id.to_string() };
        let cursor = self.payment_collection.find(filter, None).await?;
        let payments: Vec<Payment> = cursor.try_collect().await?;
        Ok(payments)
    }
}
