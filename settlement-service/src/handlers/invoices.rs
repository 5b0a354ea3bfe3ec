//! Invoice issuance and read handlers.
//!
//! Reads derive the lifecycle status on every call; nothing here trusts
//! a previously stored status value.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateInvoiceRequest, InvoiceResponse},
    middleware::TenantContext,
    models::{derive_status, CreateInvoice},
    AppState,
};

/// Issue a new invoice for the tenant's company.
pub async fn create_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    tracing::info!(
        company_id = %tenant.company_id,
        invoice_number = %payload.invoice_number,
        "Issuing invoice"
    );

    let input = CreateInvoice {
        company_id: tenant.company_id,
        client_id: payload.client_id,
        invoice_number: payload.invoice_number,
        company_currency: payload.company_currency,
        client_currency: payload.client_currency,
        total_amount: payload.total_amount,
        issue_date: payload.issue_date,
        due_date: payload.due_date,
        draft: payload.draft,
    };

    let invoice = state.engine.create_invoice(input).await?;
    let status = derive_status(&invoice, &[], Utc::now().date_naive());

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::from_model(&invoice, status)),
    ))
}

/// Fetch an invoice with its derived status.
pub async fn get_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let (invoice, payment) = state
        .engine
        .invoice_with_payments(tenant.company_id, invoice_id)
        .await?;

    let status = derive_status(
        &invoice,
        &payment.partial_payments,
        Utc::now().date_naive(),
    );

    Ok(Json(InvoiceResponse::from_model(&invoice, status)))
}

/// Move a draft invoice into circulation.
pub async fn send_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .mark_sent(tenant.company_id, invoice_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
