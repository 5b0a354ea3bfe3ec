//! Payment recording and deletion handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{PaymentResponse, RecordPaymentRequest, RecordPaymentResponse},
    middleware::TenantContext,
    models::RecordPayment,
    AppState,
};

/// Record a payment against an invoice.
pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    tracing::info!(
        company_id = %tenant.company_id,
        invoice_id = %invoice_id,
        amount = %payload.amount,
        payment_method = payload.payment_method.as_str(),
        "Recording payment"
    );

    let input = RecordPayment {
        amount: payload.amount,
        payment_method: payload.payment_method,
        payment_date: payload.payment_date,
    };

    let result = state
        .engine
        .record_payment(tenant.company_id, invoice_id, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse::from(&result)),
    ))
}

/// List the payment events and aggregate for an invoice.
pub async fn list_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let (_, payment) = state
        .engine
        .invoice_with_payments(tenant.company_id, invoice_id)
        .await?;

    Ok(Json(PaymentResponse::from(&payment)))
}

/// Delete a payment event by id.
pub async fn delete_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((invoice_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        company_id = %tenant.company_id,
        invoice_id = %invoice_id,
        payment_id = %payment_id,
        "Deleting payment"
    );

    state
        .engine
        .delete_payment(tenant.company_id, invoice_id, payment_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
