//! Reporting read path.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{dtos::CompanyTotalsResponse, middleware::TenantContext, AppState};

/// Company-wide received/pending totals, recomputed on every call.
pub async fn company_totals(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<CompanyTotalsResponse>, AppError> {
    let totals = state.engine.company_totals(tenant.company_id).await?;
    Ok(Json(CompanyTotalsResponse::from(&totals)))
}
