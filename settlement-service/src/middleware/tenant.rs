//! Tenant context middleware for multi-tenancy support.
//!
//! Extracts the owning company from request headers. These headers are
//! set by the frontend gateway after authenticating the user and
//! validating their company membership.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Tenant context extracted from request headers.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Company whose ledger the request operates on.
    pub company_id: Uuid,
    /// User making the request, when known.
    pub user_id: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let company_id = parts
            .headers
            .get("X-Company-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Missing X-Company-ID header"))
            })?;

        let company_id = company_id.parse::<Uuid>().map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("X-Company-ID is not a valid UUID"))
        })?;

        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let span = tracing::Span::current();
        span.record("company_id", company_id.to_string().as_str());
        if let Some(ref uid) = user_id {
            span.record("user_id", uid.as_str());
        }

        Ok(TenantContext {
            company_id,
            user_id,
        })
    }
}
