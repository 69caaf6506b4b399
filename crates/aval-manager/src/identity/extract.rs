use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::Principal;
use crate::context::AppContext;
use crate::error::ApiError;

/// Caller holding the `admin` or `service_role` role.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

/// Caller who is an admin or an advisor.
#[derive(Debug, Clone)]
pub struct StaffPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        state.identity.require_admin(&parts.headers).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for StaffPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        state
            .identity
            .require_admin_or_advisor(&parts.headers)
            .await
            .map(Self)
    }
}
