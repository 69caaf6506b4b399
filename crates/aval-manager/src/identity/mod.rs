//! Bearer-token authentication and role resolution.
//!
//! Tokens are validated by the hosted identity provider; this module only interprets the
//! returned user document. Roles come from provider metadata first and fall back to the
//! application's `usuarios` table through a [`RoleDirectory`].

mod extract;

pub use extract::{AdminPrincipal, StaffPrincipal};

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::repositories::RoleDirectory;
use crate::store::{StoreError, SupabaseClient};

/// Normalized application role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    ServiceRole,
    Advisor,
    Other(String),
}

impl Role {
    /// Case and whitespace insensitive; `super_admin` is an alias of `admin`.
    pub fn normalize(raw: &str) -> Option<Role> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "" => None,
            "admin" | "super_admin" | "superadmin" => Some(Role::Admin),
            "service_role" => Some(Role::ServiceRole),
            "asesor" | "advisor" => Some(Role::Advisor),
            _ => Some(Role::Other(value)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::ServiceRole => "service_role",
            Role::Advisor => "asesor",
            Role::Other(value) => value,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::ServiceRole)
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.as_ref().is_some_and(Role::is_admin)
    }

    pub fn is_advisor(&self) -> bool {
        matches!(self.role, Some(Role::Advisor))
    }
}

/// Resolves an access token to the provider's user document.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the provider does not recognise the token.
    async fn user_for_token(&self, token: &str) -> Result<Option<Value>, StoreError>;
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn user_for_token(&self, token: &str) -> Result<Option<Value>, StoreError> {
        self.fetch_user(token).await
    }
}

/// Provider user reduced to the fields this service reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub metadata_role: Option<Role>,
}

impl ProviderUser {
    /// Reads `role` or `rol` from `app_metadata`, then from `user_metadata`.
    pub fn from_document(document: &Value) -> Option<Self> {
        let id = document.get("id")?.as_str()?.parse().ok()?;
        let email = document
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string);
        let metadata_role = ["app_metadata", "user_metadata"]
            .iter()
            .filter_map(|section| document.get(*section))
            .flat_map(|section| ["role", "rol"].map(|key| section.get(key)))
            .flatten()
            .filter_map(Value::as_str)
            .find_map(Role::normalize);
        Some(Self {
            id,
            email,
            metadata_role,
        })
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let (scheme, token) = authz
        .split_once(' ')
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(ApiError::Unauthorized(
            "malformed authorization header".to_string(),
        ));
    }
    Ok(token.trim())
}

#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleDirectory>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { provider, roles }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let token = bearer_token(headers)?;
        let document = match self.provider.user_for_token(token).await {
            Ok(Some(document)) => document,
            Ok(None) => return Err(ApiError::Unauthorized("invalid token".to_string())),
            Err(err) => {
                tracing::warn!(error = %err, "identity provider request failed");
                return Err(ApiError::Unauthorized("invalid token".to_string()));
            }
        };
        let user = ProviderUser::from_document(&document)
            .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))?;
        let role = self.resolve_role(&user).await;
        Ok(Principal {
            id: user.id,
            email: user.email,
            role,
        })
    }

    /// Metadata admin roles are trusted as-is; anything else defers to the stored role.
    pub async fn resolve_role(&self, user: &ProviderUser) -> Option<Role> {
        if user.metadata_role.as_ref().is_some_and(Role::is_admin) {
            return user.metadata_role.clone();
        }
        let stored = match self.roles.stored_role(user.id).await {
            Ok(stored) => stored.as_deref().and_then(Role::normalize),
            Err(err) => {
                tracing::warn!(error = %err, user_id = %user.id, "role lookup failed");
                None
            }
        };
        stored.or_else(|| user.metadata_role.clone())
    }

    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let principal = self.authenticate(headers).await?;
        if principal.is_admin() {
            Ok(principal)
        } else {
            Err(ApiError::Forbidden("admin access required".to_string()))
        }
    }

    pub async fn require_admin_or_advisor(
        &self,
        headers: &HeaderMap,
    ) -> Result<Principal, ApiError> {
        let principal = self.authenticate(headers).await?;
        if principal.is_admin() || principal.is_advisor() {
            Ok(principal)
        } else {
            Err(ApiError::Forbidden(
                "admin or advisor access required".to_string(),
            ))
        }
    }
}
