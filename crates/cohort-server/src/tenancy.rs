//! Tenant resolution collaborator.
//!
//! The platform's identity system is external; the server only consumes
//! a resolver that, given a request's headers, yields a tenant identity
//! or fails closed. No session work happens before resolution succeeds.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;

use cohort_core::ids::TenantId;

use crate::errors::ApiError;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolved tenant identity for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantContext {
    /// The tenant the caller belongs to.
    pub tenant_id: TenantId,
}

/// Resolves a request to a tenant identity, or fails closed.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Resolve the tenant for a request. Any failure is `Unauthorized`.
    async fn resolve(&self, headers: &HeaderMap) -> Result<TenantContext, ApiError>;
}

/// Fixed API-key-to-tenant mapping.
///
/// Stands in for the platform's identity service in development and
/// tests; unknown or absent keys are rejected.
#[derive(Default)]
pub struct StaticTenantResolver {
    keys: HashMap<String, TenantId>,
}

impl StaticTenantResolver {
    /// Create an empty resolver (rejects everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API key for a tenant.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, tenant_id: TenantId) -> Self {
        let _ = self.keys.insert(key.into(), tenant_id);
        self
    }
}

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<TenantContext, ApiError> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let tenant_id = self.keys.get(key).cloned().ok_or(ApiError::Unauthorized)?;
        Ok(TenantContext { tenant_id })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
