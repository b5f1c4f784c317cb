//! Tenant identity attached to every orchestrator request

use reqwest::header::HeaderValue;
use std::fmt;

use crate::error::{ClientError, Result};

/// Header carrying the tenant identifier
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// The tenant this worker acts for
///
/// Validated once at construction so every later request can attach the
/// header without a fallible conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    id: String,
    header: HeaderValue,
}

impl TenantContext {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "tenant id cannot be empty".to_string(),
            ));
        }

        let header = HeaderValue::from_str(&id).map_err(|_| {
            ClientError::InvalidRequest(format!("tenant id '{}' is not a valid header value", id))
        })?;

        Ok(Self { id, header })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tenant() {
        let tenant = TenantContext::new("default-tenant").unwrap();
        assert_eq!(tenant.id(), "default-tenant");
        assert_eq!(tenant.header_value(), "default-tenant");
    }

    #[test]
    fn test_empty_tenant_rejected() {
        assert!(TenantContext::new("").is_err());
        assert!(TenantContext::new("   ").is_err());
    }

    #[test]
    fn test_tenant_with_newline_rejected() {
        let err = TenantContext::new("acme\nX-Injected: 1").unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
