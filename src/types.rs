//! Core type definitions for PulseRAG identifiers.
//!
//! Tenant identifiers are validated strings: an empty tenant can never be
//! constructed, so a tenant-scoped query always carries a real predicate.
//! Correlation identifiers use UUID v7 for time-ordered tracing.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Type alias for embedding vectors.
pub type Embedding = Vec<f32>;

/// Tenant identifier, the isolation boundary for records and queries.
///
/// Construction goes through [`TenantId::new`], which rejects empty or
/// whitespace-only names.
///
/// # Example
/// ```
/// use pulserag::TenantId;
///
/// let tenant = TenantId::new("acme").unwrap();
/// assert_eq!(tenant.as_str(), "acme");
/// assert!(TenantId::new("  ").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Maximum length of a tenant identifier.
    pub const MAX_LENGTH: usize = 256;

    /// Creates a tenant identifier, validating it is non-blank and bounded.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::required_field("tenant_id"));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(ValidationError::invalid_field(
                "tenant_id",
                format!("must not exceed {} bytes", Self::MAX_LENGTH),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation identifier (UUID v7 for time-ordering).
///
/// One is minted per top-level invocation and attached to every log event
/// emitted while that invocation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Creates a new CorrelationId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) CorrelationId.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for CorrelationId {
    /// Returns a fresh CorrelationId; a nil one is never useful for tracing.
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_rejects_blank() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new(" \t").is_err());
    }

    #[test]
    fn test_tenant_id_rejects_oversized() {
        let long = "t".repeat(TenantId::MAX_LENGTH + 1);
        assert!(TenantId::new(long).is_err());
    }

    #[test]
    fn test_tenant_id_serde_validates() {
        let ok: TenantId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(ok.as_str(), "acme");

        let err = serde_json::from_str::<TenantId>("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_correlation_ids_are_unique_v7() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.0.get_version_num(), 7);
    }

    #[test]
    fn test_correlation_id_nil() {
        assert!(CorrelationId::nil().0.is_nil());
    }
}
