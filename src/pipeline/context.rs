//! Per-invocation pipeline context.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::{CorrelationId, TenantId};

/// State shared by every step of one top-level invocation.
///
/// Created once per invocation and passed by reference to every step. The
/// only mutation allowed is appending observability tags.
#[derive(Debug)]
pub struct PipelineContext {
    tenant_id: TenantId,
    correlation_id: CorrelationId,
    started: Instant,
    tags: Mutex<Vec<(String, String)>>,
    claims: Option<BTreeMap<String, String>>,
    policy: Option<String>,
    cancellation: CancellationToken,
}

impl PipelineContext {
    /// Creates a context for `tenant_id` with a fresh correlation ID.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            correlation_id: CorrelationId::new(),
            started: Instant::now(),
            tags: Mutex::new(Vec::new()),
            claims: None,
            policy: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses an existing correlation ID (e.g. propagated from a request header).
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Attaches caller claims.
    pub fn with_claims(mut self, claims: BTreeMap<String, String>) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Names the policy this invocation runs under.
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Links the context to a caller-owned cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The tenant this invocation acts for.
    #[inline]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The correlation ID of this invocation.
    #[inline]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Caller claims, if any.
    pub fn claims(&self) -> Option<&BTreeMap<String, String>> {
        self.claims.as_ref()
    }

    /// Policy name, if any.
    pub fn policy(&self) -> Option<&str> {
        self.policy.as_deref()
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The caller's cancellation signal.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Appends an observability tag. Existing tags are never replaced.
    pub fn tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let entry = (key.into(), value.into());
        match self.tags.lock() {
            Ok(mut tags) => tags.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    /// Snapshot of the tags appended so far, in insertion order.
    pub fn tags(&self) -> Vec<(String, String)> {
        match self.tags.lock() {
            Ok(tags) => tags.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// First value recorded for `key`.
    pub fn tag_value(&self, key: &str) -> Option<String> {
        self.tags()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}
