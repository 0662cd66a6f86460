//! Model name to backend routing.
//!
//! Routing tables are immutable data supplied at construction. A model name
//! resolves, in order, to:
//!
//! 1. a backend registered for exactly that name
//! 2. the backend whose prefix rule is the longest prefix of the name
//! 3. the default backend
//!
//! Chat and embedding backends have separate tables.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::chat::ChatModel;
use crate::embedding::EmbeddingModel;
use crate::error::{RagError, Result};

/// One routing table.
struct RouteTable<B: ?Sized> {
    exact: BTreeMap<String, Arc<B>>,
    prefixes: Vec<(String, Arc<B>)>,
    default: Option<Arc<B>>,
}

impl<B: ?Sized> Default for RouteTable<B> {
    fn default() -> Self {
        Self {
            exact: BTreeMap::new(),
            prefixes: Vec::new(),
            default: None,
        }
    }
}

impl<B: ?Sized> RouteTable<B> {
    fn resolve(&self, kind: &'static str, model: &str) -> Result<Arc<B>> {
        if let Some(backend) = self.exact.get(model) {
            debug!(kind, model, rule = "exact", "Model routed");
            return Ok(Arc::clone(backend));
        }

        let prefix = self
            .prefixes
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((prefix, backend)) = prefix {
            debug!(kind, model, rule = "prefix", prefix = %prefix, "Model routed");
            return Ok(Arc::clone(backend));
        }

        match &self.default {
            Some(backend) => {
                debug!(kind, model, rule = "default", "Model routed");
                Ok(Arc::clone(backend))
            }
            None => Err(RagError::NoRoute {
                kind,
                model: model.to_string(),
            }),
        }
    }

    fn describe(&self) -> (Vec<&str>, Vec<&str>, bool) {
        (
            self.exact.keys().map(String::as_str).collect(),
            self.prefixes.iter().map(|(p, _)| p.as_str()).collect(),
            self.default.is_some(),
        )
    }
}

/// Selects the chat or embedding backend serving a model name.
///
/// # Example
///
/// ```rust,ignore
/// let router = ModelRouter::builder()
///     .chat_model("gpt-4o", openai.clone())
///     .chat_prefix("claude-", anthropic)
///     .default_chat(openai)
///     .build();
///
/// let backend = router.chat("claude-sonnet")?;
/// ```
#[derive(Default)]
pub struct ModelRouter {
    chat: RouteTable<dyn ChatModel>,
    embedding: RouteTable<dyn EmbeddingModel>,
}

impl ModelRouter {
    /// Starts an empty routing table.
    pub fn builder() -> ModelRouterBuilder {
        ModelRouterBuilder::default()
    }

    /// The chat backend for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoRoute`] if nothing matches and no default is set.
    pub fn chat(&self, model: &str) -> Result<Arc<dyn ChatModel>> {
        self.chat.resolve("chat", model)
    }

    /// The embedding backend for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoRoute`] if nothing matches and no default is set.
    pub fn embedding(&self, model: &str) -> Result<Arc<dyn EmbeddingModel>> {
        self.embedding.resolve("embedding", model)
    }
}

impl fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRouter")
            .field("chat", &self.chat.describe())
            .field("embedding", &self.embedding.describe())
            .finish()
    }
}

/// Builder for [`ModelRouter`].
#[derive(Default)]
pub struct ModelRouterBuilder {
    router: ModelRouter,
}

impl ModelRouterBuilder {
    /// Routes exactly `model` to `backend`.
    pub fn chat_model(mut self, model: impl Into<String>, backend: Arc<dyn ChatModel>) -> Self {
        self.router.chat.exact.insert(model.into(), backend);
        self
    }

    /// Routes every model starting with `prefix` to `backend`.
    pub fn chat_prefix(mut self, prefix: impl Into<String>, backend: Arc<dyn ChatModel>) -> Self {
        self.router.chat.prefixes.push((prefix.into(), backend));
        self
    }

    /// Routes unmatched chat models to `backend`.
    pub fn default_chat(mut self, backend: Arc<dyn ChatModel>) -> Self {
        self.router.chat.default = Some(backend);
        self
    }

    /// Routes exactly `model` to an embedding `backend`.
    pub fn embedding_model(
        mut self,
        model: impl Into<String>,
        backend: Arc<dyn EmbeddingModel>,
    ) -> Self {
        self.router.embedding.exact.insert(model.into(), backend);
        self
    }

    /// Routes every embedding model starting with `prefix` to `backend`.
    pub fn embedding_prefix(
        mut self,
        prefix: impl Into<String>,
        backend: Arc<dyn EmbeddingModel>,
    ) -> Self {
        self.router.embedding.prefixes.push((prefix.into(), backend));
        self
    }

    /// Routes unmatched embedding models to `backend`.
    pub fn default_embedding(mut self, backend: Arc<dyn EmbeddingModel>) -> Self {
        self.router.embedding.default = Some(backend);
        self
    }

    /// Freezes the tables.
    pub fn build(self) -> ModelRouter {
        self.router
    }
}
