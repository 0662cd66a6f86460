//! Merging retrieved chunks into an outbound chat request.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RagChunk, RetrieveResult};
use crate::chat::{ChatMessage, ChatRequest};
use crate::error::{Result, ValidationError};

/// Upper bound on the injected context message.
///
/// Token budgets are estimated at four characters per token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextBudget {
    /// Maximum characters.
    Chars(usize),
    /// Maximum estimated tokens.
    Tokens(usize),
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::Tokens(2_000)
    }
}

impl ContextBudget {
    /// Characters per estimated token.
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Size of `text` in this budget's unit.
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            Self::Chars(_) => chars,
            Self::Tokens(_) => chars.div_ceil(Self::CHARS_PER_TOKEN),
        }
    }

    /// The limit in this budget's unit.
    pub fn limit(&self) -> usize {
        match self {
            Self::Chars(n) | Self::Tokens(n) => *n,
        }
    }

    /// Characters that fit within the budget.
    pub fn char_allowance(&self) -> usize {
        match self {
            Self::Chars(n) => *n,
            Self::Tokens(n) => n.saturating_mul(Self::CHARS_PER_TOKEN),
        }
    }

    /// Rejects a zero budget.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.limit() == 0 {
            return Err(ValidationError::invalid_field(
                "context_budget",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Wording of the injected context message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextTemplate {
    /// Text preceding the chunks.
    pub header: String,
    /// Text between chunks.
    pub separator: String,
}

impl Default for ContextTemplate {
    fn default() -> Self {
        Self {
            header: "Answer using the context below. Cite sources by their [n] marker.\n\n"
                .to_string(),
            separator: "\n\n".to_string(),
        }
    }
}

/// A chat request augmented with retrieved context.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedRequest {
    /// The augmented request.
    pub request: ChatRequest,
    /// Chunks injected, highest score first.
    pub included: Vec<RagChunk>,
    /// Chunks left out to respect the budget.
    pub dropped: usize,
    /// True if the top chunk had to be cut short.
    pub truncated: bool,
    /// Size of the injected message in the budget's unit.
    pub context_size: usize,
}

/// Injects retrieved chunks into a chat request under a size budget.
///
/// Chunks are taken highest score first until the next one no longer fits;
/// it and every lower-scored chunk are dropped. If not even the top chunk
/// fits, it is truncated to the remaining allowance. The context becomes a
/// system message placed directly before the last user message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RagComposer {
    budget: ContextBudget,
    template: ContextTemplate,
}

impl RagComposer {
    /// Creates a composer with the default template.
    pub fn new(budget: ContextBudget) -> Self {
        Self {
            budget,
            template: ContextTemplate::default(),
        }
    }

    /// Replaces the context template.
    pub fn with_template(mut self, template: ContextTemplate) -> Self {
        self.template = template;
        self
    }

    /// The configured budget.
    pub fn budget(&self) -> ContextBudget {
        self.budget
    }

    /// Augments `original` with chunks from `retrieved`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `original` has no user message.
    pub fn compose(
        &self,
        original: &ChatRequest,
        retrieved: &RetrieveResult,
    ) -> Result<ComposedRequest> {
        let user_index = original
            .last_user_index()
            .ok_or_else(|| ValidationError::required_field("messages[role=user]"))?;

        let mut ranked: Vec<&RagChunk> = retrieved.chunks.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let allowance = self.budget.char_allowance();
        let mut content = self.template.header.clone();
        let mut used = content.chars().count();
        let mut included = Vec::new();
        let mut truncated = false;

        for chunk in &ranked {
            let prefix = if included.is_empty() {
                String::new()
            } else {
                self.template.separator.clone()
            };
            let entry = format!("{}[{}] {}", prefix, included.len() + 1, chunk.chunk);
            let entry_len = entry.chars().count();

            if used + entry_len <= allowance {
                content.push_str(&entry);
                used += entry_len;
                included.push((*chunk).clone());
                continue;
            }

            // The top chunk is cut only if its marker and some text still fit.
            let marker_len = "[1] ".len();
            if included.is_empty() && allowance.saturating_sub(used) > marker_len {
                let kept = allowance - used - marker_len;
                let mut partial = (*chunk).clone();
                partial.chunk = partial.chunk.chars().take(kept).collect();
                content.push_str("[1] ");
                content.push_str(&partial.chunk);
                included.push(partial);
                truncated = true;
            }
            break;
        }

        let dropped = ranked.len() - included.len();
        let mut request = original.clone();
        let context_size = if included.is_empty() {
            0
        } else {
            let size = self.budget.measure(&content);
            request
                .messages
                .insert(user_index, ChatMessage::system(content));
            size
        };

        debug!(
            included = included.len(),
            dropped,
            truncated,
            context_size,
            limit = self.budget.limit(),
            "Context composed"
        );

        Ok(ComposedRequest {
            request,
            included,
            dropped,
            truncated,
            context_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;

    fn chunk(text: &str, score: f32) -> RagChunk {
        RagChunk {
            chunk: text.to_string(),
            score,
            source_uri: None,
            doc_id: None,
            chunk_id: None,
        }
    }

    fn retrieved(chunks: Vec<RagChunk>) -> RetrieveResult {
        RetrieveResult {
            total_matches: chunks.len(),
            chunks,
            query_vector: vec![0.0],
        }
    }

    fn bare_template() -> ContextTemplate {
        ContextTemplate {
            header: String::new(),
            separator: "\n".to_string(),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("m")
            .with_message(ChatMessage::system("be brief"))
            .with_message(ChatMessage::user("what is ec2?"))
    }

    #[test]
    fn test_context_precedes_user_turn() {
        let composer = RagComposer::new(ContextBudget::Chars(1_000));
        let composed = composer
            .compose(&request(), &retrieved(vec![chunk("EC2 is compute", 0.9)]))
            .unwrap();

        let roles: Vec<_> = composed.request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [ChatRole::System, ChatRole::System, ChatRole::User]);
        assert!(composed.request.messages[1].content.contains("[1] EC2 is compute"));
        assert_eq!(composed.request.messages[2].content, "what is ec2?");
    }

    #[test]
    fn test_lowest_scores_dropped_first() {
        let composer = RagComposer::new(ContextBudget::Chars(20)).with_template(bare_template());
        let composed = composer
            .compose(
                &request(),
                &retrieved(vec![
                    chunk("low-low-low", 0.1),
                    chunk("high", 0.9),
                    chunk("mid", 0.5),
                ]),
            )
            .unwrap();

        let texts: Vec<_> = composed.included.iter().map(|c| c.chunk.as_str()).collect();
        assert_eq!(texts, ["high", "mid"]);
        assert_eq!(composed.dropped, 1);
        assert!(!composed.truncated);
        assert!(composed.context_size <= 20);
    }

    #[test]
    fn test_oversized_top_chunk_is_truncated() {
        let composer = RagComposer::new(ContextBudget::Chars(10)).with_template(bare_template());
        let composed = composer
            .compose(&request(), &retrieved(vec![chunk("abcdefghijklmnop", 0.9)]))
            .unwrap();

        assert!(composed.truncated);
        assert_eq!(composed.context_size, 10);
        assert_eq!(composed.request.messages[1].content, "[1] abcdef");
        assert_eq!(composed.included[0].chunk, "abcdef");
    }

    #[test]
    fn test_no_room_past_marker_drops_top_chunk() {
        for limit in [3, 4] {
            let composer =
                RagComposer::new(ContextBudget::Chars(limit)).with_template(bare_template());
            let composed = composer
                .compose(&request(), &retrieved(vec![chunk("abcdef", 0.9), chunk("gh", 0.5)]))
                .unwrap();

            assert!(composed.included.is_empty(), "limit {limit}");
            assert!(!composed.truncated);
            assert_eq!(composed.dropped, 2);
            assert_eq!(composed.request, request());
        }

        let composer = RagComposer::new(ContextBudget::Chars(5)).with_template(bare_template());
        let composed = composer
            .compose(&request(), &retrieved(vec![chunk("abcdef", 0.9)]))
            .unwrap();
        assert_eq!(composed.request.messages[1].content, "[1] a");
        assert_eq!(composed.included[0].chunk, "a");
    }

    #[test]
    fn test_header_larger_than_budget_injects_nothing() {
        let composer = RagComposer::new(ContextBudget::Chars(5));
        let composed = composer
            .compose(&request(), &retrieved(vec![chunk("text", 0.9)]))
            .unwrap();
        assert!(composed.included.is_empty());
        assert_eq!(composed.request, request());
        assert_eq!(composed.context_size, 0);
    }

    #[test]
    fn test_token_budget_estimate() {
        let budget = ContextBudget::Tokens(3);
        assert_eq!(budget.measure("abcdefghi"), 3);
        assert_eq!(budget.char_allowance(), 12);
    }

    #[test]
    fn test_missing_user_message_rejected() {
        let composer = RagComposer::default();
        let original = ChatRequest::new("m").with_message(ChatMessage::system("sys"));
        let err = composer.compose(&original, &retrieved(vec![])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_multibyte_text_is_cut_on_char_boundary() {
        let composer = RagComposer::new(ContextBudget::Chars(7)).with_template(bare_template());
        let composed = composer
            .compose(&request(), &retrieved(vec![chunk("日本語のテキスト", 0.9)]))
            .unwrap();
        assert_eq!(composed.included[0].chunk, "日本語");
    }
}
