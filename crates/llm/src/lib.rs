use kompas_core::{ChatTurn, ContextBlock, Domain};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("assistant model rejected the request: {0}")]
    Rejected(String),
    #[error("assistant model transport failed: {0}")]
    Transport(String),
}

/// Everything the text-generation collaborator receives: the assembled
/// grounding block, prior turns, and the new user message. The model
/// itself is owned elsewhere; this workspace only defines the seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub domain: Domain,
    pub jurisdiction: String,
    pub context: ContextBlock,
    pub history: Vec<ChatTurn>,
    pub user_message: String,
}

pub trait AssistantModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Deterministic offline responder used by the CLI and tests when no real
/// model is wired in. It folds the grounding facts into a fixed template
/// so replies stay inspectable and reproducible.
#[derive(Debug, Clone, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn new() -> Self {
        Self
    }
}

impl AssistantModel for TemplateResponder {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut reply = format!(
            "[{} assistant, {}] Based on {} matching record(s):\n{}",
            request.domain.as_str(),
            request.jurisdiction,
            request.context.listing_count,
            request.context.text
        );
        if request.context.truncated {
            reply.push_str("\n(The listing excerpt above was shortened.)");
        }
        if !request.history.is_empty() {
            reply.push_str(&format!("\n(Continuing a {}-turn conversation.)", request.history.len()));
        }
        Ok(reply)
    }
}
