//! Completion Provider Interface
//!
//! Defines the boundary to the LLM completion service. The orchestration
//! loop works exclusively through this trait, so the backing service (or a
//! test stub) can be swapped without touching agent logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, ToolCall};
use crate::tool::ToolSchema;

/// Fixed generation parameters sent with every completion request.
///
/// Temperature defaults to zero: the loop replays full histories, and
/// deterministic sampling keeps replays reproducible.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier
    pub model: String,

    /// Temperature for sampling
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate, if bounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "openai/gpt-oss-20b".into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// One assistant turn returned by the completion service.
///
/// Either `content` is present (terminal answer) or `tool_calls` is
/// non-empty (the turn requests dispatch); the protocol allows both at once.
#[derive(Clone, Debug, Default)]
pub struct AssistantTurn {
    /// Natural-language answer, when the model produced one
    pub content: Option<String>,

    /// Requested tool invocations, in call order
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    /// Terminal turn carrying only text
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Non-terminal turn carrying tool calls
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    /// Whether this turn ends the loop
    pub fn is_terminal(&self) -> bool {
        self.tool_calls.is_empty()
    }

    /// Convert into the assistant message appended to history
    pub fn into_message(self) -> Message {
        Message::Assistant {
            content: self.content,
            tool_calls: self.tool_calls,
        }
    }
}

/// Boundary to the LLM completion service.
///
/// `complete` submits the full ordered history plus the advertised tool
/// schemas and returns exactly one assistant turn. Transport, auth, and
/// rate-limit failures surface as [`crate::ChatError`] completion variants
/// and are fatal for the current request.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate one assistant turn from the conversation so far
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<AssistantTurn>;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool>;
}
