//! Conversation Messages
//!
//! Tagged message variants used across the orchestration engine. Each role
//! carries exactly the fields the completion protocol defines for it, so a
//! malformed payload fails to deserialize instead of misbehaving at runtime.

use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (fed back as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the assistant.
///
/// `arguments` is structured JSON; the completion wire format carries it as
/// a JSON string and the provider parses it before it reaches the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the correlated tool message
    pub id: String,

    /// Registered tool name
    pub name: String,

    /// Raw argument payload, validated against the tool's schema at dispatch
    pub arguments: serde_json::Value,
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        /// Final answer text; absent when the turn only issues tool calls
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,

        /// Tool invocations requested by this turn, in call order
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        /// Id of the `ToolCall` this result answers
        tool_call_id: String,

        /// Name of the tool that produced the result
        tool_name: String,

        /// Tool output, serialized as text
        content: String,
    },
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a plain assistant message with no tool calls
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create a tool result message correlated to a tool call
    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    /// Role of this message
    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if the variant carries any
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls issued by an assistant turn (empty for other roles)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token is a rough estimate
        let mut chars = self.content().map_or(0, str::len);
        for call in self.tool_calls() {
            chars += call.name.len() + call.arguments.to_string().len();
        }
        (chars / 4) as u32 + 4 // +4 for role overhead
    }
}

/// Ordered conversation history.
///
/// Append order is the exact chronological order of turns: the system prompt
/// first, then user → assistant → tool* → assistant → … per turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Maximum context length (in estimated tokens)
    #[serde(default = "default_max_context")]
    max_context_tokens: u32,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            max_context_tokens: default_max_context(),
        }
    }
}

fn default_max_context() -> u32 {
    8192
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Drop oldest user turns until the history fits the context budget.
    ///
    /// Removal is turn-granular: a turn spans from a user message up to (but
    /// excluding) the next user message, so an assistant message and its tool
    /// results are never split apart. The system prompt and the newest turn
    /// are always kept.
    pub fn trim_to_fit(&mut self) {
        while self.estimate_tokens() > self.max_context_tokens {
            let Some(start) = self
                .messages
                .iter()
                .position(|m| m.role() != Role::System)
            else {
                break;
            };
            let end = self.messages[start + 1..]
                .iter()
                .position(|m| m.role() == Role::User)
                .map(|i| start + 1 + i);
            // No later user message means `start` opens the in-flight turn.
            let Some(end) = end else { break };
            self.messages.drain(start..end);
        }
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
