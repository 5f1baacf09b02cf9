//! # chat-runtime
//!
//! Concrete integrations for the chat orchestrator:
//!
//! - **openai**: `CompletionProvider` implementation for OpenAI-compatible
//!   chat completion endpoints (Groq by default)
//! - **search**: the default `webSearch` tool, backed by the Tavily API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_runtime::{OpenAiCompatProvider, WebSearchTool};
//!
//! let provider = OpenAiCompatProvider::from_env()?;
//! let mut tools = ToolRegistry::new();
//! tools.register(WebSearchTool::from_env()?);
//! ```

pub mod openai;
pub mod search;

pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use search::{TavilyConfig, WebSearchTool};

// Re-export core types for convenience
pub use chat_core::{
    ChatError, CompletionProvider, Message, Orchestrator, Result, SessionStore, ThreadId, Tool,
    ToolRegistry,
};
