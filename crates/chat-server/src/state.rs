//! Application State

use std::sync::Arc;

use chat_core::{CompletionProvider, Orchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The conversation orchestration engine
    pub orchestrator: Arc<Orchestrator>,

    /// Completion provider handle, kept for health reporting
    pub provider: Arc<dyn CompletionProvider>,

    /// Whether the web-search tool was configured at startup
    pub search_enabled: bool,
}
