//! Orchestration Loop
//!
//! The state machine tying the session store, completion provider, and tool
//! registry together. Each request appends the user turn, then repeatedly
//! asks the completion service for an assistant turn, dispatching any
//! requested tool calls in order, until the model produces a final answer
//! or the attempt ceiling is reached.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ChatError, Result};
use crate::message::Message;
use crate::provider::{CompletionProvider, GenerationOptions};
use crate::session::{ConversationState, SessionStore, ThreadId, TurnLocks};
use crate::tool::ToolRegistry;

/// Sentinel answer returned when the model never converges.
pub const RETRY_EXCEEDED_MESSAGE: &str = "Max retries exceeded";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a smart personal assistant who answers the questions.";

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Fixed system prompt seeding every new conversation
    pub system_prompt: String,

    /// Completion-call ceiling per request; bounds worst-case cost when the
    /// model keeps requesting tools without converging
    pub max_attempts: usize,

    /// Deadline for a single completion call
    pub completion_deadline: Duration,

    /// Deadline for a single tool dispatch
    pub tool_deadline: Duration,

    /// Generation parameters
    pub generation: GenerationOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_attempts: 10,
            completion_deadline: Duration::from_secs(60),
            tool_deadline: Duration::from_secs(30),
            generation: GenerationOptions::default(),
        }
    }
}

/// The conversation orchestration engine.
///
/// Constructed once at process start and shared across requests; all
/// collaborators are injected so tests can substitute doubles.
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionStore>,
    turn_locks: TurnLocks,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            sessions,
            turn_locks: TurnLocks::new(),
            config,
        }
    }

    /// Process one user utterance and return the final assistant answer
    /// (or the retry-exceeded sentinel).
    pub async fn respond(&self, thread: &ThreadId, user_text: &str) -> Result<String> {
        self.respond_with_cancel(thread, user_text, &CancellationToken::new())
            .await
    }

    /// Like [`respond`](Self::respond), aborting at the next suspension
    /// point once `cancel` fires. A cancelled turn persists nothing.
    pub async fn respond_with_cancel(
        &self,
        thread: &ThreadId,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        // Serialize turns per thread for the whole get-modify-put cycle so
        // interleaved requests cannot lose each other's updates.
        let gate = self.turn_locks.gate(thread);
        let _turn = gate.lock().await;

        let mut state = self
            .sessions
            .get(thread)?
            .unwrap_or_else(|| ConversationState::new(&self.config.system_prompt));

        state.conversation.push(Message::user(user_text));

        let declarations = self.tools.schemas();
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ChatError::Cancelled);
            }

            if attempts >= self.config.max_attempts {
                tracing::warn!(thread = %thread, attempts, "attempt ceiling reached");
                // Keep the partial tool-call progress so a follow-up request
                // resumes from here instead of replaying from scratch.
                self.sessions.put(thread, state)?;
                return Ok(RETRY_EXCEEDED_MESSAGE.into());
            }
            attempts += 1;

            state.conversation.trim_to_fit();

            tracing::debug!(thread = %thread, attempt = attempts, "requesting completion");
            let turn = tokio::time::timeout(
                self.config.completion_deadline,
                self.provider
                    .complete(state.conversation.messages(), &declarations, &self.config.generation),
            )
            .await
            .map_err(|_| ChatError::Timeout(self.config.completion_deadline))??;

            let answer = turn.content.clone();
            let calls = turn.tool_calls.clone();
            state.conversation.push(turn.into_message());

            if calls.is_empty() {
                let answer = answer.unwrap_or_default();
                self.sessions.put(thread, state)?;
                return Ok(answer);
            }

            // Sequential dispatch, in call order: the completion protocol
            // expects tool results to immediately follow their issuing
            // assistant turn, and a later call may depend on history so far.
            for call in calls {
                if cancel.is_cancelled() {
                    return Err(ChatError::Cancelled);
                }

                tracing::debug!(thread = %thread, tool = %call.name, id = %call.id, "dispatching tool");
                let content = match tokio::time::timeout(
                    self.config.tool_deadline,
                    self.tools.dispatch(&call),
                )
                .await
                {
                    Ok(Ok(result)) => result.output,
                    Ok(Err(e)) => {
                        // Fed back as data so the model can self-correct.
                        tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                        serde_json::json!({ "error": e.to_string() }).to_string()
                    }
                    Err(_) => {
                        tracing::warn!(tool = %call.name, "tool call timed out");
                        serde_json::json!({
                            "error": format!(
                                "tool '{}' timed out after {:?}",
                                call.name, self.config.tool_deadline
                            )
                        })
                        .to_string()
                    }
                };

                state
                    .conversation
                    .push(Message::tool(call.id, call.name, content));
            }
        }
    }

    /// The session store this orchestrator persists into
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// The registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Current configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}
