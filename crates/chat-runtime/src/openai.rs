//! OpenAI-compatible Completion Provider
//!
//! Implementation of `CompletionProvider` for any OpenAI-compatible chat
//! completions endpoint. Defaults target Groq's hosted API, the service the
//! orchestrator was built against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chat_core::{
    error::{ChatError, Result},
    message::{Message, ToolCall},
    provider::{AssistantTurn, CompletionProvider, GenerationOptions},
    tool::ToolSchema,
};

/// Provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry budget for transient failures (independent of the
    /// orchestrator's tool-calling attempt ceiling)
    pub max_retries: u32,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key: String::new(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl OpenAiCompatConfig {
    /// Read configuration from the environment.
    ///
    /// `GROQ_API_KEY` is required; `GROQ_BASE_URL` overrides the endpoint.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ChatError::Config("GROQ_API_KEY is not set".into()))?;
        let base_url = std::env::var("GROQ_BASE_URL")
            .unwrap_or_else(|_| Self::default().base_url);

        Ok(Self {
            api_key,
            base_url,
            ..Default::default()
        })
    }
}

/// OpenAI-compatible completion provider
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiCompatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiCompatConfig::from_env()?)
    }

    /// Convert conversation messages to the wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } => WireMessage::text("system", content.clone()),
                Message::User { content } => WireMessage::text("user", content.clone()),
                Message::Assistant {
                    content,
                    tool_calls,
                } => WireMessage {
                    role: "assistant",
                    content: content.clone(),
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls.iter().map(WireToolCall::from_call).collect())
                    },
                    tool_call_id: None,
                    name: None,
                },
                Message::Tool {
                    tool_call_id,
                    tool_name,
                    content,
                } => WireMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id.clone()),
                    name: Some(tool_name.clone()),
                },
            })
            .collect()
    }

    /// Convert tool schemas to function declarations
    fn convert_tools(tools: &[ToolSchema]) -> Vec<WireToolDecl> {
        tools
            .iter()
            .map(|schema| WireToolDecl {
                kind: "function",
                function: WireFunctionDecl {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    parameters: schema.parameters_json_schema(),
                },
            })
            .collect()
    }

    fn build_request(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> WireRequest {
        let tools = Self::convert_tools(tools);
        WireRequest {
            model: options.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            messages: Self::convert_messages(messages),
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            tools,
        }
    }

    /// Convert a wire response into an assistant turn
    fn parse_turn(response: WireResponse) -> Result<AssistantTurn> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Parse("no choices in completion response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_call)
            .collect();

        Ok(AssistantTurn {
            content: choice.message.content,
            tool_calls,
        })
    }

    async fn send(&self, request: &WireRequest) -> Result<AssistantTurn> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::CompletionUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ChatError::Auth(body),
                429 => ChatError::RateLimited(body),
                s if s >= 500 => ChatError::CompletionUnavailable(format!("{status}: {body}")),
                _ => ChatError::Completion(format!("{status}: {body}")),
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        Self::parse_turn(wire)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<AssistantTurn> {
        let request = Self::build_request(messages, tools, options);

        let mut attempt = 0;
        loop {
            match self.send(&request).await {
                Ok(turn) => return Ok(turn),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = std::time::Duration::from_millis(250 * 2u64.pow(attempt - 1));
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "retrying completion");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("completion service health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireToolDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// Argument payload as a JSON string, per the completion protocol
    arguments: String,
}

impl WireToolCall {
    fn from_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function".into(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }

    /// Parse into the structured call the registry validates. Unparseable
    /// argument payloads are preserved as a JSON string so schema validation
    /// rejects them and the model gets the failure fed back.
    fn into_call(self) -> ToolCall {
        let arguments = serde_json::from_str(&self.function.arguments)
            .unwrap_or(serde_json::Value::String(self.function.arguments));
        let id = if self.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.id
        };

        ToolCall {
            id,
            name: self.function.name,
            arguments,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolDecl {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDecl,
}

#[derive(Debug, Serialize)]
struct WireFunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::tool::ParameterSchema;
    use serde_json::json;

    fn search_schema() -> ToolSchema {
        ToolSchema {
            name: "webSearch".into(),
            description: "Search the latest information on the web".into(),
            parameters: vec![ParameterSchema::required_string("query", "Search query")],
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAiCompatConfig::default();
        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::system("sys"), Message::user("hello")];
        let request = OpenAiCompatProvider::build_request(
            &messages,
            &[search_schema()],
            &GenerationOptions::default(),
        );

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "webSearch");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"][0],
            "query"
        );
    }

    #[test]
    fn test_no_tools_omits_tool_choice() {
        let messages = vec![Message::user("hello")];
        let request =
            OpenAiCompatProvider::build_request(&messages, &[], &GenerationOptions::default());

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_result_message_wire_shape() {
        let messages = vec![Message::tool("call_1", "webSearch", "results")];
        let wire = OpenAiCompatProvider::convert_messages(&messages);

        let body = serde_json::to_value(&wire).unwrap();
        assert_eq!(body[0]["role"], "tool");
        assert_eq!(body[0]["tool_call_id"], "call_1");
        assert_eq!(body[0]["name"], "webSearch");
        assert_eq!(body[0]["content"], "results");
    }

    #[test]
    fn test_assistant_tool_calls_round_trip_as_json_string() {
        let messages = vec![Message::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "webSearch".into(),
                arguments: json!({"query": "x"}),
            }],
        }];
        let wire = OpenAiCompatProvider::convert_messages(&messages);

        let body = serde_json::to_value(&wire).unwrap();
        let arguments = body[0]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(arguments).unwrap(),
            json!({"query": "x"})
        );
    }

    #[test]
    fn test_parse_content_turn() {
        let wire: WireResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "hi!", "tool_calls": null}}]
        }))
        .unwrap();

        let turn = OpenAiCompatProvider::parse_turn(wire).unwrap();
        assert_eq!(turn.content.as_deref(), Some("hi!"));
        assert!(turn.is_terminal());
    }

    #[test]
    fn test_parse_tool_call_turn() {
        let wire: WireResponse = serde_json::from_value(json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "webSearch", "arguments": "{\"query\":\"x\"}"}
                }]
            }}]
        }))
        .unwrap();

        let turn = OpenAiCompatProvider::parse_turn(wire).unwrap();
        assert!(!turn.is_terminal());
        assert_eq!(turn.tool_calls[0].id, "call_1");
        assert_eq!(turn.tool_calls[0].arguments, json!({"query": "x"}));
    }

    #[test]
    fn test_malformed_arguments_kept_as_string() {
        let call = WireToolCall {
            id: "call_1".into(),
            kind: "function".into(),
            function: WireFunctionCall {
                name: "webSearch".into(),
                arguments: "{not json".into(),
            },
        };

        let parsed = call.into_call();
        assert_eq!(parsed.arguments, json!("{not json"));
    }

    #[test]
    fn test_missing_call_id_is_backfilled() {
        let call = WireToolCall {
            id: String::new(),
            kind: "function".into(),
            function: WireFunctionCall {
                name: "webSearch".into(),
                arguments: "{}".into(),
            },
        };

        assert!(!call.into_call().id.is_empty());
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let wire: WireResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = OpenAiCompatProvider::parse_turn(wire).unwrap_err();
        assert!(matches!(err, ChatError::Parse(_)));
    }
}
