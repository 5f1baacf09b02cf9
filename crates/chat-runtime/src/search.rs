//! Web Search Tool
//!
//! The default registered tool: a live web search backed by the Tavily
//! search API. Each invocation is a fresh network call; results are not
//! cached.

use async_trait::async_trait;
use serde::Deserialize;

use chat_core::{
    error::{ChatError, Result},
    message::ToolCall,
    tool::{ParameterSchema, Tool, ToolResult, ToolSchema},
};

/// Search tool configuration
#[derive(Clone, Debug)]
pub struct TavilyConfig {
    /// Tavily API key
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.tavily.com".into(),
            timeout_secs: 30,
        }
    }
}

impl TavilyConfig {
    /// Read configuration from the environment; `TAVILY_API_KEY` is required.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ChatError::Config("TAVILY_API_KEY is not set".into()))?;

        Ok(Self {
            api_key,
            ..Default::default()
        })
    }
}

/// Web search tool, advertised to the model as `webSearch`
pub struct WebSearchTool {
    client: reqwest::Client,
    config: TavilyConfig,
}

impl WebSearchTool {
    pub fn from_config(config: TavilyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(TavilyConfig::from_env()?)
    }

    async fn search(&self, query: &str) -> Result<String> {
        let url = format!("{}/search", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "api_key": self.config.api_key,
                "query": query,
            }))
            .send()
            .await
            .map_err(|e| ChatError::ToolExecution(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ToolExecution(format!(
                "search request failed: {status}: {body}"
            )));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ToolExecution(e.to_string()))?;

        Ok(concat_bodies(&results.results))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "webSearch".into(),
            description: "Search the latest information on the web".into(),
            parameters: vec![ParameterSchema::required_string("query", "Search query")],
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let query = call
            .arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChatError::InvalidArguments("missing required parameter: query".into()))?;

        tracing::info!(query, "dispatching web search");
        let output = self.search(query).await?;

        Ok(ToolResult::success("webSearch", output))
    }
}

/// Search API response body
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// One retrieved result; only the body text is fed back to the model
#[derive(Debug, Deserialize)]
struct SearchResult {
    content: String,
}

/// Concatenate result bodies with blank-line separators
fn concat_bodies(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = TavilyConfig::default();
        assert_eq!(config.base_url, "https://api.tavily.com");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_schema_advertises_required_query() {
        let tool = WebSearchTool::from_config(TavilyConfig::default()).unwrap();
        let schema = tool.schema();

        assert_eq!(schema.name, "webSearch");
        assert_eq!(schema.parameters.len(), 1);
        assert!(schema.parameters[0].required);
        assert_eq!(schema.parameters[0].name, "query");
    }

    #[test]
    fn test_response_parsing_and_concatenation() {
        let response: SearchResponse = serde_json::from_value(json!({
            "query": "x",
            "results": [
                {"title": "a", "url": "https://a.example", "content": "first body"},
                {"title": "b", "url": "https://b.example", "content": "second body"},
            ]
        }))
        .unwrap();

        assert_eq!(concat_bodies(&response.results), "first body\n\nsecond body");
    }

    #[test]
    fn test_empty_results_concatenate_to_empty() {
        let response: SearchResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert_eq!(concat_bodies(&response.results), "");
    }
}
