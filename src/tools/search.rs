//! web_search 工具：DuckDuckGo Instant Answer JSON 接口
//!
//! 请求 `{endpoint}?q=..&format=json&no_html=1&skip_disambig=1`，将摘要与相关主题整理为
//! `{title, snippet, url}` 列表（最多 num_results 条）。端点可配置。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::tools::Tool;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    default_results: usize,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64, default_results: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("taskbee/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            default_results,
        }
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Value, AgentError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::UpstreamRequestFailure(format!("Search request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AgentError::UpstreamRequestFailure(format!(
                "Search returned HTTP {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::UpstreamRequestFailure(format!("Search response: {e}")))?;

        Ok(json!({
            "query": query,
            "results": instant_answer_results(&body, num_results),
        }))
    }
}

/// 摘要（若有）在前，其后按顺序展开 RelatedTopics（含分组的 Topics）
pub fn instant_answer_results(body: &Value, limit: usize) -> Vec<Value> {
    let mut results = Vec::new();

    let abstract_text = body.get("AbstractText").and_then(Value::as_str).unwrap_or("");
    if !abstract_text.is_empty() {
        results.push(json!({
            "title": body.get("Heading").and_then(Value::as_str).unwrap_or(""),
            "snippet": abstract_text,
            "url": body.get("AbstractURL").and_then(Value::as_str).unwrap_or(""),
        }));
    }

    let mut stack: Vec<&Value> = body
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(|topics| topics.iter().rev().collect())
        .unwrap_or_default();
    while let Some(topic) = stack.pop() {
        if results.len() >= limit {
            break;
        }
        if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
            stack.extend(nested.iter().rev());
            continue;
        }
        let (Some(text), Some(url)) = (
            topic.get("Text").and_then(Value::as_str),
            topic.get("FirstURL").and_then(Value::as_str),
        ) else {
            continue;
        };
        let title = text.split(" - ").next().unwrap_or(text);
        results.push(json!({ "title": title, "snippet": text, "url": url }));
    }

    results.truncate(limit);
    results
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, snippets and URLs. Args: {\"query\": \"search terms\", \"num_results\": 5}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "num_results": { "type": "integer", "minimum": 1, "default": 5 }
            },
            "required": ["query"]
        })
    }

    fn example_args(&self) -> Value {
        json!({"query": "example search query"})
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AgentError::invalid_args("web_search", "missing 'query'"))?;
        let num_results = args
            .get("num_results")
            .and_then(Value::as_u64)
            .map(|n| n.max(1) as usize)
            .unwrap_or(self.default_results);
        tracing::info!(query = %query, num_results, "web_search");
        self.search(query, num_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_then_flattened_topics() {
        let body = json!({
            "Heading": "Rust",
            "AbstractText": "Rust is a language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "RelatedTopics": [
                {"Text": "Cargo - package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Group", "Topics": [
                    {"Text": "Tokio - async runtime", "FirstURL": "https://duckduckgo.com/Tokio"}
                ]},
                {"Text": "Serde", "FirstURL": "https://duckduckgo.com/Serde"}
            ]
        });
        let results = instant_answer_results(&body, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["title"], json!("Rust"));
        assert_eq!(results[1]["title"], json!("Cargo"));
        assert_eq!(results[2]["url"], json!("https://duckduckgo.com/Tokio"));
    }

    #[test]
    fn test_empty_answer() {
        assert!(instant_answer_results(&json!({"AbstractText": ""}), 5).is_empty());
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = WebSearchTool::new(DEFAULT_SEARCH_ENDPOINT, 5, 5);
        let err = tool.execute(json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidArguments");
    }
}
