//! web_scraper 工具：抓取 URL 并按内容类型整理结果
//!
//! HTML 用 html2text 转为可读文本并提取 <title>；给出 CSS selector 时只取匹配元素的文本；
//! JSON 格式化输出；其他类型原样返回。
//! 内容超过 max_result_chars 时截断并追加 "..."。支持可选的 basic auth 凭据。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use ::scraper::{Html, Selector};
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::tools::Tool;

pub const DEFAULT_MAX_RESULT_CHARS: usize = 5000;

pub const NO_SELECTOR_MATCH: &str = "No content found with the provided selector";

fn title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("title").expect("title selector is valid"))
}

fn parse_selector(selector: &str) -> Result<Selector, AgentError> {
    Selector::parse(selector).map_err(|e| {
        AgentError::invalid_args("web_scraper", format!("invalid selector '{selector}': {e}"))
    })
}

/// 抓取工具：超时与最大字符数由配置决定
pub struct WebScraperTool {
    client: Client,
    max_result_chars: usize,
}

impl WebScraperTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_result_chars,
        }
    }

    async fn scrape(
        &self,
        url: &str,
        credentials: Option<(&str, &str)>,
        selector: Option<&str>,
    ) -> Result<Value, AgentError> {
        let mut request = self.client.get(url);
        if let Some((username, password)) = credentials {
            request = request.basic_auth(username, Some(password));
        }
        let resp = request
            .send()
            .await
            .map_err(|e| AgentError::UpstreamRequestFailure(format!("Request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AgentError::UpstreamRequestFailure(format!(
                "HTTP {} from {url}",
                resp.status()
            )));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| AgentError::UpstreamRequestFailure(format!("Read body: {e}")))?;

        render_page(url, &content_type, &body, selector, self.max_result_chars)
    }
}

/// 按内容类型整理抓取结果；selector 只作用于 HTML
pub fn render_page(
    url: &str,
    content_type: &str,
    body: &str,
    selector: Option<&str>,
    max_chars: usize,
) -> Result<Value, AgentError> {
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);

    if content_type.contains("text/html") {
        let document = Html::parse_document(body);
        let title = document
            .select(title_selector())
            .next()
            .map(|t| {
                t.text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title".to_string());
        let text = match selector {
            Some(selector) => {
                let selector = parse_selector(selector)?;
                let matched: Vec<String> = document
                    .select(&selector)
                    .map(|el| element_text(el.text()))
                    .collect();
                if matched.is_empty() {
                    NO_SELECTOR_MATCH.to_string()
                } else {
                    matched.join("\n")
                }
            }
            None => from_read(body.as_bytes(), 120).unwrap_or_else(|_| body.to_string()),
        };
        return Ok(json!({
            "url": url,
            "title": title,
            "content": truncate(&text, max_chars),
            "content_type": "html",
        }));
    }

    if content_type.contains("application/json") {
        if let Ok(parsed) = serde_json::from_str::<Value>(body) {
            let pretty = serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| body.to_string());
            return Ok(json!({
                "url": url,
                "content": truncate(&pretty, max_chars),
                "content_type": "json",
            }));
        }
    }

    Ok(json!({
        "url": url,
        "content": truncate(body, max_chars),
        "content_type": content_type,
    }))
}

/// 元素内各文本节点去掉首尾空白后拼接
fn element_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "Fetch a web page or API URL and return its readable content. Args: {\"url\": \"https://...\", \"selector\": \"CSS selector\" (optional), \"credentials\": {\"username\": \"...\", \"password\": \"...\"} (optional basic auth)}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "http(s) URL to fetch" },
                "selector": {
                    "type": "string",
                    "description": "CSS selector; only the text of matching elements is returned"
                },
                "credentials": {
                    "type": "object",
                    "properties": {
                        "username": { "type": "string" },
                        "password": { "type": "string" }
                    }
                }
            },
            "required": ["url"]
        })
    }

    fn example_args(&self) -> Value {
        json!({"url": "https://example.com"})
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AgentError::invalid_args(
                "web_scraper",
                format!("expected an http(s) url, got '{url}'"),
            ));
        }
        let credentials = args.get("credentials").and_then(|c| {
            Some((
                c.get("username")?.as_str()?,
                c.get("password").and_then(Value::as_str).unwrap_or(""),
            ))
        });
        let selector = args.get("selector").and_then(Value::as_str).filter(|s| !s.trim().is_empty());
        if let Some(selector) = selector {
            parse_selector(selector)?;
        }
        tracing::info!(url = %url, auth = credentials.is_some(), selector = ?selector, "web_scraper fetch");
        self.scrape(url, credentials, selector).await
    }
}
