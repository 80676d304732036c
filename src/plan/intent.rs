//! 工具调用意图提取
//!
//! 主路径：解析模型输出中的 ```tool_call / ```json 代码块（单个对象或对象数组，按出现顺序）；
//! 没有代码块时尝试把整段输出当作 JSON。
//! 回退路径（需显式开启）：大小写不敏感地查找已知工具名，每个命中的工具生成一次占位参数调用。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::tools::{ToolInvocation, ToolRegistry};

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:tool_call|json)[ \t]*\r?\n(.*?)```")
            .expect("fenced block regex is valid")
    })
}

/// 意图提取器：持有已注册工具名与其占位参数（仅回退路径使用）
#[derive(Debug, Clone, Default)]
pub struct IntentExtractor {
    known_tools: Vec<(String, Value)>,
    keyword_fallback: bool,
}

impl IntentExtractor {
    pub fn new(registry: &ToolRegistry) -> Self {
        let known_tools = registry
            .tool_names()
            .into_iter()
            .filter_map(|name| {
                let example = registry.get(&name)?.example_args();
                Some((name, example))
            })
            .collect();
        Self {
            known_tools,
            keyword_fallback: false,
        }
    }

    /// 开启关键词回退（仅在没有任何结构化调用时生效）
    pub fn with_keyword_fallback(mut self, enabled: bool) -> Self {
        self.keyword_fallback = enabled;
        self
    }

    pub fn keyword_fallback(&self) -> bool {
        self.keyword_fallback
    }

    /// 从模型输出中提取有序的工具调用列表
    pub fn extract(&self, agent_text: &str) -> Vec<ToolInvocation> {
        let structured = extract_structured(agent_text);
        if !structured.is_empty() || !self.keyword_fallback {
            return structured;
        }

        let lowered = agent_text.to_lowercase();
        let matched: Vec<ToolInvocation> = self
            .known_tools
            .iter()
            .filter(|(name, _)| lowered.contains(&name.to_lowercase()))
            .map(|(name, example)| ToolInvocation::new(name.clone(), example.clone()))
            .collect();
        if !matched.is_empty() {
            tracing::debug!(count = matched.len(), "tool calls derived from keyword fallback");
        }
        matched
    }
}

/// 结构化提取：代码块优先，其次整段 JSON
pub fn extract_structured(agent_text: &str) -> Vec<ToolInvocation> {
    let mut invocations = Vec::new();
    let mut saw_block = false;

    for caps in fenced_block_re().captures_iter(agent_text) {
        saw_block = true;
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        match serde_json::from_str::<Value>(body) {
            Ok(value) => collect_invocations(value, &mut invocations),
            Err(e) => tracing::warn!(error = %e, "malformed tool_call block skipped"),
        }
    }

    if !saw_block {
        if let Ok(value) = serde_json::from_str::<Value>(agent_text.trim()) {
            collect_invocations(value, &mut invocations);
        }
    }

    invocations
}

fn collect_invocations(value: Value, out: &mut Vec<ToolInvocation>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_invocations(item, out);
            }
        }
        Value::Object(mut map) => {
            let Some(Value::String(tool)) = map.remove("tool") else {
                return;
            };
            if tool.trim().is_empty() {
                return;
            }
            let args = map.remove("args").unwrap_or(Value::Null);
            out.push(ToolInvocation::new(tool.trim(), args));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::core::AgentError;
    use crate::tools::Tool;

    struct Stub(&'static str, Value);

    #[async_trait]
    impl Tool for Stub {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn example_args(&self) -> Value {
            self.1.clone()
        }

        async fn execute(&self, _args: Value) -> Result<Value, AgentError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Stub("web_scraper", json!({"url": "https://example.com"})));
        registry.register(Stub("shell_command", json!({"command": "ls -la"})));
        registry.register(Stub("file_manager", json!({"action": "read", "path": "example.txt"})));
        registry.register(Stub("web_search", json!({"query": "example search query"})));
        registry
    }

    #[test]
    fn test_fenced_blocks_in_order() {
        let text = "I will list files first.\n```tool_call\n{\"tool\": \"shell_command\", \"args\": {\"command\": \"ls\"}}\n```\nThen read one:\n```json\n[{\"tool\": \"file_manager\", \"args\": {\"action\": \"read\", \"path\": \"a.txt\"}}, {\"tool\": \"web_search\", \"args\": {\"query\": \"rust\"}}]\n```";
        let calls = IntentExtractor::new(&registry()).extract(text);
        let names: Vec<&str> = calls.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(names, ["shell_command", "file_manager", "web_search"]);
        assert_eq!(calls[0].args_value(), json!({"command": "ls"}));
    }

    #[test]
    fn test_bare_json_object_accepted() {
        let calls = extract_structured(r#" {"tool": "web_search", "args": {"query": "tokio"}} "#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["query"], json!("tokio"));
    }

    #[test]
    fn test_unknown_tools_are_still_returned() {
        let calls = extract_structured("```tool_call\n{\"tool\": \"teleport\", \"args\": {}}\n```");
        assert_eq!(calls[0].tool, "teleport");
    }

    #[test]
    fn test_objects_without_tool_and_malformed_blocks_skipped() {
        let text = "```json\n{\"note\": \"no tool here\"}\n```\n```tool_call\n{not json\n```";
        assert!(extract_structured(text).is_empty());
    }

    #[test]
    fn test_plain_prose_yields_nothing_without_fallback() {
        let extractor = IntentExtractor::new(&registry());
        assert!(extractor
            .extract("I would use the shell_command tool and web_search here.")
            .is_empty());
    }

    #[test]
    fn test_keyword_fallback_uses_registration_order_and_placeholders() {
        let extractor = IntentExtractor::new(&registry()).with_keyword_fallback(true);
        let calls = extractor.extract("Use WEB_SEARCH, then Shell_Command, then web_search again.");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool, "shell_command");
        assert_eq!(calls[0].args_value(), json!({"command": "ls -la"}));
        assert_eq!(calls[1].tool, "web_search");
    }

    #[test]
    fn test_structured_calls_take_precedence_over_fallback() {
        let extractor = IntentExtractor::new(&registry()).with_keyword_fallback(true);
        let text = "web_scraper is not needed.\n```tool_call\n{\"tool\": \"web_search\", \"args\": {\"query\": \"x\"}}\n```";
        let calls = extractor.extract(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "web_search");
    }
}
