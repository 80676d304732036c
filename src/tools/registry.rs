//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找，
//! 注册顺序即 prompt 中的展示顺序；ToolExecutor 在调用时加超时并把结果统一成 ToolExecutionResult。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;

/// 工具 trait：名称、描述（原样嵌入 prompt）、参数 schema、示例参数、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于调用格式中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 示例参数：用于 prompt 中的调用示例，以及关键词回退提取时的占位参数
    fn example_args(&self) -> Value {
        serde_json::json!({})
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<Value, AgentError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，保留注册顺序
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具会替换旧实现，但保留其原有位置
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, AgentError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 能力摘要：每行 "- name: description"，嵌入规划与执行 prompt
    pub fn capability_summary(&self) -> String {
        self.iter()
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 工具 schema JSON（名称、描述、参数），嵌入执行 prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> + '_ {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedTool(&'static str, &'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            self.1
        }

        async fn execute(&self, _args: Value) -> Result<Value, AgentError> {
            Ok(Value::String(self.1.to_string()))
        }
    }

    #[test]
    fn test_summary_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("zeta", "last letter"));
        registry.register(NamedTool("alpha", "first letter"));
        assert_eq!(registry.tool_names(), vec!["zeta", "alpha"]);
        assert_eq!(
            registry.capability_summary(),
            "- zeta: last letter\n- alpha: first letter"
        );
    }

    #[test]
    fn test_reregister_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("a", "old"));
        registry.register(NamedTool("b", "other"));
        registry.register(NamedTool("a", "new"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().description(), "new");
    }

    #[tokio::test]
    async fn test_unknown_tool_error() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", Value::Null).await.unwrap_err();
        assert_eq!(err, AgentError::UnknownTool("nope".to_string()));
    }
}
