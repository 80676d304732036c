//! 结构化工具调用格式与其 JSON Schema（schemars 自动生成）
//!
//! 执行 prompt 要求模型以 ```tool_call 代码块输出 `{"tool": "...", "args": {...}}`，
//! 该 Schema 会拼入 prompt，减少格式错误。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 一次工具调用意图：工具名 + 参数映射（字符串键，任意值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolInvocation {
    /// 工具名，如 shell_command、file_manager、web_scraper、web_search
    pub tool: String,
    /// 工具参数，依工具不同而不同（command、action/path/content、url、query 等）
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool: tool.into(),
            args,
        }
    }

    pub fn args_value(&self) -> Value {
        Value::Object(self.args.clone())
    }
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolInvocation);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
