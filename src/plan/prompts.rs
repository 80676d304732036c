//! 规划 / 执行 prompt 模板
//!
//! 默认模板内置；若存在 config/prompts/planning.txt、config/prompts/execution.txt 则优先使用文件内容。
//! 占位符：{task}、{tools}（规划）；{task_step}、{context}、{tools}、{call_format}（执行）。
//! 替换单遍完成，模型输出经由上下文带回的 `{...}` 文本保持原样。

use crate::tools::tool_call_schema_json;

pub const DEFAULT_PLANNING_TEMPLATE: &str = r#"You are an expert AI planning agent focused on breaking down complex tasks into clear, actionable steps.

TASK: {task}

YOUR GOAL: Create a detailed, step-by-step plan to accomplish this task efficiently.

CONSTRAINTS:
- Consider the available tools:
{tools}
- If the task requires web access, include specific URLs or search queries
- If the task requires executing commands, specify them clearly
- Identify any potential credentials or access requirements
- Highlight any potential issues or challenges that might arise

Please respond with a structured plan in the following format:
1. [Step description]
   - Sub-task 1
   - Sub-task 2
2. [Next step description]
   - Sub-task 1
   - Sub-task 2

PLAN:
"#;

pub const DEFAULT_EXECUTION_TEMPLATE: &str = r#"You are an expert AI execution agent responsible for carrying out specific tasks.

TASK STEP: {task_step}
OVERALL CONTEXT: {context}

YOUR GOAL: Execute this specific step as effectively as possible, using the tools available to you.

AVAILABLE TOOLS:
{tools}

TOOL CALL FORMAT:
{call_format}

INSTRUCTIONS:
1. Consider which tool is most appropriate for this specific step
2. Request each tool call with its own fenced block, in the order they should run
3. Report back with the results you expect, including any relevant information to retrieve
4. If no tool is needed, answer in plain text without any tool_call block
5. If you require user input or authentication, request it clearly

Execute this step now.
"#;

/// 已加载的模板集合
#[derive(Debug, Clone)]
pub struct PromptSet {
    planning: String,
    execution: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            planning: DEFAULT_PLANNING_TEMPLATE.to_string(),
            execution: DEFAULT_EXECUTION_TEMPLATE.to_string(),
        }
    }
}

impl PromptSet {
    /// 从 config/prompts 目录加载，缺失的模板用内置默认值
    pub fn load() -> Self {
        let planning = read_first(&["config/prompts/planning.txt", "../config/prompts/planning.txt"])
            .unwrap_or_else(|| DEFAULT_PLANNING_TEMPLATE.to_string());
        let execution =
            read_first(&["config/prompts/execution.txt", "../config/prompts/execution.txt"])
                .unwrap_or_else(|| DEFAULT_EXECUTION_TEMPLATE.to_string());
        Self {
            planning,
            execution,
        }
    }

    pub fn planning_prompt(&self, task: &str, tools: &str) -> String {
        fill_template(&self.planning, &[("task", task), ("tools", tools)])
    }

    /// tool_schemas 为各工具参数 schema 的 JSON，随调用格式一起嵌入
    pub fn execution_prompt(
        &self,
        task_step: &str,
        context: &str,
        tools: &str,
        tool_schemas: &str,
    ) -> String {
        let call_format = call_format_section(tool_schemas);
        fill_template(
            &self.execution,
            &[
                ("task_step", task_step),
                ("context", context),
                ("tools", tools),
                ("call_format", &call_format),
            ],
        )
    }
}

/// 单遍替换 `{name}` 占位符，未知的花括号原样保留
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values
            .iter()
            .find(|(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn read_first(paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .filter(|s| !s.trim().is_empty())
}

fn call_format_section(tool_schemas: &str) -> String {
    format!(
        "To call a tool, emit a fenced block tagged tool_call containing one JSON object (or an array of objects) matching this schema:\n{}\nThe args object must match the parameters of the chosen tool:\n{}\nExample:\n```tool_call\n{{\"tool\": \"file_manager\", \"args\": {{\"action\": \"read\", \"path\": \"notes.txt\"}}}}\n```",
        tool_call_schema_json(),
        tool_schemas
    )
}

/// 步骤描述 + 子任务列表，作为 {task_step}
pub fn render_task_step(description: &str, subtasks: &[String]) -> String {
    let list = subtasks
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{description}\n\nSubtasks:\n{list}")
}
