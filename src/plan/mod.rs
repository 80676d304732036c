//! 计划层：Plan / Step 模型、计划文本解析、工具调用意图提取、prompt 模板

pub mod intent;
pub mod parser;
pub mod prompts;
pub mod types;

pub use intent::{extract_structured, IntentExtractor};
pub use parser::parse_plan;
pub use prompts::{render_task_step, PromptSet};
pub use types::{Plan, Step, StepStatus};
