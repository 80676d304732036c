//! 计划文本解析
//!
//! 逐行扫描（去空白、跳过空行）：以十进制数字开头且含 ". " 的行开启新步骤，
//! 以 `-` / `*` 开头的行是当前步骤的子任务，其余行忽略。没有任何步骤头时返回空计划。

use crate::plan::{Plan, Step};

/// 将模型返回的计划文本解析为 Plan；所有步骤初始为 pending
pub fn parse_plan(plan_text: &str) -> Plan {
    let mut steps = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in plan_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(description) = step_header(line) {
            if let Some((desc, subtasks)) = current.take() {
                steps.push(Step::new(desc, subtasks));
            }
            current = Some((description.to_string(), Vec::new()));
        } else if let Some(rest) = line.strip_prefix(|c: char| c == '-' || c == '*') {
            let subtask = rest.trim();
            match current.as_mut() {
                Some((_, subtasks)) if !subtask.is_empty() => subtasks.push(subtask.to_string()),
                Some(_) => {}
                None => tracing::debug!(line = %line, "sub-task before any step header ignored"),
            }
        } else if current.is_some() {
            tracing::debug!(line = %line, "unrecognized plan line ignored");
        }
    }

    if let Some((desc, subtasks)) = current {
        steps.push(Step::new(desc, subtasks));
    }

    Plan::new(steps)
}

/// 步骤头：首字符为十进制数字且包含 ". "，返回首个 ". " 之后的描述
fn step_header(line: &str) -> Option<&str> {
    if !line.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    line.split_once(". ").map(|(_, description)| description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::StepStatus;

    #[test]
    fn test_parse_two_steps_with_subtasks() {
        let plan = parse_plan("1. Step A\n- sub1\n- sub2\n2. Step B\n* sub3");
        assert_eq!(plan.len(), 2);

        let a = &plan.steps()[0];
        assert_eq!(a.description(), "Step A");
        assert_eq!(a.subtasks(), ["sub1", "sub2"]);
        assert_eq!(a.status(), StepStatus::Pending);

        let b = &plan.steps()[1];
        assert_eq!(b.description(), "Step B");
        assert_eq!(b.subtasks(), ["sub3"]);
        assert_eq!(b.status(), StepStatus::Pending);
    }

    #[test]
    fn test_no_numbered_line_yields_empty_plan() {
        let plan = parse_plan("Here is my plan:\n- do something\nThanks!");
        assert!(plan.is_empty());
        assert!(parse_plan("").is_empty());
    }

    #[test]
    fn test_indented_subtasks_and_blank_lines() {
        let text = "PLAN:\n\n1. Research the topic\n   - search the web\n   * read two articles\n\n2. Write notes\n";
        let plan = parse_plan(text);
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.steps()[0].subtasks(),
            ["search the web", "read two articles"]
        );
        assert!(plan.steps()[1].subtasks().is_empty());
    }

    #[test]
    fn test_continuation_lines_are_dropped() {
        let plan = parse_plan("1. Install deps\n   using the package manager\n- run install");
        assert_eq!(plan.steps()[0].description(), "Install deps");
        assert_eq!(plan.steps()[0].subtasks(), ["run install"]);
    }

    #[test]
    fn test_header_needs_digit_and_delimiter() {
        // "1.5 GB" 没有 ". " 分隔符；"Step 1. x" 不以数字开头
        let plan = parse_plan("1.5 GB of data\nStep 1. not a header\n10. Tenth step");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps()[0].description(), "Tenth step");
    }

    #[test]
    fn test_description_is_text_after_first_delimiter() {
        let plan = parse_plan("3. Visit example.com. Then report");
        assert_eq!(plan.steps()[0].description(), "Visit example.com. Then report");
    }

    #[test]
    fn test_empty_bullets_skipped() {
        let plan = parse_plan("1. Step\n-\n*   \n- real");
        assert_eq!(plan.steps()[0].subtasks(), ["real"]);
    }

    #[test]
    fn test_canonical_text_round_trip() {
        let original = parse_plan(
            "1. Gather requirements\n- talk to users\n* list constraints\n2. Draft design\n3. Review. Carefully\n- 2. numbered bullet\n",
        );
        let reparsed = parse_plan(&original.to_text());
        assert_eq!(reparsed, original);
    }
}
