//! 各阶段 Prompt 构造
//!
//! 每个 Prompt 第一行是阶段标记（如 `## Stage: reasoning`），PromptKind::classify 据此识别，
//! Mock / 脚本化客户端按阶段回复。回复结构由 schemars 生成的 JSON Schema 约束。

use crate::react::parse::reply_schema;
use crate::react::{LearningReport, PeriodicReply, Plan, ReflectionReport};
use crate::tools::ToolSummary;

const REASONING_HEADER: &str = "## Stage: reasoning";
const LEARNING_HEADER: &str = "## Stage: learning";
const REFLECTION_HEADER: &str = "## Stage: reflection";
const PERIODIC_HEADER: &str = "## Stage: periodic-review";

/// Prompt 所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Reasoning,
    Learning,
    Reflection,
    PeriodicReview,
}

impl PromptKind {
    pub fn header(&self) -> &'static str {
        match self {
            PromptKind::Reasoning => REASONING_HEADER,
            PromptKind::Learning => LEARNING_HEADER,
            PromptKind::Reflection => REFLECTION_HEADER,
            PromptKind::PeriodicReview => PERIODIC_HEADER,
        }
    }

    /// 按第一行的阶段标记识别
    pub fn classify(prompt: &str) -> Option<Self> {
        let first = prompt.lines().next()?.trim();
        [
            PromptKind::Reasoning,
            PromptKind::Learning,
            PromptKind::Reflection,
            PromptKind::PeriodicReview,
        ]
        .into_iter()
        .find(|kind| first == kind.header())
    }
}

/// 按字符截断（不切断 UTF-8 字符）
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn reply_contract(schema: &str) -> String {
    format!(
        "Reply with a single JSON object inside a ```json code block that conforms to this JSON Schema:\n{schema}\n"
    )
}

/// 每个工具一行描述，有参数说明时追加一行 params
fn describe_tools(tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        return "(none)".to_string();
    }
    tools
        .iter()
        .map(|t| {
            if t.parameters.is_empty() {
                format!("- {}: {}", t.name, t.description)
            } else {
                let params = t
                    .parameters
                    .iter()
                    .map(|(k, v)| format!("{k} ({v})"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- {}: {}\n  params: {params}", t.name, t.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reasoning：任务 + 上下文 + 可用工具 + 近期经验 -> Plan
pub fn reasoning_prompt(
    task: &str,
    context: &str,
    tools: &[ToolSummary],
    lessons: &[String],
) -> String {
    let tools = describe_tools(tools);
    let lessons = if lessons.is_empty() {
        "(none yet)".to_string()
    } else {
        lessons
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{REASONING_HEADER}\n\
         Analyze the task and decide which actions to take.\n\n\
         Task:\n{task}\n\n\
         Context (JSON):\n{context}\n\n\
         Available tools:\n{tools}\n\n\
         Lessons from previous cycles:\n{lessons}\n\n\
         Use short verbs for actions (analyze, parse, extract, match, compare, evaluate, optimize, recommend, search, rewrite). \
         Leave tool_selection empty unless one specific tool must be used.\n\n\
         {}",
        reply_contract(&reply_schema::<Plan>())
    )
}

/// Learning：计划 + 动作结果 -> 经验与改进指令
pub fn learning_prompt(plan_json: &str, actions_json: &str, task: &str, context: &str) -> String {
    format!(
        "{LEARNING_HEADER}\n\
         Review what happened in this cycle and extract lessons.\n\n\
         Task:\n{task}\n\n\
         Context (JSON):\n{context}\n\n\
         Plan:\n{plan_json}\n\n\
         Action results:\n{actions_json}\n\n\
         improvements may contain directives mentioning \"parsing\", \"confidence\" or \"reflection\".\n\n\
         {}",
        reply_contract(&reply_schema::<LearningReport>())
    )
}

/// Reflection：计划 + 动作结果 + 学习结果 -> 表现评估
pub fn reflection_prompt(plan_json: &str, actions_json: &str, learning_json: &str) -> String {
    format!(
        "{REFLECTION_HEADER}\n\
         Assess how well this cycle went.\n\n\
         Plan:\n{plan_json}\n\n\
         Action results:\n{actions_json}\n\n\
         Learning:\n{learning_json}\n\n\
         {}",
        reply_contract(&reply_schema::<ReflectionReport>())
    )
}

/// 周期性反思：最近若干次评估的分数与趋势 -> 战略建议
pub fn periodic_prompt(scores: &[f64], trend: &str, recommendations: &[String]) -> String {
    let scores = scores
        .iter()
        .map(|s| format!("{s:.2}"))
        .collect::<Vec<_>>()
        .join(", ");
    let recommendations = if recommendations.is_empty() {
        "(none)".to_string()
    } else {
        recommendations.join("; ")
    };
    format!(
        "{PERIODIC_HEADER}\n\
         Review the recent performance window and give strategic recommendations.\n\n\
         Scores (oldest first): {scores}\n\
         Trend: {trend}\n\
         Recommendations so far: {recommendations}\n\n\
         {}",
        reply_contract(&reply_schema::<PeriodicReply>())
    )
}
