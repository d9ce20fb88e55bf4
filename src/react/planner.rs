//! Planner：Reasoning 阶段
//!
//! 调用 LLM 得到计划文本；interpret_plan 从文本中提取 JSON 并严格校验为 Plan，
//! 失败时合成兜底计划（["analyze"]、第一个可用工具、原文作为分析）。
//! 生成调用本身失败（provider / 超时 / 取消）是致命的，不做兜底。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{AgentConfig, LlmError, ParseError};
use crate::llm::{generate_within, LlmClient};
use crate::react::parse::parse_reply;
use crate::react::prompts::{reasoning_prompt, truncate_chars};
use crate::react::{Plan, PlanOutcome, TaskContext};
use crate::tools::ToolSummary;

/// 未找到结构化块时兜底计划的置信度
pub const FALLBACK_CONFIDENCE_NO_BLOCK: f64 = 0.7;
/// 结构化块校验失败（或原文为空）时兜底计划的置信度
pub const FALLBACK_CONFIDENCE_INVALID: f64 = 0.5;

/// 解析 LLM 输出：合法则 Parsed，否则 Fallback
pub fn interpret_plan(raw: &str, tools: &[String]) -> PlanOutcome {
    match parse_reply::<Plan>(raw).and_then(Plan::validated) {
        Ok(plan) => PlanOutcome::Parsed(plan),
        Err(err) => fallback_plan(raw, tools, &err),
    }
}

/// 由原始文本合成兜底计划
pub fn fallback_plan(raw: &str, tools: &[String], err: &ParseError) -> PlanOutcome {
    let text = raw.trim();
    let confidence = match err {
        ParseError::NoStructuredBlock if !text.is_empty() => FALLBACK_CONFIDENCE_NO_BLOCK,
        _ => FALLBACK_CONFIDENCE_INVALID,
    };
    tracing::warn!("Reasoning reply not usable ({}), using fallback plan", err);
    PlanOutcome::Fallback {
        plan: Plan {
            analysis: text.to_string(),
            required_actions: vec!["analyze".to_string()],
            tool_selection: tools.first().cloned(),
            plan: text.to_string(),
            confidence,
        },
        reason: err.to_string(),
    }
}

/// 截断超出 max_steps 的动作
fn limit_steps(outcome: PlanOutcome, max_steps: usize) -> PlanOutcome {
    let max_steps = max_steps.max(1);
    match outcome {
        PlanOutcome::Parsed(mut plan) => {
            plan.required_actions.truncate(max_steps);
            PlanOutcome::Parsed(plan)
        }
        PlanOutcome::Fallback { mut plan, reason } => {
            plan.required_actions.truncate(max_steps);
            PlanOutcome::Fallback { plan, reason }
        }
    }
}

/// Planner：持有 LLM 与单次调用截止时间
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }

    /// 产出本周期的计划；任务与上下文按 max_input_length 截断后写入 Prompt
    pub async fn plan(
        &self,
        task: &str,
        context: &TaskContext,
        tools: &[ToolSummary],
        lessons: &[String],
        config: &AgentConfig,
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, LlmError> {
        let context_json = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());
        let prompt = reasoning_prompt(
            &truncate_chars(task, config.max_input_length),
            &truncate_chars(&context_json, config.max_input_length),
            tools,
            lessons,
        );
        tracing::debug!(prompt_chars = prompt.chars().count(), "reasoning prompt");

        let raw = generate_within(self.llm.as_ref(), &prompt, self.deadline, cancel).await?;
        let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let outcome = limit_steps(interpret_plan(&raw, &names), config.max_reasoning_steps);
        tracing::info!(
            actions = ?outcome.plan().required_actions,
            fallback = outcome.is_fallback(),
            "plan ready"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::react::PromptKind;

    fn tools() -> Vec<ToolSummary> {
        ["cv_parser", "job_parser"]
            .into_iter()
            .map(|name| ToolSummary {
                name: name.to_string(),
                description: format!("{name} tool"),
                parameters: Default::default(),
            })
            .collect()
    }

    async fn plan_with(llm: ScriptedLlmClient, config: &AgentConfig) -> Result<PlanOutcome, LlmError> {
        let planner = Planner::new(Arc::new(llm), Duration::from_secs(1));
        planner
            .plan(
                "analyze CV",
                &TaskContext::new(),
                &tools(),
                &[],
                config,
                &CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_parsed_plan() {
        let llm = ScriptedLlmClient::new().reply(
            PromptKind::Reasoning,
            r#"{"analysis":"cv","required_actions":["parse","match"],"tool_selection":"","plan":"p","confidence":0.9}"#,
        );
        let outcome = plan_with(llm, &AgentConfig::default()).await.unwrap();
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.plan().required_actions, vec!["parse", "match"]);
        assert_eq!(outcome.plan().tool_selection, None);
    }

    #[tokio::test]
    async fn test_fallback_without_block() {
        let llm = ScriptedLlmClient::new().reply(PromptKind::Reasoning, "I think we should parse it.");
        let outcome = plan_with(llm, &AgentConfig::default()).await.unwrap();
        assert!(outcome.is_fallback());
        let plan = outcome.plan();
        assert_eq!(plan.required_actions, vec!["analyze"]);
        assert_eq!(plan.tool_selection.as_deref(), Some("cv_parser"));
        assert_eq!(plan.confidence, FALLBACK_CONFIDENCE_NO_BLOCK);
        assert_eq!(plan.analysis, "I think we should parse it.");
    }

    #[tokio::test]
    async fn test_fallback_with_invalid_block() {
        let llm = ScriptedLlmClient::new().reply(
            PromptKind::Reasoning,
            r#"{"analysis":"x","required_actions":[],"confidence":0.9}"#,
        );
        let outcome = plan_with(llm, &AgentConfig::default()).await.unwrap();
        assert!(outcome.is_fallback());
        assert_eq!(outcome.plan().confidence, FALLBACK_CONFIDENCE_INVALID);
    }

    #[test]
    fn test_fallback_empty_text_and_no_tools() {
        let outcome = interpret_plan("   ", &[]);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.plan().confidence, FALLBACK_CONFIDENCE_INVALID);
        assert_eq!(outcome.plan().tool_selection, None);
    }

    #[tokio::test]
    async fn test_actions_truncated_to_max_steps() {
        let llm = ScriptedLlmClient::new().reply(
            PromptKind::Reasoning,
            r#"{"analysis":"a","required_actions":["parse","match","evaluate","rewrite"],"plan":"p","confidence":0.6}"#,
        );
        let config = AgentConfig {
            max_reasoning_steps: 2,
            ..AgentConfig::default()
        };
        let outcome = plan_with(llm, &config).await.unwrap();
        assert_eq!(outcome.plan().required_actions, vec!["parse", "match"]);
    }

    #[tokio::test]
    async fn test_provider_failure_is_fatal() {
        let llm = ScriptedLlmClient::new().fail(PromptKind::Reasoning, LlmError::Provider("down".into()));
        let err = plan_with(llm, &AgentConfig::default()).await.unwrap_err();
        assert_eq!(err, LlmError::Provider("down".into()));
    }

    #[tokio::test]
    async fn test_task_truncated_in_prompt() {
        let llm = Arc::new(ScriptedLlmClient::new().reply(PromptKind::Reasoning, "plain"));
        let planner = Planner::new(llm.clone(), Duration::from_secs(1));
        let config = AgentConfig {
            max_input_length: 5,
            ..AgentConfig::default()
        };
        let task = "0123456789-tail-marker";
        planner
            .plan(task, &TaskContext::new(), &tools(), &[], &config, &CancellationToken::new())
            .await
            .unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("01234..."));
        assert!(!prompt.contains("tail-marker"));
    }
}
