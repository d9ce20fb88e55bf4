//! Learner：Learning 阶段
//!
//! 任何失败（provider、超时、无 JSON 块、校验失败）都降级为 LearningRecord::Degraded，不会中断周期。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::llm::{generate_within, LlmClient};
use crate::react::parse::parse_reply;
use crate::react::prompts::{learning_prompt, truncate_chars};
use crate::react::{ActionResult, LearningRecord, LearningReport, Plan, TaskContext};

pub struct Learner {
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
}

impl Learner {
    pub fn new(llm: Arc<dyn LlmClient>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }

    pub async fn learn(
        &self,
        plan: &Plan,
        actions: &[ActionResult],
        task: &str,
        context: &TaskContext,
        max_input_length: usize,
        cancel: &CancellationToken,
    ) -> LearningRecord {
        let plan_json = serde_json::to_string(plan).unwrap_or_default();
        let actions_json = serde_json::to_string(actions).unwrap_or_default();
        let context_json = serde_json::to_string(context).unwrap_or_default();
        let prompt = learning_prompt(
            &truncate_chars(&plan_json, max_input_length),
            &truncate_chars(&actions_json, max_input_length),
            &truncate_chars(task, max_input_length),
            &truncate_chars(&context_json, max_input_length),
        );

        let raw = match generate_within(self.llm.as_ref(), &prompt, self.deadline, cancel).await {
            Ok(raw) => raw,
            Err(e) => return degraded(e.to_string()),
        };
        match parse_reply::<LearningReport>(&raw).and_then(LearningReport::validated) {
            Ok(report) => {
                tracing::info!(
                    success_rate = report.success_rate,
                    improvements = report.improvements.len(),
                    "learning recorded"
                );
                LearningRecord::Learned(report)
            }
            Err(e) => degraded(e.to_string()),
        }
    }
}

fn degraded(reason: String) -> LearningRecord {
    tracing::warn!("Learning degraded: {}", reason);
    LearningRecord::Degraded { reason }
}
