//! Critic：Reflection 阶段与周期性反思
//!
//! - reflect：评估单个周期，失败降级为 ReflectionRecord::Degraded
//! - periodic_review：取最近 window 条周期评估，本地计算趋势与平均分，再向 LLM 要战略建议；
//!   LLM 失败时建议为空，不影响周期结果
//! - recent_performance：最近 5 条评估的平均分与趋势（状态快照用）

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::llm::{generate_within, LlmClient};
use crate::memory::BoundedLog;
use crate::react::parse::parse_reply;
use crate::react::prompts::{periodic_prompt, reflection_prompt, truncate_chars};
use crate::react::types::average;
use crate::react::{
    ActionResult, LearningRecord, PeriodicReflection, PeriodicReply, Plan, RecentPerformance,
    ReflectionLogEntry, ReflectionRecord, ReflectionReport, ReflectionTrend,
};

/// 状态快照中「近期表现」的窗口大小
pub const RECENT_PERFORMANCE_WINDOW: usize = 5;

/// 最近 n 条周期评估的分数（时间顺序）
pub fn recent_scores(log: &BoundedLog<ReflectionLogEntry>, n: usize) -> Vec<f64> {
    let mut scores: Vec<f64> = log.iter().rev().filter_map(|e| e.score()).take(n).collect();
    scores.reverse();
    scores
}

pub fn recent_performance(log: &BoundedLog<ReflectionLogEntry>) -> RecentPerformance {
    RecentPerformance::from_scores(recent_scores(log, RECENT_PERFORMANCE_WINDOW))
}

pub struct Critic {
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
}

impl Critic {
    pub fn new(llm: Arc<dyn LlmClient>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }

    pub async fn reflect(
        &self,
        plan: &Plan,
        actions: &[ActionResult],
        learning: &LearningRecord,
        max_input_length: usize,
        cancel: &CancellationToken,
    ) -> ReflectionRecord {
        let plan_json = serde_json::to_string(plan).unwrap_or_default();
        let actions_json = serde_json::to_string(actions).unwrap_or_default();
        let learning_json = serde_json::to_string(learning).unwrap_or_default();
        let prompt = reflection_prompt(
            &truncate_chars(&plan_json, max_input_length),
            &truncate_chars(&actions_json, max_input_length),
            &truncate_chars(&learning_json, max_input_length),
        );

        let raw = match generate_within(self.llm.as_ref(), &prompt, self.deadline, cancel).await {
            Ok(raw) => raw,
            Err(e) => return degraded(e.to_string()),
        };
        match parse_reply::<ReflectionReport>(&raw).and_then(ReflectionReport::validated) {
            Ok(report) => {
                tracing::info!(score = report.performance_score, "reflection recorded");
                ReflectionRecord::Assessed(report)
            }
            Err(e) => degraded(e.to_string()),
        }
    }

    /// 周期性反思；窗口内没有任何评估时返回 None
    pub async fn periodic_review(
        &self,
        cycle: u64,
        log: &BoundedLog<ReflectionLogEntry>,
        window: usize,
        cancel: &CancellationToken,
    ) -> Option<PeriodicReflection> {
        let window = window.max(1);
        let scores = recent_scores(log, window);
        if scores.is_empty() {
            return None;
        }
        let trend = ReflectionTrend::from_scores(&scores);
        let recommendations: Vec<String> = log
            .iter()
            .rev()
            .filter_map(|e| match e {
                ReflectionLogEntry::Cycle { report, .. } => Some(report),
                _ => None,
            })
            .take(window)
            .flat_map(|r| r.recommendations.iter().cloned())
            .collect();

        let trend_label = serde_json::to_value(trend)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        let prompt = periodic_prompt(&scores, &trend_label, &recommendations);
        let strategic_recommendations =
            match generate_within(self.llm.as_ref(), &prompt, self.deadline, cancel).await {
                Ok(raw) => match parse_reply::<PeriodicReply>(&raw) {
                    Ok(reply) => reply.strategic_recommendations,
                    Err(e) => {
                        tracing::warn!("Periodic review reply unusable: {}", e);
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!("Periodic review LLM call failed: {}", e);
                    Vec::new()
                }
            };

        tracing::info!(cycle, ?trend, window = scores.len(), "periodic reflection");
        Some(PeriodicReflection {
            cycle,
            window_size: scores.len(),
            average_score: average(&scores),
            scores,
            trend,
            strategic_recommendations,
            timestamp: Utc::now(),
        })
    }
}

fn degraded(reason: String) -> ReflectionRecord {
    tracing::warn!("Reflection degraded: {}", reason);
    ReflectionRecord::Degraded { reason }
}
