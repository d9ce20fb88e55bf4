//! 记忆条目：每个完成或失败的周期对应一条

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::AgentPhase;
use crate::react::prompts::truncate_chars;
use crate::react::{ActionResult, LearningRecord, Plan, ReflectionRecord, TaskContext};

/// 输入摘要的最大字符数
const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MemoryOutcome {
    Success {
        plan: Plan,
        actions: Vec<ActionResult>,
        learning: LearningRecord,
        reflection: ReflectionRecord,
    },
    Failure {
        phase: AgentPhase,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub task: String,
    pub input_summary: String,
    pub outcome: MemoryOutcome,
}

impl MemoryEntry {
    pub fn new(cycle: u64, task: &str, context: &TaskContext, outcome: MemoryOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle,
            timestamp: Utc::now(),
            task: task.to_string(),
            input_summary: summarize_input(task, context),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MemoryOutcome::Success { .. })
    }

    /// 任务或输入摘要包含 query（大小写不敏感）
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.task.to_lowercase().contains(&query)
            || self.input_summary.to_lowercase().contains(&query)
    }
}

/// 任务 + 上下文键名的简短摘要
pub fn summarize_input(task: &str, context: &TaskContext) -> String {
    let task = truncate_chars(task.trim(), SUMMARY_CHARS);
    if context.is_empty() {
        task
    } else {
        let keys: Vec<&str> = context.keys().map(String::as_str).collect();
        format!("{} [context: {}]", task, keys.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_matches() {
        let mut context = TaskContext::new();
        context.insert("job_description".into(), serde_json::json!("Rust engineer"));
        let entry = MemoryEntry::new(
            1,
            "Analyze CV for Alice",
            &context,
            MemoryOutcome::Failure {
                phase: AgentPhase::Acting,
                error: "boom".into(),
            },
        );
        assert_eq!(entry.input_summary, "Analyze CV for Alice [context: job_description]");
        assert!(entry.matches("alice"));
        assert!(entry.matches("JOB_DESC"));
        assert!(!entry.matches("bob"));
        assert!(!entry.is_success());
    }

    #[test]
    fn test_ids_unique() {
        let ctx = TaskContext::new();
        let outcome = || MemoryOutcome::Failure {
            phase: AgentPhase::Reasoning,
            error: "x".into(),
        };
        let a = MemoryEntry::new(1, "t", &ctx, outcome());
        let b = MemoryEntry::new(2, "t", &ctx, outcome());
        assert_ne!(a.id, b.id);
    }
}
