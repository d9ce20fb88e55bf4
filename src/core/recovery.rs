//! 错误恢复引擎
//!
//! 周期致命失败时生成 ErrorReflection：记录错误、阶段与输入快照，并按错误类型给出补救建议，
//! 末尾附上通用建议（检查输入格式 / 确认工具存在 / 回看上下文）。

use chrono::Utc;

use crate::core::{CycleError, LlmError, ToolError};
use crate::react::{ErrorReflection, TaskContext};

const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Check the input format",
    "Verify that the required tools are registered",
    "Review the task context",
];

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn reflect(&self, err: &CycleError, task: &str, context: &TaskContext) -> ErrorReflection {
        let mut suggestions = self.suggestions(err);
        for generic in GENERIC_SUGGESTIONS {
            if !suggestions.iter().any(|s| s == generic) {
                suggestions.push(generic.to_string());
            }
        }
        ErrorReflection {
            error: err.to_string(),
            phase: err.phase(),
            task: task.to_string(),
            context: context.clone(),
            suggestions,
            timestamp: Utc::now(),
        }
    }

    /// 针对具体错误的建议
    pub fn suggestions(&self, err: &CycleError) -> Vec<String> {
        let specific = match err {
            CycleError::Reasoning(LlmError::Timeout(d)) => {
                format!("LLM did not answer within {d:?}; raise llm.timeouts.request or retry later")
            }
            CycleError::Reasoning(LlmError::RateLimited { retry_after_ms }) => {
                format!("LLM is rate limited; retry after {retry_after_ms}ms")
            }
            CycleError::Reasoning(LlmError::Cancelled) | CycleError::Acting(ToolError::Cancelled(_)) => {
                "The run was cancelled; resubmit the task if it is still needed".to_string()
            }
            CycleError::Reasoning(LlmError::Provider(_)) => {
                "Check the LLM provider configuration and API key".to_string()
            }
            CycleError::Acting(ToolError::NotFound(name)) => {
                format!("Register a tool for '{name}' or adjust the action routing table")
            }
            CycleError::Acting(ToolError::Timeout { tool, .. }) => {
                format!("Tool '{tool}' timed out; raise tools.tool_timeout_secs or shrink the input")
            }
            CycleError::Acting(ToolError::Exhausted { tool, attempts, .. }) => {
                format!("Tool '{tool}' failed {attempts} times; inspect its input and error output")
            }
            CycleError::Acting(ToolError::Execution { tool, .. }) => {
                format!("Tool '{tool}' failed; inspect its input and error output")
            }
        };
        vec![specific]
    }
}
