//! 工具执行器
//!
//! 持有 ToolRegistry、单次尝试超时与退避基数。execute_with_retry 顺序尝试，
//! 第 i 次失败后等待 base_delay * i（线性退避），耗尽后返回 ToolError::Exhausted；
//! 每次尝试输出一条结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::ToolsSection;
use crate::core::ToolError;
use crate::tools::{ToolInput, ToolOutput, ToolRegistry};

/// 成功结果与实际尝试次数
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub output: ToolOutput,
    pub attempts: u32,
}

/// 工具执行器：对每次尝试施加超时，失败按线性退避重试
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    base_delay: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration, base_delay: Duration) -> Self {
        Self {
            registry,
            timeout,
            base_delay,
        }
    }

    pub fn from_config(registry: ToolRegistry, cfg: &ToolsSection) -> Self {
        Self::new(
            registry,
            Duration::from_secs(cfg.tool_timeout_secs.max(1)),
            Duration::from_millis(cfg.retry_base_delay_ms),
        )
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// 最多尝试 max_attempts 次；NotFound 不重试；取消会打断尝试与退避等待
    pub async fn execute_with_retry(
        &self,
        tool_name: &str,
        input: ToolInput,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, ToolError> {
        let max_attempts = max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=max_attempts {
            let result = self
                .attempt(tool_name, input.clone(), attempt, max_attempts, cancel)
                .await;

            match result {
                Ok(output) => return Ok(RetryOutcome { output, attempts: attempt }),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Tool attempt {}/{} failed ({}): {}",
                        attempt,
                        max_attempts,
                        tool_name,
                        e
                    );
                    last_err = Some(e);
                }
            }

            if attempt < max_attempts {
                let delay = self.base_delay * attempt;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ToolError::Cancelled(tool_name.to_string())),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let last = last_err.unwrap_or_else(|| ToolError::Execution {
            tool: tool_name.to_string(),
            cause: "no attempt made".to_string(),
        });
        Err(ToolError::Exhausted {
            tool: tool_name.to_string(),
            attempts: max_attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(
        &self,
        tool_name: &str,
        input: ToolInput,
        attempt: u32,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let input_preview = input_preview(&input);
        let result = self
            .registry
            .execute_within(tool_name, input, self.timeout, cancel)
            .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::Timeout { .. }) => "timeout",
            Err(ToolError::NotFound(_)) => "not_found",
            Err(ToolError::Cancelled(_)) => "cancelled",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "attempt": attempt,
            "max_attempts": max_attempts,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "input_preview": input_preview,
        });
        tracing::info!(audit = %audit, "tool");
        result
    }
}

fn input_preview(input: &serde_json::Value) -> String {
    let s = input.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
