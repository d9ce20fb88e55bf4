//! 错误类型
//!
//! 分层：工具层（ToolError）、LLM 层（LlmError）、解析层（ParseError，仅本地恢复），
//! 周期致命错误（CycleError）与对外暴露的 AgentRunFailure / ManagerError。
//! Learning / Reflection 的失败不在此列：它们被降级为记录，不会向上传播。

use std::time::Duration;

use thiserror::Error;

use crate::core::AgentPhase;
use crate::react::ErrorReflection;

/// 工具注册表 / 执行器错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool '{tool}' execution failed: {cause}")]
    Execution { tool: String, cause: String },

    #[error("Tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// 重试耗尽，携带最后一次失败原因
    #[error("Tool '{tool}' failed after {attempts} attempts: {last}")]
    Exhausted {
        tool: String,
        attempts: u32,
        last: Box<ToolError>,
    },

    #[error("Tool '{0}' cancelled")]
    Cancelled(String),
}

impl ToolError {
    /// 该错误是否值得重试（NotFound / Cancelled 重试无意义）
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Execution { .. } | ToolError::Timeout { .. })
    }
}

/// LLM 调用错误（文本生成能力）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("LLM request cancelled")]
    Cancelled,
}

/// 结构化回复解析失败：可恢复，由各阶段本地处理（Fallback / Degraded）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no structured block in model output")]
    NoStructuredBlock,

    #[error("invalid structured block: {0}")]
    Invalid(String),
}

/// 周期内致命错误：仅来自 Reasoning 与 Acting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("reasoning failed: {0}")]
    Reasoning(#[source] LlmError),

    #[error("acting failed: {0}")]
    Acting(#[source] ToolError),
}

impl CycleError {
    pub fn phase(&self) -> AgentPhase {
        match self {
            CycleError::Reasoning(_) => AgentPhase::Reasoning,
            CycleError::Acting(_) => AgentPhase::Acting,
        }
    }
}

/// run() 的失败结果：包装致命错误与自动生成的错误反思
#[derive(Error, Debug, Clone)]
#[error("agent '{agent}' failed during {phase:?}: {error}")]
pub struct AgentRunFailure {
    pub agent: String,
    pub task: String,
    pub phase: AgentPhase,
    #[source]
    pub error: CycleError,
    pub reflection: ErrorReflection,
}

/// AgentManager 错误
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent capacity reached: {0}")]
    CapacityExceeded(usize),

    #[error("Agent manager has been shut down")]
    ShutDown,

    #[error(transparent)]
    Run(#[from] AgentRunFailure),
}
