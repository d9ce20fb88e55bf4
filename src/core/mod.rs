//! 核心编排层：错误与恢复、状态定义、Agent 构建器与多 Agent 管理

pub mod builder;
pub mod error;
pub mod manager;
pub mod recovery;
pub mod state;

pub use builder::AgentBuilder;
pub use error::{AgentRunFailure, CycleError, LlmError, ManagerError, ParseError, ToolError};
pub use manager::{
    AgentManager, AgentUsage, HistoryFilter, HistoryPage, PerformanceStats, RunRecord,
    SystemStatus,
};
pub use recovery::RecoveryEngine;
pub use state::{AgentConfig, AgentPhase, AgentStatus};
