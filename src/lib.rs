//! cvagent - 简历分析产品的智能体编排核心
//!
//! 模块划分：
//! - **agent**: Agent 与单次 Reason → Act → Learn → Reflect 周期
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、状态、恢复、构建器、多 Agent 管理
//! - **llm**: 文本生成能力抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 脚本化）
//! - **memory**: 有界 FIFO 日志与周期记忆条目
//! - **react**: Planner、Actor、Learner、Critic、自适应控制与过程事件
//! - **tools**: 工具 trait、注册表与带重试的执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{Agent, AgentHistory, HistoryQuery};
pub use crate::core::{AgentManager, AgentRunFailure, ManagerError};
pub use react::{CycleResult, TaskContext};
