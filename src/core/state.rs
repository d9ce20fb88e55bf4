//! 状态定义：运行阶段、可变运行配置（AgentConfig）与对外状态快照
//!
//! AgentConfig 只由 AdaptiveController 修改；调用方只能拿到只读引用或快照。

use std::collections::HashMap;

use serde::Serialize;

use crate::config::AgentSection;
use crate::react::RecentPerformance;
use crate::tools::ToolStats;

/// 单个周期的状态机阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Idle,
    Reasoning,
    Acting,
    Learning,
    Reflecting,
    Done,
    Error,
}

impl AgentPhase {
    /// 该阶段失败是否致命（Reasoning / Acting 致命，其余降级）
    pub fn is_fatal_on_failure(&self) -> bool {
        matches!(self, AgentPhase::Reasoning | AgentPhase::Acting)
    }
}

/// 运行期配置旋钮（每个 Agent 一份）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentConfig {
    /// memory 环形缓冲容量
    pub max_memory_size: usize,
    /// reasoning_chain / action_history / learning_memory / reflection_log 的容量
    pub max_log_size: usize,
    /// 单个 Plan 最多执行的动作数
    pub max_reasoning_steps: usize,
    /// 每个动作的最大尝试次数
    pub max_action_attempts: u32,
    pub learning_enabled: bool,
    pub reflection_enabled: bool,
    /// success_rate 达到该值才应用改进指令
    pub learning_threshold: f64,
    /// 每隔多少个完成周期做一次周期性反思
    pub reflection_interval: usize,
    pub confidence_boost: f64,
    /// Prompt 中任务 / 上下文的最大字符数
    pub max_input_length: usize,
    /// 累计置信度，始终在 [0, 1]
    pub confidence: f64,
    /// 动作名 -> 工具名 路由表
    pub action_tools: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSection::default())
    }
}

impl From<&AgentSection> for AgentConfig {
    fn from(section: &AgentSection) -> Self {
        Self {
            max_memory_size: section.max_memory_size.max(1),
            max_log_size: section.max_log_size.max(1),
            max_reasoning_steps: section.max_reasoning_steps.max(1),
            max_action_attempts: section.max_action_attempts.max(1),
            learning_enabled: section.learning_enabled,
            reflection_enabled: section.reflection_enabled,
            learning_threshold: section.learning_threshold.clamp(0.0, 1.0),
            reflection_interval: section.reflection_interval.max(1),
            confidence_boost: section.confidence_boost.max(0.0),
            max_input_length: section.max_input_length.max(1),
            confidence: section.initial_confidence.clamp(0.0, 1.0),
            action_tools: section.action_tools.clone(),
        }
    }
}

/// Agent 对外状态快照（供 HTTP / CLI 渲染）
#[derive(Clone, Debug, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub phase: AgentPhase,
    pub tools: Vec<ToolStats>,
    pub memory_size: usize,
    pub reasoning_chain_len: usize,
    pub action_history_len: usize,
    pub learning_memory_len: usize,
    pub reflection_log_len: usize,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub config: AgentConfig,
    pub recent_performance: RecentPerformance,
}

impl AgentStatus {
    pub fn tools_count(&self) -> usize {
        self.tools.len()
    }

}
