//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CVAGENT__*` 覆盖（双下划线表示嵌套，如 `CVAGENT__LLM__PROVIDER=openai`）。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub agent: AgentSection,
    pub adaptive: AdaptiveSection,
    pub manager: ManagerSection,
}

/// [app] 段：应用名、日志级别
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// RUST_LOG 未设置时使用
    pub log_level: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            log_level: "info".to_string(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 generate_text 的截止时间（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：单次尝试超时与线性退避基数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
    /// 第 i 次失败后等待 retry_base_delay_ms * i 毫秒
    pub retry_base_delay_ms: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            retry_base_delay_ms: 1000,
        }
    }
}

/// [agent] 段：新建 Agent 的初始运行配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_memory_size: usize,
    pub max_log_size: usize,
    pub max_reasoning_steps: usize,
    pub max_action_attempts: u32,
    pub learning_enabled: bool,
    pub reflection_enabled: bool,
    pub learning_threshold: f64,
    pub reflection_interval: usize,
    pub confidence_boost: f64,
    pub max_input_length: usize,
    pub initial_confidence: f64,
    /// [agent.action_tools]：动作名 -> 工具名
    pub action_tools: HashMap<String, String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_memory_size: 100,
            max_log_size: 500,
            max_reasoning_steps: 5,
            max_action_attempts: 3,
            learning_enabled: true,
            reflection_enabled: true,
            learning_threshold: 0.7,
            reflection_interval: 5,
            confidence_boost: 0.1,
            max_input_length: 15000,
            initial_confidence: 0.5,
            action_tools: default_action_tools(),
        }
    }
}

fn default_action_tools() -> HashMap<String, String> {
    [
        ("analyze", "cv_parser"),
        ("parse", "cv_parser"),
        ("extract", "cv_parser"),
        ("match", "job_parser"),
        ("compare", "job_parser"),
        ("evaluate", "text_analysis"),
        ("optimize", "text_analysis"),
        ("recommend", "text_analysis"),
        ("search", "web_search"),
        ("rewrite", "content_rewriter"),
    ]
    .into_iter()
    .map(|(action, tool)| (action.to_string(), tool.to_string()))
    .collect()
}

/// [adaptive] 段：自适应调整的上下界
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptiveSection {
    pub max_input_length_ceiling: usize,
    pub confidence_boost_ceiling: f64,
    pub reflection_interval_floor: usize,
    /// performance_score 超过该值时累加置信度
    pub performance_threshold: f64,
}

impl Default for AdaptiveSection {
    fn default() -> Self {
        Self {
            max_input_length_ceiling: 20000,
            confidence_boost_ceiling: 0.2,
            reflection_interval_floor: 3,
            performance_threshold: 0.8,
        }
    }
}

/// [manager] 段：Agent 数量上限与跨 Agent 历史容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    pub max_agents: usize,
    pub max_history_size: usize,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            max_agents: 10,
            max_history_size: 1000,
        }
    }
}

/// 默认配置文件的候选位置（不含扩展名），取第一个存在的
const DEFAULT_CANDIDATES: [&str; 3] = ["config/default", "../config/default", "default"];

/// 环境变量前缀：CVAGENT__AGENT__MAX_MEMORY_SIZE=50 覆盖 [agent] max_memory_size
const ENV_PREFIX: &str = "CVAGENT";

/// 合并三层来源后反序列化：默认文件 < 显式文件 < 环境变量；缺失的键取结构体默认值
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let base = DEFAULT_CANDIDATES
        .iter()
        .find(|stem| Path::new(&format!("{stem}.toml")).is_file());

    let mut sources = config::Config::builder();
    if let Some(stem) = base {
        sources = sources.add_source(config::File::with_name(stem).required(false));
    }
    if let Some(path) = config_path.filter(|p| p.is_file()) {
        sources = sources.add_source(config::File::from(path));
    }
    sources
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（调用方决定是否用新配置重建 Manager）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
