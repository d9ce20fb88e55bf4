//! Agent 构建器：统一的 Agent 初始化逻辑
//!
//! 宿主（CLI、HTTP 服务、测试）都通过它组装 Agent：配置、LLM、工具与可选事件流。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::Agent;
use crate::config::AppConfig;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::react::{AgentEvent, EventSink};
use crate::tools::{Tool, ToolRegistry};

pub struct AgentBuilder {
    name: String,
    description: String,
    capabilities: Vec<String>,
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    tools: ToolRegistry,
    events: EventSink,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
            config: AppConfig::default(),
            llm: None,
            tools: ToolRegistry::new(),
            events: EventSink::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// 使用完整应用配置（agent / tools / llm 超时 / adaptive 段）
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// 指定 LLM；未指定时按 config.llm 创建
    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 按给定名称注册工具
    pub fn tool(mut self, name: impl Into<String>, tool: impl Tool + 'static) -> Self {
        self.tools.register(name, tool);
        self
    }

    pub fn tool_arc(mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_arc(name, tool);
        self
    }

    /// 订阅过程事件
    pub fn events(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn build(self) -> Agent {
        let llm = self
            .llm
            .unwrap_or_else(|| create_llm_from_config(&self.config.llm));
        let mut agent = Agent::new(
            self.name,
            self.description,
            self.capabilities,
            llm,
            &self.config,
            self.tools,
        );
        agent.set_events(self.events);
        agent
    }
}
