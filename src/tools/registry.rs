//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameter_schema / execute），由 ToolRegistry 按名注册与查找。
//! 每个注册项带使用统计（调用次数、错误次数、最近使用时间），统计只在该工具自身执行时更新。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::ToolError;

pub type ToolInput = Value;
pub type ToolOutput = Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数说明、异步执行（输入输出均为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 默认注册名
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数名 -> 参数说明；默认无参数说明
    fn parameter_schema(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// 执行工具；Err 为失败原因，由注册表包装为 ToolError::Execution
    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, String>;
}

/// 单个工具的使用统计快照
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ToolStats {
    pub name: String,
    pub description: String,
    pub calls: u64,
    pub errors: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// 提供给 LLM 的工具说明
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
}

struct ToolEntry {
    tool: Arc<dyn Tool>,
    calls: AtomicU64,
    errors: AtomicU64,
    last_used: Mutex<Option<DateTime<Utc>>>,
}

impl ToolEntry {
    fn new(tool: Arc<dyn Tool>) -> Self {
        Self {
            tool,
            calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_used: Mutex::new(None),
        }
    }

    fn record_attempt(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self, name: &str) -> ToolStats {
        ToolStats {
            name: name.to_string(),
            description: self.tool.description().to_string(),
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_used: *self.last_used.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// 工具注册表：按名称存储工具，保留注册顺序（「第一个注册的工具」用作兜底）
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按给定名称注册；同名覆盖（后写者胜），保留原有顺序位置，统计清零
    pub fn register(&mut self, name: impl Into<String>, tool: impl Tool + 'static) {
        self.register_arc(name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        tracing::debug!("Tool registered: {}", name);
        self.tools.insert(name, ToolEntry::new(tool));
    }

    /// 以工具自身的 name() 注册
    pub fn register_tool(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.register(name, tool);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.tools.remove(name).is_some();
        if removed {
            self.order.retain(|n| n != name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| e.tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 工具名（注册顺序）
    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn first_tool(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// 工具名、描述与参数说明（注册顺序），写入 Reasoning Prompt 的可用工具段落
    pub fn tool_descriptions(&self) -> Vec<ToolSummary> {
        self.order
            .iter()
            .filter_map(|n| {
                self.tools.get(n).map(|e| ToolSummary {
                    name: n.clone(),
                    description: e.tool.description().to_string(),
                    parameters: e.tool.parameter_schema(),
                })
            })
            .collect()
    }

    pub fn stats(&self, name: &str) -> Option<ToolStats> {
        self.tools.get(name).map(|e| e.stats(name))
    }

    pub fn all_stats(&self) -> Vec<ToolStats> {
        self.order
            .iter()
            .filter_map(|n| self.stats(n))
            .collect()
    }

    /// 执行一次：记录调用；失败记录错误并包装为 ToolError::Execution
    pub async fn execute(&self, name: &str, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.record_attempt();
        entry.tool.execute(input).await.map_err(|cause| {
            entry.record_error();
            ToolError::Execution {
                tool: name.to_string(),
                cause,
            }
        })
    }

    /// 带截止时间与取消令牌执行一次：超时与取消都计为错误，分别返回 Timeout / Cancelled
    pub async fn execute_within(
        &self,
        name: &str,
        input: ToolInput,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.record_attempt();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ToolError::Cancelled(name.to_string())),
            res = tokio::time::timeout(deadline, entry.tool.execute(input)) => match res {
                Ok(Ok(out)) => Ok(out),
                Ok(Err(cause)) => Err(ToolError::Execution {
                    tool: name.to_string(),
                    cause,
                }),
                Err(_) => Err(ToolError::Timeout {
                    tool: name.to_string(),
                    timeout: deadline,
                }),
            },
        };
        if result.is_err() {
            entry.record_error();
        }
        result
    }
}
