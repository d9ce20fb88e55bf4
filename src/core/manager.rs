//! AgentManager：多 Agent 注册、调度与跨 Agent 运行历史
//!
//! 每个 Agent 放在 Arc<Mutex<Agent>> 中：同一 Agent 的并发请求在其互斥锁上排队，不同 Agent 并行执行。
//! 运行历史是有界 FIFO（max_history_size），与统计计数一起放在独立的锁后面。
//! 状态查询不等待运行锁：Agent 忙时返回上次快照，阶段取自 Agent 的阶段订阅。
//! 显式构造、显式 shutdown：shutdown 取消所有 Agent 的令牌，之后的请求返回 ManagerError::ShutDown。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::ManagerSection;
use crate::core::{AgentPhase, AgentStatus, ManagerError};
use crate::memory::BoundedLog;
use crate::react::{CycleResult, TaskContext};

/// 一次 run 的历史记录（成功或失败各一条）
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub agent: String,
    pub task: String,
    pub success: bool,
    pub cycle: Option<u64>,
    pub failed_phase: Option<AgentPhase>,
    pub error: Option<String>,
    pub processing_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// 历史过滤条件；limit 取匹配结果中最近的 limit 条
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub agent: Option<String>,
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub entries: Vec<RunRecord>,
    /// 过滤后（截断前）的条数
    pub total: usize,
}

/// 单个 Agent 的使用统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentUsage {
    pub name: String,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub average_processing_ms: f64,
    pub agents: Vec<AgentUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub agents: Vec<String>,
    pub max_agents: usize,
    pub history_size: usize,
    pub max_history_size: usize,
    pub total_requests: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub shut_down: bool,
}

/// 历史与计数（同一把锁内更新，保证一致）
struct Ledger {
    history: BoundedLog<RunRecord>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_processing_ms: u64,
    usage: HashMap<String, AgentUsage>,
}

impl Ledger {
    fn new(max_history_size: usize) -> Self {
        Self {
            history: BoundedLog::new(max_history_size),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            total_processing_ms: 0,
            usage: HashMap::new(),
        }
    }

    fn record(&mut self, record: RunRecord) {
        self.total_requests += 1;
        self.total_processing_ms += record.processing_ms;
        let usage = self
            .usage
            .entry(record.agent.clone())
            .or_insert_with(|| AgentUsage {
                name: record.agent.clone(),
                ..AgentUsage::default()
            });
        usage.requests += 1;
        usage.last_used = Some(record.timestamp);
        if record.success {
            self.successful_requests += 1;
            usage.successes += 1;
        } else {
            self.failed_requests += 1;
            usage.failures += 1;
        }
        self.history.push(record);
    }
}

/// 注册项：运行锁、最近一次状态快照与阶段订阅
#[derive(Clone)]
struct AgentSlot {
    handle: Arc<Mutex<Agent>>,
    snapshot: Arc<std::sync::Mutex<AgentStatus>>,
    phase: watch::Receiver<AgentPhase>,
}

impl AgentSlot {
    fn new(agent: Agent) -> Self {
        Self {
            phase: agent.watch_phase(),
            snapshot: Arc::new(std::sync::Mutex::new(agent.status())),
            handle: Arc::new(Mutex::new(agent)),
        }
    }

    fn refresh(&self, agent: &Agent) -> AgentStatus {
        let status = agent.status();
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = status.clone();
        status
    }

    /// 空闲时读最新状态并刷新快照；运行中返回快照，阶段为当前阶段
    fn status(&self) -> AgentStatus {
        match self.handle.try_lock() {
            Ok(agent) => self.refresh(&agent),
            Err(_) => {
                let mut status = self
                    .snapshot
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                status.phase = *self.phase.borrow();
                status
            }
        }
    }
}

pub struct AgentManager {
    config: ManagerSection,
    agents: RwLock<HashMap<String, AgentSlot>>,
    ledger: Mutex<Ledger>,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

impl AgentManager {
    pub fn new(config: ManagerSection) -> Self {
        let ledger = Ledger::new(config.max_history_size);
        Self {
            config,
            agents: RwLock::new(HashMap::new()),
            ledger: Mutex::new(ledger),
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    fn ensure_running(&self) -> Result<(), ManagerError> {
        if self.cancel.is_cancelled() {
            Err(ManagerError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// 注册 Agent；同名替换（不占新名额），新名字超过 max_agents 时拒绝
    pub async fn register_agent(&self, mut agent: Agent) -> Result<(), ManagerError> {
        self.ensure_running()?;
        let name = agent.name().to_string();
        let mut agents = self.agents.write().await;
        if !agents.contains_key(&name) && agents.len() >= self.config.max_agents {
            return Err(ManagerError::CapacityExceeded(self.config.max_agents));
        }
        agent.attach_to(&self.cancel);
        if agents.insert(name.clone(), AgentSlot::new(agent)).is_some() {
            tracing::info!("Agent replaced: {}", name);
        } else {
            tracing::info!("Agent registered: {}", name);
        }
        Ok(())
    }

    pub async fn remove_agent(&self, name: &str) -> Result<(), ManagerError> {
        self.agents
            .write()
            .await
            .remove(name)
            .map(|_| tracing::info!("Agent removed: {}", name))
            .ok_or_else(|| ManagerError::AgentNotFound(name.to_string()))
    }

    async fn slot(&self, name: &str) -> Result<AgentSlot, ManagerError> {
        self.agents
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::AgentNotFound(name.to_string()))
    }

    /// Agent 句柄（宿主可直接注册工具或读取历史）
    pub async fn agent(&self, name: &str) -> Result<Arc<Mutex<Agent>>, ManagerError> {
        Ok(self.slot(name).await?.handle)
    }

    /// 已注册的 Agent 名（排序）
    pub async fn list_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// 在指定 Agent 上执行一个周期；成功与失败都会写入运行历史
    pub async fn run(
        &self,
        name: &str,
        task: &str,
        context: TaskContext,
    ) -> Result<CycleResult, ManagerError> {
        self.ensure_running()?;
        let slot = self.slot(name).await?;
        let started = Instant::now();

        let result = {
            let mut agent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ManagerError::ShutDown),
                guard = slot.handle.lock() => guard,
            };
            let result = agent.run(task, &context).await;
            slot.refresh(&agent);
            result
        };

        let processing_ms = started.elapsed().as_millis() as u64;
        let record = match &result {
            Ok(cycle) => RunRecord {
                id: Uuid::new_v4(),
                agent: name.to_string(),
                task: task.to_string(),
                success: true,
                cycle: Some(cycle.cycle),
                failed_phase: None,
                error: None,
                processing_ms,
                timestamp: Utc::now(),
            },
            Err(failure) => RunRecord {
                id: Uuid::new_v4(),
                agent: name.to_string(),
                task: task.to_string(),
                success: false,
                cycle: None,
                failed_phase: Some(failure.phase),
                error: Some(failure.error.to_string()),
                processing_ms,
                timestamp: Utc::now(),
            },
        };
        self.ledger.lock().await.record(record);

        result.map_err(ManagerError::from)
    }

    /// 不等待进行中的周期
    pub async fn agent_status(&self, name: &str) -> Result<AgentStatus, ManagerError> {
        Ok(self.slot(name).await?.status())
    }

    pub async fn all_statuses(&self) -> Vec<AgentStatus> {
        let agents = self.agents.read().await;
        let mut names: Vec<&String> = agents.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| agents.get(n))
            .map(AgentSlot::status)
            .collect()
    }

    pub async fn system_status(&self) -> SystemStatus {
        let agents = self.list_agents().await;
        let ledger = self.ledger.lock().await;
        let now = Utc::now();
        SystemStatus {
            agents,
            max_agents: self.config.max_agents,
            history_size: ledger.history.len(),
            max_history_size: ledger.history.capacity(),
            total_requests: ledger.total_requests,
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds(),
            shut_down: self.cancel.is_cancelled(),
        }
    }

    pub async fn history(&self, filter: &HistoryFilter) -> HistoryPage {
        let ledger = self.ledger.lock().await;
        let matching: Vec<&RunRecord> = ledger
            .history
            .iter()
            .filter(|r| filter.agent.as_deref().map_or(true, |a| r.agent == a))
            .filter(|r| filter.success.map_or(true, |s| r.success == s))
            .collect();
        let total = matching.len();
        let skip = filter.limit.map_or(0, |n| total.saturating_sub(n));
        HistoryPage {
            entries: matching.into_iter().skip(skip).cloned().collect(),
            total,
        }
    }

    pub async fn performance_stats(&self) -> PerformanceStats {
        let ledger = self.ledger.lock().await;
        let total = ledger.total_requests;
        let mut agents: Vec<AgentUsage> = ledger.usage.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        PerformanceStats {
            total_requests: total,
            successful_requests: ledger.successful_requests,
            failed_requests: ledger.failed_requests,
            success_rate: if total == 0 {
                0.0
            } else {
                ledger.successful_requests as f64 / total as f64
            },
            average_processing_ms: if total == 0 {
                0.0
            } else {
                ledger.total_processing_ms as f64 / total as f64
            },
            agents,
        }
    }

    pub async fn reset_agent(&self, name: &str) -> Result<(), ManagerError> {
        let slot = self.slot(name).await?;
        let mut agent = slot.handle.lock().await;
        agent.reset();
        slot.refresh(&agent);
        Ok(())
    }

    pub async fn reset_all(&self) {
        let slots: Vec<AgentSlot> = self.agents.read().await.values().cloned().collect();
        for slot in slots {
            let mut agent = slot.handle.lock().await;
            agent.reset();
            slot.refresh(&agent);
        }
    }

    /// 清空运行历史与统计
    pub async fn clear_history(&self) {
        *self.ledger.lock().await = Ledger::new(self.config.max_history_size);
        tracing::info!("Manager history cleared");
    }

    /// 取消所有进行中的周期；之后 register_agent / run 返回 ShutDown
    pub fn shutdown(&self) {
        tracing::info!("Agent manager shutting down");
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
