//! Agent：一次 run 走完 Reason → Act → Learn → Reflect 周期
//!
//! 状态机：Idle → Reasoning → Acting → (Learning) → (Reflecting) → Done，
//! Reasoning / Acting 失败进入 Error 并返回 AgentRunFailure；Learning / Reflection 只会降级。
//! run 需要 &mut self，同一 Agent 的周期天然串行；并发由 AgentManager 的每 Agent 互斥锁保证。
//! 所有日志都是有界 FIFO：memory 受 max_memory_size 约束，其余受 max_log_size 约束。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{
    AgentBuilder, AgentConfig, AgentPhase, AgentRunFailure, AgentStatus, CycleError,
    RecoveryEngine,
};
use crate::llm::LlmClient;
use crate::memory::{BoundedLog, MemoryEntry, MemoryOutcome};
use crate::react::{
    recent_performance, ActionBatch, ActionRouter, Actor, AdaptiveController, AgentEvent, ConfigAdjustment,
    Critic, CycleResult, EventSink, Learner, LearningRecord, LearningReport, Planner,
    ReasoningStep, ReflectionLogEntry, ReflectionRecord, TaskContext,
};
use crate::tools::{Tool, ToolExecutor, ToolRegistry};

/// Reasoning Prompt 中带入的近期经验条数
const LESSONS_IN_PROMPT: usize = 5;

/// history() 的查询条件：每个日志只取最近 limit 条（None 为全部）
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn last(n: usize) -> Self {
        Self { limit: Some(n) }
    }
}

/// Agent 的全部日志快照
#[derive(Debug, Clone, Serialize)]
pub struct AgentHistory {
    pub memory: Vec<MemoryEntry>,
    pub reasoning_chain: Vec<ReasoningStep>,
    pub action_history: Vec<ActionBatch>,
    pub learning_memory: Vec<LearningReport>,
    pub reflection_log: Vec<ReflectionLogEntry>,
    pub adjustments: Vec<ConfigAdjustment>,
}

pub struct Agent {
    name: String,
    description: String,
    capabilities: Vec<String>,

    planner: Planner,
    learner: Learner,
    critic: Critic,
    adaptive: AdaptiveController,
    recovery: RecoveryEngine,
    executor: ToolExecutor,

    config: AgentConfig,
    /// 当前阶段；订阅者无需持有 Agent 即可读取
    phase: watch::Sender<AgentPhase>,

    memory: BoundedLog<MemoryEntry>,
    reasoning_chain: BoundedLog<ReasoningStep>,
    action_history: BoundedLog<ActionBatch>,
    learning_memory: BoundedLog<LearningReport>,
    reflection_log: BoundedLog<ReflectionLogEntry>,
    adjustments: BoundedLog<ConfigAdjustment>,

    /// 单调递增，reset 后也不回退
    last_reasoning_index: u64,
    cycles_started: u64,
    cycles_completed: u64,
    cycles_failed: u64,

    cancel: CancellationToken,
    events: EventSink,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: Vec<String>,
        llm: Arc<dyn LlmClient>,
        app: &AppConfig,
        registry: ToolRegistry,
    ) -> Self {
        let config = AgentConfig::from(&app.agent);
        let deadline = Duration::from_secs(app.llm.timeouts.request.max(1));
        Self {
            name: name.into(),
            description: description.into(),
            capabilities,
            planner: Planner::new(llm.clone(), deadline),
            learner: Learner::new(llm.clone(), deadline),
            critic: Critic::new(llm, deadline),
            adaptive: AdaptiveController::new(app.adaptive.clone()),
            recovery: RecoveryEngine::new(),
            executor: ToolExecutor::from_config(registry, &app.tools),
            memory: BoundedLog::new(config.max_memory_size),
            reasoning_chain: BoundedLog::new(config.max_log_size),
            action_history: BoundedLog::new(config.max_log_size),
            learning_memory: BoundedLog::new(config.max_log_size),
            reflection_log: BoundedLog::new(config.max_log_size),
            adjustments: BoundedLog::new(config.max_log_size),
            config,
            phase: watch::channel(AgentPhase::Idle).0,
            last_reasoning_index: 0,
            cycles_started: 0,
            cycles_completed: 0,
            cycles_failed: 0,
            cancel: CancellationToken::new(),
            events: EventSink::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// 只读配置；修改只发生在 AdaptiveController 内
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn phase(&self) -> AgentPhase {
        *self.phase.borrow()
    }

    /// 阶段订阅：Agent 正在运行（被锁住）时，管理层据此读取阶段
    pub fn watch_phase(&self) -> watch::Receiver<AgentPhase> {
        self.phase.subscribe()
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// 注册工具（同名覆盖）
    pub fn register(&mut self, name: impl Into<String>, tool: impl Tool + 'static) {
        self.executor.registry_mut().register(name, tool);
    }

    pub fn set_events(&mut self, events: EventSink) {
        self.events = events;
    }

    /// 取消令牌：取消后进行中的 LLM 调用与工具尝试立即返回 Cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 将本 Agent 的取消令牌挂到上级令牌下（上级取消时本 Agent 一并取消）
    pub fn attach_to(&mut self, parent: &CancellationToken) {
        self.cancel = parent.child_token();
    }

    /// 执行一个完整周期
    pub async fn run(&mut self, task: &str, context: &TaskContext) -> Result<CycleResult, AgentRunFailure> {
        let started = Instant::now();
        self.cycles_started += 1;
        let cycle = self.cycles_started;
        tracing::info!(agent = %self.name, cycle, "cycle started");
        self.events.emit(AgentEvent::CycleStarted {
            agent: self.name.clone(),
            cycle,
        });

        // Reasoning
        self.set_phase(AgentPhase::Reasoning);
        let tools = self.executor.registry().tool_descriptions();
        let lessons = self.recent_lessons();
        let planned = self
            .planner
            .plan(task, context, &tools, &lessons, &self.config, &self.cancel)
            .await;
        let outcome = match planned {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(cycle, task, context, CycleError::Reasoning(e), started)),
        };
        self.last_reasoning_index += 1;
        let reasoning_index = self.last_reasoning_index;
        self.reasoning_chain.push(ReasoningStep {
            index: reasoning_index,
            task: task.to_string(),
            context: context.clone(),
            outcome: outcome.clone(),
            timestamp: Utc::now(),
        });
        let plan = outcome.plan();
        self.events.emit(AgentEvent::PlanReady {
            actions: plan.required_actions.clone(),
            confidence: plan.confidence,
            fallback: outcome.is_fallback(),
        });

        // Acting
        self.set_phase(AgentPhase::Acting);
        let acted = Actor::new(self.config.max_action_attempts)
            .act(
                &self.executor,
                &ActionRouter::new(&self.config.action_tools),
                plan,
                task,
                context,
                &self.cancel,
            )
            .await;
        let results = match acted {
            Ok(results) => results,
            Err(e) => return Err(self.fail(cycle, task, context, CycleError::Acting(e), started)),
        };
        for r in &results {
            self.events.emit(AgentEvent::ActionDone {
                action: r.action.clone(),
                tool: r.tool_used.clone(),
                attempts: r.attempts,
            });
        }
        let batch = ActionBatch {
            reasoning_index,
            results,
            timestamp: Utc::now(),
        };
        self.action_history.push(batch.clone());

        // Learning
        let learning = if self.config.learning_enabled {
            self.set_phase(AgentPhase::Learning);
            self.learner
                .learn(
                    outcome.plan(),
                    &batch.results,
                    task,
                    context,
                    self.config.max_input_length,
                    &self.cancel,
                )
                .await
        } else {
            LearningRecord::Disabled
        };
        if let LearningRecord::Learned(report) = &learning {
            self.learning_memory.push(report.clone());
        }

        // Reflection
        let reflection = if self.config.reflection_enabled {
            self.set_phase(AgentPhase::Reflecting);
            self.critic
                .reflect(
                    outcome.plan(),
                    &batch.results,
                    &learning,
                    self.config.max_input_length,
                    &self.cancel,
                )
                .await
        } else {
            ReflectionRecord::Disabled
        };
        if let ReflectionRecord::Assessed(report) = &reflection {
            self.reflection_log.push(ReflectionLogEntry::Cycle {
                cycle,
                report: report.clone(),
                timestamp: Utc::now(),
            });
        }

        self.cycles_completed += 1;
        let periodic = if self.config.reflection_enabled
            && self.cycles_completed % self.config.reflection_interval.max(1) as u64 == 0
        {
            let periodic = self
                .critic
                .periodic_review(cycle, &self.reflection_log, self.config.reflection_interval, &self.cancel)
                .await;
            if let Some(p) = &periodic {
                self.reflection_log.push(ReflectionLogEntry::Periodic(p.clone()));
            }
            periodic
        } else {
            None
        };

        self.memory.push(MemoryEntry::new(
            cycle,
            task,
            context,
            MemoryOutcome::Success {
                plan: outcome.plan().clone(),
                actions: batch.results.clone(),
                learning: learning.clone(),
                reflection: reflection.clone(),
            },
        ));

        let adjustments = self.adaptive.apply(&mut self.config, cycle, &learning, &reflection);
        for adj in &adjustments {
            self.adjustments.push(adj.clone());
            self.events.emit(AgentEvent::Adjusted {
                knob: format!("{:?}", adj.knob),
                before: adj.before,
                after: adj.after,
            });
        }

        self.set_phase(AgentPhase::Done);
        let duration_ms = started.elapsed().as_millis() as u64;
        self.events.emit(AgentEvent::CycleFinished {
            cycle,
            success: true,
            duration_ms,
        });
        tracing::info!(agent = %self.name, cycle, duration_ms, "cycle completed");

        Ok(CycleResult {
            agent: self.name.clone(),
            cycle,
            task: task.to_string(),
            plan: outcome,
            actions: batch,
            learning,
            reflection,
            periodic,
            adjustments,
            confidence: self.config.confidence,
            duration_ms,
        })
    }

    /// 致命失败：生成错误反思，写入 reflection_log 与失败记忆，返回 AgentRunFailure
    fn fail(
        &mut self,
        cycle: u64,
        task: &str,
        context: &TaskContext,
        error: CycleError,
        started: Instant,
    ) -> AgentRunFailure {
        let phase = error.phase();
        self.set_phase(AgentPhase::Error);
        tracing::error!(agent = %self.name, cycle, ?phase, "cycle failed: {}", error);

        let reflection = self.recovery.reflect(&error, task, context);
        self.reflection_log.push(ReflectionLogEntry::Error(reflection.clone()));
        self.memory.push(MemoryEntry::new(
            cycle,
            task,
            context,
            MemoryOutcome::Failure {
                phase,
                error: error.to_string(),
            },
        ));
        self.cycles_failed += 1;
        self.events.emit(AgentEvent::CycleFinished {
            cycle,
            success: false,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        AgentRunFailure {
            agent: self.name.clone(),
            task: task.to_string(),
            phase,
            error,
            reflection,
        }
    }

    fn set_phase(&mut self, phase: AgentPhase) {
        tracing::debug!(agent = %self.name, ?phase, "phase");
        self.phase.send_replace(phase);
        self.events.emit(AgentEvent::Phase { phase });
    }

    /// 最近学习记录中的经验（新的在后）
    fn recent_lessons(&self) -> Vec<String> {
        let mut lessons: Vec<String> = self
            .learning_memory
            .iter()
            .rev()
            .flat_map(|r| r.insights.iter().rev().cloned())
            .take(LESSONS_IN_PROMPT)
            .collect();
        lessons.reverse();
        lessons
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            name: self.name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            phase: self.phase(),
            tools: self.executor.registry().all_stats(),
            memory_size: self.memory.len(),
            reasoning_chain_len: self.reasoning_chain.len(),
            action_history_len: self.action_history.len(),
            learning_memory_len: self.learning_memory.len(),
            reflection_log_len: self.reflection_log.len(),
            cycles_completed: self.cycles_completed,
            cycles_failed: self.cycles_failed,
            config: self.config.clone(),
            recent_performance: recent_performance(&self.reflection_log),
        }
    }

    pub fn history(&self, query: &HistoryQuery) -> AgentHistory {
        AgentHistory {
            memory: self.memory.tail(query.limit),
            reasoning_chain: self.reasoning_chain.tail(query.limit),
            action_history: self.action_history.tail(query.limit),
            learning_memory: self.learning_memory.tail(query.limit),
            reflection_log: self.reflection_log.tail(query.limit),
            adjustments: self.adjustments.tail(query.limit),
        }
    }

    /// 按任务或输入摘要检索记忆（大小写不敏感，时间顺序）
    pub fn recall(&self, query: &str) -> Vec<MemoryEntry> {
        self.memory.iter().filter(|e| e.matches(query)).cloned().collect()
    }

    /// 清空记忆与全部日志，回到 Idle；工具与配置保留
    pub fn reset(&mut self) {
        self.memory.clear();
        self.reasoning_chain.clear();
        self.action_history.clear();
        self.learning_memory.clear();
        self.reflection_log.clear();
        self.adjustments.clear();
        self.cycles_started = 0;
        self.cycles_completed = 0;
        self.cycles_failed = 0;
        self.phase.send_replace(AgentPhase::Idle);
        tracing::info!(agent = %self.name, "agent reset");
    }

}
