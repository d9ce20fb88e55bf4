//! 端到端周期测试：脚本化 LLM + 假工具，覆盖成功 / 失败 / 兜底 / 有界记忆 / 并发

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use cvagent::config::{AppConfig, ManagerSection};
use cvagent::core::{AgentPhase, CycleError, HistoryFilter, ManagerError, ToolError};
use cvagent::llm::{MockLlmClient, ScriptedLlmClient};
use cvagent::memory::MemoryOutcome;
use cvagent::react::{LearningRecord, PromptKind, ReflectionRecord};
use cvagent::tools::{Tool, ToolInput, ToolOutput};
use cvagent::{Agent, AgentManager, HistoryQuery, TaskContext};

/// 前 fail_first 次失败，之后成功
struct FakeTool {
    name: &'static str,
    fail_first: u32,
    calls: Arc<AtomicU32>,
}

impl FakeTool {
    fn ok(name: &'static str) -> (Self, Arc<AtomicU32>) {
        Self::failing(name, 0)
    }

    fn failing(name: &'static str, fail_first: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                name,
                fail_first,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "fake tool"
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(format!("{} failure #{}", self.name, n + 1));
        }
        Ok(serde_json::json!({
            "tool": self.name,
            "action": input["action"],
            "task": input["task"],
        }))
    }
}

/// 两个 Agent 的工具必须同时进入才放行
struct RendezvousTool {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl Tool for RendezvousTool {
    fn name(&self) -> &str {
        "cv_parser"
    }

    fn description(&self) -> &str {
        "waits for a peer"
    }

    async fn execute(&self, _input: ToolInput) -> Result<ToolOutput, String> {
        self.barrier.wait().await;
        Ok(serde_json::json!("met"))
    }
}

fn fast_config() -> AppConfig {
    let mut app = AppConfig::default();
    app.tools.retry_base_delay_ms = 1;
    app.tools.tool_timeout_secs = 5;
    app.llm.timeouts.request = 5;
    app
}

fn scripted_llm(reasoning: &str) -> ScriptedLlmClient {
    ScriptedLlmClient::new()
        .reply(PromptKind::Reasoning, reasoning)
        .reply(
            PromptKind::Learning,
            r#"```json
{"insights":["cv parsed cleanly"],"improvements":["better parsing of dates"],"success_rate":0.9,"confidence_boost":0.05}
```"#,
        )
        .reply(
            PromptKind::Reflection,
            r#"{"performance_score":0.85,"strengths":["complete"],"weaknesses":[],"recommendations":["keep it up"],"overall_assessment":"good"}"#,
        )
        .reply(PromptKind::PeriodicReview, r#"{"strategic_recommendations":[]}"#)
}

const PARSE_AND_MATCH: &str = r#"Plan:
```json
{"analysis":"CV plus job description","required_actions":["parse","match"],"tool_selection":"","plan":"parse the CV then match it","confidence":0.85}
```"#;

#[tokio::test]
async fn test_cv_and_job_parser_happy_path() {
    let (cv, cv_calls) = FakeTool::ok("cv_parser");
    let (job, job_calls) = FakeTool::ok("job_parser");
    let llm = Arc::new(scripted_llm(PARSE_AND_MATCH));
    let mut agent = Agent::builder("cv")
        .config(fast_config())
        .llm(llm.clone())
        .tool("cv_parser", cv)
        .tool("job_parser", job)
        .build();

    let mut context = TaskContext::new();
    context.insert("job_description".into(), serde_json::json!("Senior Rust engineer"));
    let result = agent.run("Analyze CV for Alice", &context).await.unwrap();

    assert!(!result.plan.is_fallback());
    let tools: Vec<&str> = result.actions.results.iter().map(|r| r.tool_used.as_str()).collect();
    assert_eq!(tools, vec!["cv_parser", "job_parser"]);
    assert_eq!(result.actions.results[0].output["task"], "Analyze CV for Alice");
    assert_eq!(cv_calls.load(Ordering::SeqCst), 1);
    assert_eq!(job_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result.learning, LearningRecord::Learned(_)));
    assert!(matches!(result.reflection, ReflectionRecord::Assessed(_)));

    // "parsing" 指令放大输入上限，0.85 > 0.8 累加置信度
    assert_eq!(agent.config().max_input_length, 16500);
    assert!((agent.config().confidence - 0.6).abs() < 1e-9);
    assert_eq!(result.adjustments.len(), 2);

    let history = agent.history(&HistoryQuery::default());
    assert_eq!(history.memory.len(), 1);
    assert!(history.memory[0].is_success());
    assert_eq!(history.action_history.len(), 1);
    assert_eq!(llm.calls(PromptKind::Reasoning), 1);

    let status = agent.status();
    let cv_stats = status.tools.iter().find(|t| t.name == "cv_parser").unwrap();
    assert_eq!(cv_stats.calls, 1);
    assert!(cv_stats.last_used.is_some());
}

#[tokio::test]
async fn test_always_failing_cv_parser() {
    let (cv, cv_calls) = FakeTool::failing("cv_parser", u32::MAX);
    let (job, job_calls) = FakeTool::ok("job_parser");
    let mut agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(scripted_llm(PARSE_AND_MATCH)))
        .tool("cv_parser", cv)
        .tool("job_parser", job)
        .build();

    let failure = agent.run("Analyze CV", &TaskContext::new()).await.unwrap_err();

    assert_eq!(failure.phase, AgentPhase::Acting);
    match &failure.error {
        CycleError::Acting(ToolError::Exhausted { tool, attempts, last }) => {
            assert_eq!(tool, "cv_parser");
            assert_eq!(*attempts, 3);
            assert!(last.to_string().contains("failure #3"));
        }
        other => panic!("Expected exhausted acting error, got {other:?}"),
    }
    assert_eq!(cv_calls.load(Ordering::SeqCst), 3);
    assert_eq!(job_calls.load(Ordering::SeqCst), 0);
    assert!(!failure.reflection.suggestions.is_empty());

    let history = agent.history(&HistoryQuery::default());
    assert_eq!(history.memory.len(), 1);
    match &history.memory[0].outcome {
        MemoryOutcome::Failure { phase, .. } => assert_eq!(*phase, AgentPhase::Acting),
        other => panic!("Expected failure entry, got {other:?}"),
    }
    assert!(history.action_history.is_empty());
    assert_eq!(history.reasoning_chain.len(), 1);
}

#[tokio::test]
async fn test_flaky_tool_recovers_within_attempts() {
    let (cv, cv_calls) = FakeTool::failing("cv_parser", 2);
    let mut agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(MockLlmClient))
        .tool("cv_parser", cv)
        .build();

    let result = agent.run("Analyze CV", &TaskContext::new()).await.unwrap();
    assert_eq!(result.actions.results[0].attempts, 3);
    assert_eq!(cv_calls.load(Ordering::SeqCst), 3);

    let stats = agent.registry().stats("cv_parser").unwrap();
    assert_eq!(stats.calls, 3);
    assert_eq!(stats.errors, 2);
}

#[tokio::test]
async fn test_empty_registry_fails_with_not_found() {
    let mut agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(MockLlmClient))
        .build();

    let failure = agent.run("Analyze CV", &TaskContext::new()).await.unwrap_err();
    assert!(matches!(failure.error, CycleError::Acting(ToolError::NotFound(_))));
}

#[tokio::test]
async fn test_memory_is_bounded_fifo() {
    let mut app = fast_config();
    app.agent.max_memory_size = 3;
    app.agent.max_log_size = 2;
    let mut agent = Agent::builder("cv")
        .config(app)
        .llm(Arc::new(MockLlmClient))
        .tool("cv_parser", FakeTool::ok("cv_parser").0)
        .build();

    for i in 0..5 {
        agent.run(&format!("task-{i}"), &TaskContext::new()).await.unwrap();
        assert!(agent.status().memory_size <= 3);
    }

    let history = agent.history(&HistoryQuery::default());
    let tasks: Vec<&str> = history.memory.iter().map(|m| m.task.as_str()).collect();
    assert_eq!(tasks, vec!["task-2", "task-3", "task-4"]);
    assert_eq!(history.reasoning_chain.len(), 2);
    assert_eq!(history.reasoning_chain[1].index, 5);
    assert_eq!(history.action_history.len(), 2);
}

#[tokio::test]
async fn test_reflection_disabled() {
    let mut app = fast_config();
    app.agent.reflection_enabled = false;
    let llm = Arc::new(scripted_llm(PARSE_AND_MATCH));
    let mut agent = Agent::builder("cv")
        .config(app)
        .llm(llm.clone())
        .tool("cv_parser", FakeTool::ok("cv_parser").0)
        .tool("job_parser", FakeTool::ok("job_parser").0)
        .build();

    for _ in 0..5 {
        let result = agent.run("Analyze CV", &TaskContext::new()).await.unwrap();
        assert_eq!(result.reflection, ReflectionRecord::Disabled);
        assert!(result.periodic.is_none());
    }
    assert_eq!(agent.status().reflection_log_len, 0);
    assert_eq!(llm.calls(PromptKind::Reflection), 0);
    assert_eq!(llm.calls(PromptKind::PeriodicReview), 0);
}

#[tokio::test]
async fn test_unparseable_reasoning_falls_back() {
    let llm = ScriptedLlmClient::new()
        .reply(PromptKind::Reasoning, "I would start by reading the CV carefully.")
        .reply(PromptKind::Learning, "nothing structured")
        .reply(PromptKind::Reflection, "nothing structured");
    let (job, job_calls) = FakeTool::ok("job_parser");
    let (cv, cv_calls) = FakeTool::ok("cv_parser");
    let mut agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(llm))
        .tool("job_parser", job)
        .tool("cv_parser", cv)
        .build();

    let result = agent.run("Analyze CV", &TaskContext::new()).await.unwrap();

    assert!(result.plan.is_fallback());
    let plan = result.plan.plan();
    assert_eq!(plan.required_actions, vec!["analyze"]);
    assert_eq!(plan.tool_selection.as_deref(), Some("job_parser"));
    assert!(plan.confidence <= 0.7);
    // 兜底计划指定第一个注册的工具
    assert_eq!(job_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cv_calls.load(Ordering::SeqCst), 0);
    // 学习与反思降级，不影响周期
    assert!(matches!(result.learning, LearningRecord::Degraded { .. }));
    assert!(matches!(result.reflection, ReflectionRecord::Degraded { .. }));
    assert!(result.adjustments.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_on_one_agent_are_serialized() {
    const N: usize = 8;
    let manager = Arc::new(AgentManager::new(ManagerSection::default()));
    let agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(MockLlmClient))
        .tool("cv_parser", FakeTool::ok("cv_parser").0)
        .build();
    manager.register_agent(agent).await.unwrap();

    let runs = (0..N).map(|i| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run("cv", &format!("task-{i}"), TaskContext::new()).await })
    });
    let results = futures_util::future::join_all(runs).await;
    for r in results {
        r.unwrap().unwrap();
    }

    let handle = manager.agent("cv").await.unwrap();
    let agent = handle.lock().await;
    let history = agent.history(&HistoryQuery::default());
    assert_eq!(history.memory.len(), N);

    let ids: HashSet<_> = history.memory.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), N);

    let indices: Vec<u64> = history.reasoning_chain.iter().map(|s| s.index).collect();
    assert_eq!(indices.len(), N);
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
    drop(agent);

    let page = manager
        .history(&HistoryFilter {
            agent: Some("cv".into()),
            ..HistoryFilter::default()
        })
        .await;
    assert_eq!(page.total, N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_agents_run_in_parallel() {
    let manager = Arc::new(AgentManager::new(ManagerSection::default()));
    let barrier = Arc::new(Barrier::new(2));
    for name in ["left", "right"] {
        let mut app = fast_config();
        app.agent.max_action_attempts = 1;
        let agent = Agent::builder(name)
            .config(app)
            .llm(Arc::new(MockLlmClient))
            .tool(
                "cv_parser",
                RendezvousTool {
                    barrier: barrier.clone(),
                },
            )
            .build();
        manager.register_agent(agent).await.unwrap();
    }

    let left = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run("left", "task", TaskContext::new()).await })
    };
    let right = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run("right", "task", TaskContext::new()).await })
    };

    let both = tokio::time::timeout(Duration::from_secs(10), async {
        (left.await, right.await)
    })
    .await
    .expect("agents should not block each other");
    both.0.unwrap().unwrap();
    both.1.unwrap().unwrap();

    let stats = manager.performance_stats().await;
    assert_eq!(stats.successful_requests, 2);
}

#[tokio::test]
async fn test_manager_records_failures() {
    let manager = AgentManager::new(ManagerSection::default());
    let agent = Agent::builder("cv")
        .config(fast_config())
        .llm(Arc::new(MockLlmClient))
        .tool("cv_parser", FakeTool::failing("cv_parser", u32::MAX).0)
        .build();
    manager.register_agent(agent).await.unwrap();

    let err = manager.run("cv", "task", TaskContext::new()).await.unwrap_err();
    match err {
        ManagerError::Run(failure) => assert_eq!(failure.phase, AgentPhase::Acting),
        other => panic!("Expected run failure, got {other:?}"),
    }

    let failed = manager
        .history(&HistoryFilter {
            success: Some(false),
            ..HistoryFilter::default()
        })
        .await;
    assert_eq!(failed.total, 1);
    assert_eq!(failed.entries[0].failed_phase, Some(AgentPhase::Acting));
    assert_eq!(manager.performance_stats().await.failed_requests, 1);
}
