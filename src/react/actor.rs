//! Actor：Acting 阶段
//!
//! 逐个执行计划中的动作：先按 ActionRouter 解析工具，再交给 ToolExecutor 重试执行。
//! 整批要么全部成功，要么在第一个失败处中止（后续动作不执行，结果不落盘）。

use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::core::ToolError;
use crate::react::{ActionResult, Plan, TaskContext};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 动作 -> 工具 路由
///
/// 顺序：计划指定且已注册的工具 → 路由表命中且已注册的工具 → 第一个注册的工具。
pub struct ActionRouter<'a> {
    table: &'a HashMap<String, String>,
}

impl<'a> ActionRouter<'a> {
    pub fn new(table: &'a HashMap<String, String>) -> Self {
        Self { table }
    }

    pub fn resolve(
        &self,
        action: &str,
        selected: Option<&str>,
        registry: &ToolRegistry,
    ) -> Result<String, ToolError> {
        if let Some(tool) = selected.filter(|t| registry.contains(t)) {
            return Ok(tool.to_string());
        }
        if let Some(tool) = self
            .table
            .get(&action.to_lowercase())
            .filter(|t| registry.contains(t))
        {
            return Ok(tool.clone());
        }
        registry
            .first_tool()
            .map(String::from)
            .ok_or_else(|| ToolError::NotFound(format!("no tool registered for action '{action}'")))
    }
}

/// Actor：持有每个动作的最大尝试次数
pub struct Actor {
    max_attempts: u32,
}

impl Actor {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// 按顺序执行计划中的全部动作；第一个失败即返回该错误
    pub async fn act(
        &self,
        executor: &ToolExecutor,
        router: &ActionRouter<'_>,
        plan: &Plan,
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ActionResult>, ToolError> {
        let mut results = Vec::with_capacity(plan.required_actions.len());

        for action in &plan.required_actions {
            let tool = router.resolve(action, plan.tool_selection.as_deref(), executor.registry())?;
            tracing::info!("Action '{}' -> tool '{}'", action, tool);

            let input = serde_json::json!({
                "action": action,
                "task": task,
                "context": context,
                "plan": plan.plan,
            });
            let outcome = executor
                .execute_with_retry(&tool, input, self.max_attempts, cancel)
                .await
                .map_err(|e| {
                    tracing::warn!("Action '{}' aborted the batch: {}", action, e);
                    e
                })?;

            results.push(ActionResult {
                action: action.clone(),
                tool_used: tool,
                output: outcome.output,
                success: true,
                attempts: outcome.attempts,
                timestamp: Utc::now(),
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::AgentSection;
    use crate::tools::{Tool, ToolInput, ToolOutput};

    struct NamedTool {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        async fn execute(&self, input: ToolInput) -> Result<ToolOutput, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("unreadable".to_string())
            } else {
                Ok(serde_json::json!({ "tool": self.name, "action": input["action"] }))
            }
        }
    }

    fn tool(name: &'static str, fail: bool) -> (NamedTool, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            NamedTool {
                name,
                fail,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn plan(actions: &[&str], selected: Option<&str>) -> Plan {
        Plan {
            analysis: "a".into(),
            required_actions: actions.iter().map(|s| s.to_string()).collect(),
            tool_selection: selected.map(String::from),
            plan: "p".into(),
            confidence: 0.8,
        }
    }

    fn executor(registry: ToolRegistry) -> ToolExecutor {
        ToolExecutor::new(registry, Duration::from_secs(1), Duration::from_millis(1))
    }

    #[test]
    fn test_router_resolution_order() {
        let table = AgentSection::default().action_tools;
        let router = ActionRouter::new(&table);

        let mut registry = ToolRegistry::new();
        registry.register_tool(tool("text_analysis", false).0);
        registry.register_tool(tool("cv_parser", false).0);
        registry.register_tool(tool("job_parser", false).0);

        // 计划指定的工具优先
        assert_eq!(router.resolve("parse", Some("job_parser"), &registry).unwrap(), "job_parser");
        // 指定的工具未注册时走路由表
        assert_eq!(router.resolve("Parse", Some("ghost"), &registry).unwrap(), "cv_parser");
        assert_eq!(router.resolve("compare", None, &registry).unwrap(), "job_parser");
        // 路由目标未注册 / 未知动作 -> 第一个注册的工具
        assert_eq!(router.resolve("search", None, &registry).unwrap(), "text_analysis");
        assert_eq!(router.resolve("dance", None, &registry).unwrap(), "text_analysis");
    }

    #[test]
    fn test_router_empty_registry() {
        let table = HashMap::new();
        let router = ActionRouter::new(&table);
        let err = router.resolve("analyze", None, &ToolRegistry::new()).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_act_runs_every_action_in_order() {
        let table = AgentSection::default().action_tools;
        let mut registry = ToolRegistry::new();
        registry.register_tool(tool("cv_parser", false).0);
        registry.register_tool(tool("job_parser", false).0);
        let executor = executor(registry);

        let results = Actor::new(3)
            .act(
                &executor,
                &ActionRouter::new(&table),
                &plan(&["parse", "match"], None),
                "task",
                &TaskContext::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_used, "cv_parser");
        assert_eq!(results[1].tool_used, "job_parser");
        assert!(results.iter().all(|r| r.success && r.attempts == 1));
        assert_eq!(results[1].output["action"], "match");
    }

    #[tokio::test]
    async fn test_first_failure_stops_batch() {
        let table = AgentSection::default().action_tools;
        let (bad, bad_calls) = tool("cv_parser", true);
        let (good, good_calls) = tool("job_parser", false);
        let mut registry = ToolRegistry::new();
        registry.register_tool(bad);
        registry.register_tool(good);
        let executor = executor(registry);

        let err = Actor::new(3)
            .act(
                &executor,
                &ActionRouter::new(&table),
                &plan(&["parse", "match"], None),
                "task",
                &TaskContext::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Exhausted { attempts: 3, .. }));
        assert_eq!(bad_calls.load(Ordering::SeqCst), 3);
        assert_eq!(good_calls.load(Ordering::SeqCst), 0);
    }
}
