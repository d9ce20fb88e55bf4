//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! - MockLlmClient：按 Prompt 类型返回固定的合法 JSON 回复，可跑通完整周期
//! - ScriptedLlmClient：按 Prompt 类型排队预设回复，并记录收到的 Prompt，供测试断言

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::LlmError;
use crate::llm::LlmClient;
use crate::react::PromptKind;

/// Mock 客户端：各阶段返回固定结构化回复
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let reply = match PromptKind::classify(prompt) {
            Some(PromptKind::Reasoning) => serde_json::json!({
                "analysis": "Mock analysis of the task",
                "required_actions": ["analyze"],
                "tool_selection": "",
                "plan": "Run the default analysis tool once",
                "confidence": 0.8
            }),
            Some(PromptKind::Learning) => serde_json::json!({
                "insights": ["Mock insight: the selected tool produced output"],
                "improvements": [],
                "success_rate": 0.8,
                "confidence_boost": 0.0
            }),
            Some(PromptKind::Reflection) => serde_json::json!({
                "performance_score": 0.75,
                "strengths": ["Completed every planned action"],
                "weaknesses": [],
                "recommendations": [],
                "overall_assessment": "Mock assessment"
            }),
            Some(PromptKind::PeriodicReview) => serde_json::json!({
                "strategic_recommendations": ["Keep plans short"]
            }),
            None => return Ok(format!("Echo from Mock: {prompt}")),
        };
        Ok(reply.to_string())
    }
}

/// 脚本化客户端：每类 Prompt 一个回复队列；队列只剩一条时重复使用该条
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<HashMap<PromptKind, VecDeque<Result<String, LlmError>>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加某类 Prompt 的回复
    pub fn reply(self, kind: PromptKind, reply: impl Into<String>) -> Self {
        self.push(kind, Ok(reply.into()));
        self
    }

    /// 追加某类 Prompt 的失败回复（模拟 provider 故障）
    pub fn fail(self, kind: PromptKind, err: LlmError) -> Self {
        self.push(kind, Err(err));
        self
    }

    pub fn push(&self, kind: PromptKind, reply: Result<String, LlmError>) {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        replies.entry(kind).or_default().push_back(reply);
    }

    /// 收到的全部 Prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// 某类 Prompt 的调用次数
    pub fn calls(&self, kind: PromptKind) -> usize {
        self.prompts()
            .iter()
            .filter(|p| PromptKind::classify(p) == Some(kind))
            .count()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let Some(kind) = PromptKind::classify(prompt) else {
            return Err(LlmError::Provider("unrecognised prompt".to_string()));
        };
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        let queue = replies.entry(kind).or_default();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or_else(|| Err(LlmError::Provider(format!("no scripted reply for {kind:?}"))))
    }
}
