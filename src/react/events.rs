//! 周期过程事件：用于流式展示阶段切换、工具调用与结果
//!
//! Agent 持有可选的 mpsc Sender；未设置时不发送。接收端关闭不影响周期执行。

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::AgentPhase;

/// 单个过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 周期开始
    CycleStarted { agent: String, cycle: u64 },
    /// 阶段切换
    Phase { phase: AgentPhase },
    /// 计划就绪
    PlanReady {
        actions: Vec<String>,
        confidence: f64,
        fallback: bool,
    },
    /// 动作完成
    ActionDone {
        action: String,
        tool: String,
        attempts: u32,
    },
    /// 配置被调整
    Adjusted { knob: String, before: f64, after: f64 },
    /// 周期结束
    CycleFinished { cycle: u64, success: bool, duration_ms: u64 },
}

/// 可选事件发送端
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn is_attached(&self) -> bool {
        self.tx.is_some()
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_serialize() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        sink.emit(AgentEvent::Phase {
            phase: AgentPhase::Acting,
        });
        let event = rx.try_recv().unwrap();
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "phase");
        assert_eq!(v["phase"], "acting");
    }

    #[test]
    fn test_detached_sink_is_noop() {
        let sink = EventSink::default();
        assert!(!sink.is_attached());
        sink.emit(AgentEvent::CycleStarted {
            agent: "a".into(),
            cycle: 1,
        });
    }
}
