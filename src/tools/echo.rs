//! Echo 工具（演示 / 测试用）

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolInput, ToolOutput};

/// Echo 工具：回显动作名与输入中的 text（无 text 时回显 task）
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the action and text back (for testing)."
    }

    fn parameter_schema(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("action".to_string(), "planned action name".to_string()),
            ("text".to_string(), "text to echo; defaults to the task".to_string()),
        ])
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, String> {
        let text = input
            .get("text")
            .or_else(|| input.get("task"))
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        let action = input.get("action").cloned().unwrap_or(Value::Null);
        Ok(serde_json::json!({ "action": action, "echo": text }))
    }
}
