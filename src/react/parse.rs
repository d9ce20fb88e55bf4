//! 结构化回复解析
//!
//! 从模型文本中提取 JSON 块（优先 ```json 代码块，否则取第一个 `{` 到最后一个 `}`），
//! 再严格反序列化为目标类型。失败返回 ParseError，由调用阶段决定兜底或降级。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::core::ParseError;

/// 提取嵌入的 JSON 块；找不到返回 None。空的代码块不算，继续按花括号查找
pub fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + "```json".len()..];
        let block = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim();
        if !block.is_empty() {
            return Some(block);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 提取并反序列化；字段缺失或类型不符为 Invalid
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let block = extract_json_block(text).ok_or(ParseError::NoStructuredBlock)?;
    serde_json::from_str(block).map_err(|e| ParseError::Invalid(e.to_string()))
}

/// 回复类型的 JSON Schema（嵌入 Prompt，告诉模型期望的结构）
pub fn reply_schema<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}
