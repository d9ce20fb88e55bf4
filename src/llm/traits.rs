//! LLM 客户端抽象
//!
//! 编排核心只依赖一个窄能力：generate_text(prompt) -> String。
//! 所有调用都经由 generate_within 施加截止时间并响应取消。

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::LlmError;

/// 文本生成能力（OpenAI 兼容 / Mock / 脚本化测试替身）
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 在 deadline 内调用 generate_text；超时返回 LlmError::Timeout，取消返回 LlmError::Cancelled
pub async fn generate_within(
    llm: &dyn LlmClient,
    prompt: &str,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<String, LlmError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        res = tokio::time::timeout(deadline, llm.generate_text(prompt)) => {
            res.map_err(|_| LlmError::Timeout(deadline))?
        }
    }
}
