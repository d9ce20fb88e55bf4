//! LLM 层：文本生成能力抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 脚本化）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage, DEEPSEEK_CHAT};
pub use traits::{generate_within, LlmClient};

/// 按配置与环境变量选择 LLM 后端；无 Key 或 provider=mock 时回退到 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM (provider=mock)");
            Arc::new(MockLlmClient)
        }
        "deepseek" if has_deepseek_key || has_openai_key => {
            let model = cfg.model.as_deref().unwrap_or(DEEPSEEK_CHAT);
            tracing::info!("Using DeepSeek LLM ({})", model);
            Arc::new(OpenAiClient::deepseek(Some(model)))
        }
        "openai" if has_openai_key => {
            let model = cfg.model.as_deref().unwrap_or("gpt-4o-mini");
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(cfg.base_url.as_deref(), model, None))
        }
        _ => {
            tracing::warn!("No API key set or provider unknown ({}), using Mock LLM", provider);
            Arc::new(MockLlmClient)
        }
    }
}
