//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；DeepSeek、OpenAI、自建代理均可。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::LlmError;
use crate::llm::LlmClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

const RATE_LIMIT_BACKOFF_MS: u64 = 1000;

/// 累计 token 计数；clone 后共享同一组计数器
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    counters: Arc<[AtomicU64; 2]>,
}

impl TokenUsage {
    pub fn record(&self, prompt: u64, completion: u64) {
        self.counters[0].fetch_add(prompt, Ordering::Relaxed);
        self.counters[1].fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn snapshot(&self) -> (u64, u64, u64) {
        let prompt = self.counters[0].load(Ordering::Relaxed);
        let completion = self.counters[1].load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容客户端：单条 user 消息（可选 system 前缀），取首条 choice 的 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: Option<String>,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    /// 显式 key 优先，其次 OPENAI_API_KEY；都没有时以占位 key 构造（请求会被端点拒绝）
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let key = match api_key {
            Some(k) => k.to_owned(),
            None => std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "sk-placeholder".into()),
        };
        let mut settings = OpenAIConfig::new().with_api_key(key);
        if let Some(url) = base_url {
            settings = settings.with_api_base(url);
        }
        OpenAiClient {
            client: Client::with_config(settings),
            model: model.to_owned(),
            system_prompt: None,
            usage: TokenUsage::default(),
        }
    }

    /// DeepSeek 预设：优先 DEEPSEEK_API_KEY，模型默认 deepseek-chat
    pub fn deepseek(model: Option<&str>) -> Self {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        Self::new(
            Some(DEEPSEEK_BASE_URL),
            model.unwrap_or(DEEPSEEK_CHAT),
            api_key.as_deref(),
        )
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn build_messages(&self, prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(|e| LlmError::Provider(e.to_string()))?,
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| LlmError::Provider(e.to_string()))?,
        ));
        Ok(messages)
    }
}

/// 端点返回 429 / rate limit 时归为 RateLimited，其余为 Provider
fn classify_error(err: OpenAIError) -> LlmError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("429") {
        LlmError::RateLimited {
            retry_after_ms: RATE_LIMIT_BACKOFF_MS,
        }
    } else {
        LlmError::Provider(message)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.snapshot()
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.build_messages(prompt)?)
            .build()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let reply = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_error)?;

        if let Some(counted) = reply.usage.as_ref() {
            self.usage
                .record(u64::from(counted.prompt_tokens), u64::from(counted.completion_tokens));
        }

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        Ok(text.unwrap_or_default())
    }
}
