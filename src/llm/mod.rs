//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod embedding;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use embedding::{create_embedder_from_config, EmbeddingProvider, OpenAiEmbedder};
pub use gemini::{create_gemini_client, GEMINI_FLASH};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端；没有可用 Key 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    let has_openai = std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty());

    match provider.as_str() {
        "gemini" if gemini::gemini_api_key().is_some() => {
            let model = cfg.llm.model.clone().unwrap_or_else(|| GEMINI_FLASH.to_string());
            tracing::info!("Using Gemini LLM ({})", model);
            Arc::new(create_gemini_client(Some(&model)).with_request_timeout(timeout))
        }
        "openai" if has_openai => {
            let model = cfg.llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), &model, None)
                    .with_request_timeout(timeout),
            )
        }
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
