//! 嵌入能力：`embed(text) -> vector`，供邮件向量索引使用

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::llm::gemini::{gemini_api_key, GEMINI_BASE_URL};
use crate::llm::openai::{endpoint_config, PLACEHOLDER_KEY};

/// 同步嵌入接口：检索发生在同步的上下文组装里
pub trait EmbeddingProvider: Send + Sync {
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// OpenAI 兼容 /embeddings 端点
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        Self {
            client: Client::with_config(endpoint_config(base_url, api_key)),
            model: model.to_string(),
        }
    }

    /// 空文本返回空向量（检索时视为无结果）
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| format!("embedding request failed: {e}"))?;
        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| "embedding response was empty".to_string())
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    /// 需要多线程 tokio 运行时；在单线程运行时或运行时之外调用返回错误
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String> {
        let handle = Handle::try_current().map_err(|e| e.to_string())?;
        if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
            return Err("embedding requires a multi-threaded runtime".to_string());
        }
        tokio::task::block_in_place(|| handle.block_on(self.embed(text)))
    }
}

/// provider=gemini 时用 GEMINI_API_KEY 与 Gemini 端点，否则用 OPENAI_API_KEY；没有 Key 返回 None
pub fn create_embedder_from_config(
    provider: &str,
    base_url: Option<&str>,
    model: &str,
) -> Option<Arc<dyn EmbeddingProvider>> {
    let (base_url, key) = if provider.eq_ignore_ascii_case("gemini") {
        (Some(GEMINI_BASE_URL), gemini_api_key())
    } else {
        let key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty() && k != PLACEHOLDER_KEY);
        (base_url, key)
    };
    match key {
        Some(key) => {
            tracing::info!(provider = %provider, model = %model, "embedding provider configured");
            Some(Arc::new(OpenAiEmbedder::new(base_url, model, &key)))
        }
        None => {
            tracing::debug!(provider = %provider, "embedding skipped: no API key");
            None
        }
    }
}
