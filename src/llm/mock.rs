//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 两种模式：按顺序回放预设回复（队列耗尽后重复 fallback），或由闭包根据完整 prompt 生成回复。
//! 每次调用的消息都会被记录，便于断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::Message;

type Responder = Arc<dyn Fn(&[Message]) -> Result<String, String> + Send + Sync>;

/// Mock 客户端：脚本化回复 + 调用记录
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    responder: Option<Responder>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(r#"{"thought": "Nothing else to do.", "final_answer": "Done."}"#.to_string()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次回放的回复
    pub fn with_script<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        {
            let mut q = mock.script.lock().unwrap_or_else(|e| e.into_inner());
            q.extend(responses.into_iter().map(|r| Ok(r.into())));
        }
        mock
    }

    /// 脚本耗尽后重复返回的回复
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Ok(response.into());
        self
    }

    /// 脚本耗尽后一律失败（模拟推理引擎故障）
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Err(message.into()),
            ..Self::default()
        }
    }

    /// 由闭包根据消息生成回复，优先于脚本
    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 所有调用的消息快照
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(responder) = &self.responder {
            return responder(messages);
        }
        let next = self.script.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockLlmClient::with_script(["one", "two"]).with_fallback("rest");
        assert_eq!(mock.complete_prompt("a").await.unwrap(), "one");
        assert_eq!(mock.complete_prompt("b").await.unwrap(), "two");
        assert_eq!(mock.complete_prompt("c").await.unwrap(), "rest");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockLlmClient::failing("boom");
        assert_eq!(mock.complete_prompt("x").await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_responder_sees_prompt() {
        let mock = MockLlmClient::with_responder(|msgs| {
            Ok(msgs.last().map(|m| m.content.to_uppercase()).unwrap_or_default())
        });
        assert_eq!(mock.complete_prompt("hi").await.unwrap(), "HI");
        assert_eq!(mock.calls()[0][0].content, "hi");
    }
}
