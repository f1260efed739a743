//! filter_email：邮件分类，观察结果为 `Category: <NAME>`

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::mail::classify_email;
use crate::tools::{Tool, ToolKind};

pub struct FilterTool {
    llm: Arc<dyn LlmClient>,
}

impl FilterTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for FilterTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FilterEmail
    }

    fn description(&self) -> &str {
        "Classify an email into IMPORTANT, WORK, PERSONAL, PROMOTIONS, SOCIAL, UPDATES or SPAM. Input: email_text"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let text = input.trim();
        if text.is_empty() {
            return Err("No email text provided for classification".to_string());
        }
        let category = classify_email(self.llm.as_ref(), text).await?;
        Ok(format!("Category: {category}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_urgent_text_is_important() {
        let tool = FilterTool::new(Arc::new(MockLlmClient::failing("unused")));
        let out = tool.execute("urgent: reset password immediately").await.unwrap();
        assert_eq!(out, "Category: IMPORTANT");
    }

    #[tokio::test]
    async fn test_llm_failure_is_tool_error() {
        let tool = FilterTool::new(Arc::new(MockLlmClient::failing("quota exceeded")));
        assert_eq!(tool.execute("see you at lunch").await, Err("quota exceeded".to_string()));
    }
}
