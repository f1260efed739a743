//! summarize_email：`text` 或 `text|mode`（mode 为 short / long）

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::mail::{summarize_text, SummaryMode};
use crate::tools::{Tool, ToolKind};

pub struct SummarizeTool {
    llm: Arc<dyn LlmClient>,
}

impl SummarizeTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// 最后一个 `|` 之后是合法 mode 时才视为 mode，否则整段都是正文
fn split_mode(input: &str) -> (&str, SummaryMode) {
    match input.rsplit_once('|') {
        Some((text, mode)) => match mode.parse::<SummaryMode>() {
            Ok(mode) => (text.trim(), mode),
            Err(()) => (input.trim(), SummaryMode::Short),
        },
        None => (input.trim(), SummaryMode::Short),
    }
}

#[async_trait]
impl Tool for SummarizeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SummarizeEmail
    }

    fn description(&self) -> &str {
        "Summarize an email. Input: email_text (or email_text|mode where mode is 'short' or 'long')"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let (text, mode) = split_mode(input);
        if text.is_empty() {
            return Err("No text provided for summarization".to_string());
        }
        summarize_text(self.llm.as_ref(), text, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_split_mode() {
        assert_eq!(split_mode("body|long"), ("body", SummaryMode::Long));
        assert_eq!(split_mode("a|b|short"), ("a|b", SummaryMode::Short));
        assert_eq!(split_mode("cost is 5|10"), ("cost is 5|10", SummaryMode::Short));
        assert_eq!(split_mode("plain"), ("plain", SummaryMode::Short));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tool = SummarizeTool::new(Arc::new(MockLlmClient::new()));
        assert!(tool.execute(" |long").await.is_err());
    }

    #[tokio::test]
    async fn test_mode_reaches_prompt() {
        let llm = Arc::new(MockLlmClient::with_script(["A long summary."]));
        let tool = SummarizeTool::new(llm.clone());
        assert_eq!(tool.execute("Quarterly results|long").await.unwrap(), "A long summary.");
        assert!(llm.calls()[0][0].content.contains("in long form"));
    }
}
