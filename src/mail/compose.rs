//! 摘要与回复起草的 prompt 组装（纯文本变换，副作用只有 LLM 调用）

use std::fmt;
use std::str::FromStr;

use crate::llm::LlmClient;
use crate::memory::RetrievedChunk;

/// 摘要长度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryMode {
    #[default]
    Short,
    Long,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMode::Short => "short",
            SummaryMode::Long => "long",
        }
    }
}

impl fmt::Display for SummaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(SummaryMode::Short),
            "long" => Ok(SummaryMode::Long),
            _ => Err(()),
        }
    }
}

pub async fn summarize_text(
    llm: &dyn LlmClient,
    text: &str,
    mode: SummaryMode,
) -> Result<String, String> {
    let prompt = format!(
        "You are an email assistant. Summarize the following email in {mode} form:\nEmail:\n{text}"
    );
    Ok(llm.complete_prompt(&prompt).await?.trim().to_string())
}

/// 起草回复所需的全部输入
#[derive(Debug, Clone, Default)]
pub struct ReplyRequest<'a> {
    pub style_profile: &'a str,
    pub recipient: &'a str,
    pub subject: &'a str,
    pub context: &'a str,
    pub reply_to: &'a str,
    pub related: &'a [RetrievedChunk],
}

fn reply_prompt(req: &ReplyRequest<'_>) -> String {
    let mut prompt = format!(
        "You are writing an email on behalf of the user.\n\
        The user's writing style: {}\n\n\
        Recipient: {}\nSubject: {}\nWhat the reply should say: {}\n",
        req.style_profile, req.recipient, req.subject, req.context
    );
    if !req.reply_to.trim().is_empty() {
        prompt.push_str(&format!("\nOriginal email being replied to:\n{}\n", req.reply_to.trim()));
    }
    if !req.related.is_empty() {
        prompt.push_str("\nRelevant excerpts from the user's mailbox:\n");
        for chunk in req.related {
            prompt.push_str(&format!(
                "- [{}] {}\n",
                chunk.metadata.subject,
                chunk.content.trim()
            ));
        }
    }
    prompt.push_str("\nWrite only the email body, matching the user's style.");
    prompt
}

pub async fn generate_reply(llm: &dyn LlmClient, req: &ReplyRequest<'_>) -> Result<String, String> {
    Ok(llm.complete_prompt(&reply_prompt(req)).await?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::memory::ChunkMetadata;

    #[test]
    fn test_summary_mode_parse() {
        assert_eq!("LONG".parse::<SummaryMode>(), Ok(SummaryMode::Long));
        assert!("medium".parse::<SummaryMode>().is_err());
    }

    #[tokio::test]
    async fn test_reply_prompt_includes_style_and_excerpts() {
        let llm = MockLlmClient::with_script(["  Hi Bob, sounds good.  "]);
        let related = vec![RetrievedChunk {
            content: "Budget approved last week".into(),
            score: 0.9,
            metadata: ChunkMetadata {
                subject: "Budget".into(),
                ..Default::default()
            },
        }];
        let req = ReplyRequest {
            style_profile: "Casual and brief",
            recipient: "bob@example.com",
            subject: "Re: Budget",
            context: "confirm the numbers",
            reply_to: "Can you confirm?",
            related: &related,
        };
        let draft = generate_reply(&llm, &req).await.unwrap();
        assert_eq!(draft, "Hi Bob, sounds good.");
        let prompt = &llm.calls()[0][0].content;
        assert!(prompt.contains("Casual and brief"));
        assert!(prompt.contains("Budget approved last week"));
        assert!(prompt.contains("Can you confirm?"));
    }
}
