//! 写作风格画像：取用户最近的邮件正文，交给 LLM 归纳风格

use std::sync::Arc;

use crate::config::StyleSection;
use crate::llm::LlmClient;
use crate::mail::MailStore;

pub const DEFAULT_STYLE_PROFILE: &str = "Neutral, professional, concise writing style.";

pub struct StyleProfiler {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn MailStore>,
    sample_limit: usize,
    combine_limit: usize,
}

impl StyleProfiler {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn MailStore>, cfg: &StyleSection) -> Self {
        Self {
            llm,
            store,
            sample_limit: cfg.sample_limit,
            combine_limit: cfg.combine_limit,
        }
    }

    /// 用户最近邮件正文（date 倒序，空正文跳过）
    pub async fn writing_samples(&self, user_id: &str) -> Result<Vec<String>, String> {
        let emails = self
            .store
            .recent_emails(user_id, self.sample_limit)
            .await
            .map_err(|e| e.to_string())?;
        Ok(emails
            .into_iter()
            .filter_map(|e| e.body.filter(|b| !b.trim().is_empty()))
            .collect())
    }

    /// 构建风格画像；没有样本时返回默认画像
    pub async fn build_profile(&self, user_id: &str) -> Result<String, String> {
        let samples = self.writing_samples(user_id).await?;
        if samples.is_empty() {
            return Ok(DEFAULT_STYLE_PROFILE.to_string());
        }
        let combined = samples
            .iter()
            .take(self.combine_limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Analyze the writing style of the following emails written by one person. \
            Describe tone, formality, typical greeting and sign-off, and sentence length \
            in two or three sentences.\n\n{combined}"
        );
        let profile = self.llm.complete_prompt(&prompt).await?;
        let profile = profile.trim();
        if profile.is_empty() {
            Ok(DEFAULT_STYLE_PROFILE.to_string())
        } else {
            Ok(profile.to_string())
        }
    }
}
