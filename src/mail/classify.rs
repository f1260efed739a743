//! 邮件分类：高紧急度关键词规则优先（确定性），其余交给 LLM 并归一化为已知类别

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Important,
    Work,
    Personal,
    Promotions,
    Social,
    Updates,
    Spam,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Important,
        Category::Work,
        Category::Personal,
        Category::Promotions,
        Category::Social,
        Category::Updates,
        Category::Spam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Important => "IMPORTANT",
            Category::Work => "WORK",
            Category::Personal => "PERSONAL",
            Category::Promotions => "PROMOTIONS",
            Category::Social => "SOCIAL",
            Category::Updates => "UPDATES",
            Category::Spam => "SPAM",
        }
    }

    /// 在自由文本中找出第一个出现的类别名（LLM 常附带解释）
    pub fn find_in(text: &str) -> Option<Self> {
        let upper = text.to_uppercase();
        Self::ALL
            .iter()
            .filter_map(|c| upper.find(c.as_str()).map(|pos| (pos, *c)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, c)| c)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches(|c: char| !c.is_alphanumeric());
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// 命中即判为 IMPORTANT 的信号词
const URGENT_SIGNALS: &[&str] = &[
    "urgent",
    "immediately",
    "asap",
    "reset password",
    "password reset",
    "reset your password",
    "security alert",
    "suspicious sign-in",
    "account locked",
    "action required",
    "final notice",
    "deadline today",
];

/// 仅规则判断；未命中返回 None
pub fn urgent_by_rules(text: &str) -> Option<Category> {
    let lower = text.to_lowercase();
    URGENT_SIGNALS
        .iter()
        .any(|s| lower.contains(s))
        .then_some(Category::Important)
}

fn classification_prompt(text: &str) -> String {
    let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "You are an email assistant. Classify the following email into exactly one category \
        from this list: {}.\nReply with the category name only.\n\nEmail:\n{}",
        names.join(", "),
        text
    )
}

/// 分类邮件。规则命中时不调用 LLM；LLM 输出无法识别时归为 UPDATES
pub async fn classify_email(llm: &dyn LlmClient, text: &str) -> Result<Category, String> {
    if let Some(category) = urgent_by_rules(text) {
        tracing::debug!(category = %category, "classified by urgency rules");
        return Ok(category);
    }
    let raw = llm.complete_prompt(&classification_prompt(text)).await?;
    let category = raw
        .parse::<Category>()
        .ok()
        .or_else(|| Category::find_in(&raw))
        .unwrap_or_else(|| {
            tracing::warn!(raw = %raw, "unrecognized classification, defaulting to UPDATES");
            Category::Updates
        });
    Ok(category)
}
