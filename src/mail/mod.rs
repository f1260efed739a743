//! 邮件领域：邮件文档、Agent 任务、分类、写作风格与持久化协作方

pub mod classify;
pub mod compose;
pub mod sqlite;
pub mod store;
pub mod style;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use classify::{classify_email, Category};
pub use compose::{generate_reply, summarize_text, ReplyRequest, SummaryMode};
pub use sqlite::SqliteMailStore;
pub use store::{InMemoryMailStore, MailStore, StoreError};
pub use style::{StyleProfiler, DEFAULT_STYLE_PROFILE};

/// 邮箱中的一封邮件（按 {id, user_id} 寻址）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub user_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub snoozed_until: Option<NaiveDateTime>,
}

impl Email {
    /// 正文优先，其次 snippet
    pub fn text(&self) -> &str {
        self.body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .or(self.snippet.as_deref())
            .unwrap_or("")
    }
}

/// 单次 Agent 调用的输入，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub email_id: String,
    pub user_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// 上一次挂起后用户给出的回答
    #[serde(default)]
    pub user_input: Option<String>,
}

impl Task {
    pub fn from_email(email: &Email, user_id: &str) -> Self {
        let subject = if email.subject.trim().is_empty() {
            "No subject".to_string()
        } else {
            email.subject.clone()
        };
        let sender = if email.sender.trim().is_empty() {
            "Unknown sender".to_string()
        } else {
            email.sender.clone()
        };
        Self {
            email_id: email.id.clone(),
            user_id: user_id.to_string(),
            subject,
            sender,
            body: email.text().to_string(),
            user_input: None,
        }
    }

    pub fn with_user_input(mut self, answer: impl Into<String>) -> Self {
        self.user_input = Some(answer.into());
        self
    }

    pub fn context(&self) -> TaskContext {
        TaskContext {
            user_id: self.user_id.clone(),
            email_id: self.email_id.clone(),
            sender: self.sender.clone(),
        }
    }
}

/// 工具闭包绑定的任务上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub user_id: String,
    pub email_id: String,
    pub sender: String,
}

/// 从 "Name <addr@host>" 中取出地址；没有尖括号时返回去空白的原文
pub fn extract_address(sender: &str) -> String {
    let inner = sender
        .rfind('<')
        .and_then(|start| {
            let rest = &sender[start + 1..];
            rest.find('>').map(|end| rest[..end].trim())
        })
        .filter(|addr| !addr.is_empty());
    inner.unwrap_or_else(|| sender.trim()).to_string()
}

/// 粗略判断字符串是否像邮箱地址
pub fn looks_like_address(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
