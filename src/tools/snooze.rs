//! snooze_email：输入天数（非负整数），snoozed_until = now + days，只作用于当前任务的邮件

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::core::Clock;
use crate::mail::{MailStore, TaskContext};
use crate::tools::{Tool, ToolKind};

/// 上限约 100 年，避免时间溢出
const MAX_DAYS: i64 = 36_500;

pub struct SnoozeTool {
    store: Arc<dyn MailStore>,
    clock: Arc<dyn Clock>,
    ctx: TaskContext,
}

impl SnoozeTool {
    pub fn new(store: Arc<dyn MailStore>, clock: Arc<dyn Clock>, ctx: TaskContext) -> Self {
        Self { store, clock, ctx }
    }
}

/// 接受 `days` 或 `email_id|days`；后者的 id 必须是当前任务的邮件
fn parse_input(input: &str, current_email: &str) -> Result<i64, String> {
    let days = match input.rsplit_once('|') {
        Some((id, days)) => {
            let id = id.trim().trim_matches(|c: char| c == '"' || c == '\'');
            if id != current_email {
                return Err(format!("Can only snooze the current email ({current_email}), not {id}"));
            }
            days.trim()
        }
        None => input.trim(),
    };
    let days: i64 = days
        .trim_matches(|c: char| c == '"' || c == '\'')
        .parse()
        .map_err(|_| "Days must be a valid integer".to_string())?;
    if days < 0 {
        return Err("Days cannot be negative".to_string());
    }
    if days > MAX_DAYS {
        return Err(format!("Days cannot exceed {MAX_DAYS}"));
    }
    Ok(days)
}

#[async_trait]
impl Tool for SnoozeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SnoozeEmail
    }

    fn description(&self) -> &str {
        "Snooze the current email for X days. Input: number_of_days (non-negative integer)"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let days = parse_input(input, &self.ctx.email_id)?;
        let email_id = self.ctx.email_id.as_str();
        let until = self.clock.now() + Duration::days(days);
        let matched = self
            .store
            .set_snoozed_until(email_id, until)
            .await
            .map_err(|e| e.to_string())?;
        if !matched {
            return Ok(format!("Warning: No email found with id {email_id}"));
        }
        Ok(format!(
            "Email {email_id} snoozed until {} UTC",
            until.format("%Y-%m-%d %H:%M:%S")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::mail::{Email, InMemoryMailStore};
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    async fn setup() -> (Arc<InMemoryMailStore>, SnoozeTool) {
        setup_for("e1").await
    }

    async fn setup_for(current_email: &str) -> (Arc<InMemoryMailStore>, SnoozeTool) {
        let store = Arc::new(InMemoryMailStore::new());
        store
            .upsert_email(Email {
                id: "e1".into(),
                thread_id: String::new(),
                user_id: "u1".into(),
                subject: "Hello".into(),
                sender: String::new(),
                snippet: None,
                body: None,
                date: at("2024-01-01T00:00:00"),
                snoozed_until: None,
            })
            .await
            .unwrap();
        let tool = SnoozeTool::new(
            store.clone(),
            Arc::new(FixedClock(at("2024-03-01T08:00:00"))),
            TaskContext {
                user_id: "u1".into(),
                email_id: current_email.into(),
                sender: String::new(),
            },
        );
        (store, tool)
    }

    #[tokio::test]
    async fn test_snooze_is_idempotent() {
        let (store, tool) = setup().await;
        let first = tool.execute("3").await.unwrap();
        let after_first = store.snoozed_until("e1").await.unwrap();
        let second = tool.execute("3").await.unwrap();
        let after_second = store.snoozed_until("e1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(after_first, after_second);
        assert_eq!(after_second, Some(at("2024-03-04T08:00:00")));
    }

    #[tokio::test]
    async fn test_negative_days_rejected() {
        let (_store, tool) = setup().await;
        assert_eq!(tool.execute("-2").await, Err("Days cannot be negative".to_string()));
        assert_eq!(tool.execute("soon").await, Err("Days must be a valid integer".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_email_warns() {
        let (_store, tool) = setup_for("missing").await;
        let out = tool.execute("1").await.unwrap();
        assert!(out.starts_with("Warning:"));
    }

    #[tokio::test]
    async fn test_explicit_id_must_match_current_email() {
        let (store, tool) = setup().await;
        let out = tool.execute("e1|2").await.unwrap();
        assert!(out.starts_with("Email e1 snoozed until"));
        assert_eq!(store.snoozed_until("e1").await.unwrap(), Some(at("2024-03-03T08:00:00")));
    }

    #[tokio::test]
    async fn test_foreign_email_id_rejected() {
        let (store, tool) = setup().await;
        let mut other = store.find_email("e1", "u1").await.unwrap().unwrap();
        other.id = "victim".into();
        other.user_id = "u2".into();
        store.upsert_email(other).await.unwrap();

        let err = tool.execute("victim|30").await.unwrap_err();
        assert!(err.contains("current email"));
        assert_eq!(store.snoozed_until("victim").await.unwrap(), None);
        assert_eq!(store.snoozed_until("e1").await.unwrap(), None);
    }
}
