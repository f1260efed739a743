//! 持久化协作方：邮件文档按 {id, user_id} upsert/查询，snooze 状态按 {id} 覆盖写，会议记录追加
//!
//! 所有写入都是窄范围、按键定位的更新，不需要跨运行事务。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::mail::Email;
use crate::scheduling::MeetingRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait MailStore: Send + Sync {
    async fn upsert_email(&self, email: Email) -> Result<(), StoreError>;

    async fn find_email(&self, id: &str, user_id: &str) -> Result<Option<Email>, StoreError>;

    /// 用户最近的邮件，按 date 倒序
    async fn recent_emails(&self, user_id: &str, limit: usize) -> Result<Vec<Email>, StoreError>;

    /// 覆盖写 snoozed_until；返回是否命中该邮件
    async fn set_snoozed_until(
        &self,
        email_id: &str,
        until: NaiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn snoozed_until(&self, email_id: &str) -> Result<Option<NaiveDateTime>, StoreError>;

    async fn insert_meeting(&self, meeting: MeetingRecord) -> Result<(), StoreError>;

    async fn meetings_for_email(&self, email_id: &str) -> Result<Vec<MeetingRecord>, StoreError>;
}

/// 内存实现（测试与无数据库运行）
#[derive(Debug, Default)]
pub struct InMemoryMailStore {
    emails: RwLock<HashMap<(String, String), Email>>,
    meetings: RwLock<Vec<MeetingRecord>>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailStore for InMemoryMailStore {
    async fn upsert_email(&self, email: Email) -> Result<(), StoreError> {
        let key = (email.id.clone(), email.user_id.clone());
        self.emails.write().await.insert(key, email);
        Ok(())
    }

    async fn find_email(&self, id: &str, user_id: &str) -> Result<Option<Email>, StoreError> {
        let key = (id.to_string(), user_id.to_string());
        Ok(self.emails.read().await.get(&key).cloned())
    }

    async fn recent_emails(&self, user_id: &str, limit: usize) -> Result<Vec<Email>, StoreError> {
        let mut emails: Vec<Email> = self
            .emails
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        emails.sort_by(|a, b| b.date.cmp(&a.date));
        emails.truncate(limit);
        Ok(emails)
    }

    async fn set_snoozed_until(
        &self,
        email_id: &str,
        until: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut emails = self.emails.write().await;
        let mut matched = false;
        for email in emails.values_mut().filter(|e| e.id == email_id) {
            email.snoozed_until = Some(until);
            matched = true;
        }
        Ok(matched)
    }

    async fn snoozed_until(&self, email_id: &str) -> Result<Option<NaiveDateTime>, StoreError> {
        Ok(self
            .emails
            .read()
            .await
            .values()
            .find(|e| e.id == email_id)
            .and_then(|e| e.snoozed_until))
    }

    async fn insert_meeting(&self, meeting: MeetingRecord) -> Result<(), StoreError> {
        self.meetings.write().await.push(meeting);
        Ok(())
    }

    async fn meetings_for_email(&self, email_id: &str) -> Result<Vec<MeetingRecord>, StoreError> {
        Ok(self
            .meetings
            .read()
            .await
            .iter()
            .filter(|m| m.email_id == email_id)
            .cloned()
            .collect())
    }
}
