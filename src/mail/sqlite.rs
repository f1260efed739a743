//! SQLite 持久化（rusqlite，同步调用，单连接加锁）
//!
//! emails 表存 JSON 文档，主键 (id, user_id)；snoozes 表按邮件 id 覆盖写；meetings 表追加。

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::mail::{Email, MailStore, StoreError};
use crate::scheduling::MeetingRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS emails (
    id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    doc TEXT NOT NULL,
    PRIMARY KEY (id, user_id)
);
CREATE INDEX IF NOT EXISTS emails_user_date ON emails (user_id, date DESC);
CREATE TABLE IF NOT EXISTS snoozes (
    email_id TEXT PRIMARY KEY,
    snoozed_until TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS meetings (
    id TEXT PRIMARY KEY,
    email_id TEXT NOT NULL,
    doc TEXT NOT NULL
);
";

pub struct SqliteMailStore {
    conn: Mutex<Connection>,
}

impl SqliteMailStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
        f(&conn)
    }

    fn snooze_of(conn: &Connection, email_id: &str) -> Result<Option<NaiveDateTime>, StoreError> {
        Ok(conn
            .query_row(
                "SELECT snoozed_until FROM snoozes WHERE email_id = ?1",
                params![email_id],
                |row| row.get::<_, NaiveDateTime>(0),
            )
            .optional()?)
    }
}

#[async_trait]
impl MailStore for SqliteMailStore {
    async fn upsert_email(&self, email: Email) -> Result<(), StoreError> {
        let doc = serde_json::to_string(&email)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO emails (id, user_id, date, doc) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id, user_id) DO UPDATE SET date = excluded.date, doc = excluded.doc",
                params![email.id, email.user_id, email.date, doc],
            )?;
            Ok(())
        })
    }

    async fn find_email(&self, id: &str, user_id: &str) -> Result<Option<Email>, StoreError> {
        self.with_conn(|conn| {
            let doc: Option<String> = conn
                .query_row(
                    "SELECT doc FROM emails WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(doc) = doc else {
                return Ok(None);
            };
            let mut email: Email = serde_json::from_str(&doc)?;
            email.snoozed_until = Self::snooze_of(conn, id)?.or(email.snoozed_until);
            Ok(Some(email))
        })
    }

    async fn recent_emails(&self, user_id: &str, limit: usize) -> Result<Vec<Email>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT doc FROM emails WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2",
            )?;
            let docs = stmt
                .query_map(params![user_id, limit], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            docs.iter()
                .map(|d| serde_json::from_str(d).map_err(StoreError::from))
                .collect()
        })
    }

    async fn set_snoozed_until(
        &self,
        email_id: &str,
        until: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM emails WHERE id = ?1)",
                params![email_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO snoozes (email_id, snoozed_until) VALUES (?1, ?2)
                 ON CONFLICT (email_id) DO UPDATE SET snoozed_until = excluded.snoozed_until",
                params![email_id, until],
            )?;
            Ok(true)
        })
    }

    async fn snoozed_until(&self, email_id: &str) -> Result<Option<NaiveDateTime>, StoreError> {
        self.with_conn(|conn| Self::snooze_of(conn, email_id))
    }

    async fn insert_meeting(&self, meeting: MeetingRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_string(&meeting)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO meetings (id, email_id, doc) VALUES (?1, ?2, ?3)",
                params![meeting.id, meeting.email_id, doc],
            )?;
            Ok(())
        })
    }

    async fn meetings_for_email(&self, email_id: &str) -> Result<Vec<MeetingRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT doc FROM meetings WHERE email_id = ?1")?;
            let docs = stmt
                .query_map(params![email_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            docs.iter()
                .map(|d| serde_json::from_str(d).map_err(StoreError::from))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str, day: u32) -> Email {
        Email {
            id: id.into(),
            thread_id: "t".into(),
            user_id: "u1".into(),
            subject: "s".into(),
            sender: "a@b.com".into(),
            snippet: None,
            body: Some(format!("body {id}")),
            date: chrono::NaiveDate::from_ymd_opt(2024, 2, day)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            snoozed_until: None,
        }
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMailStore::open(dir.path().join("db/mail.sqlite3")).unwrap();
        store.upsert_email(email("a", 1)).await.unwrap();
        store.upsert_email(email("b", 9)).await.unwrap();
        store.upsert_email(email("a", 5)).await.unwrap();

        let recent = store.recent_emails("u1", 10).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(recent[1].date, email("a", 5).date);
    }

    #[tokio::test]
    async fn test_sqlite_snooze_is_keyed_overwrite() {
        let store = SqliteMailStore::open_in_memory().unwrap();
        store.upsert_email(email("a", 1)).await.unwrap();
        let until = email("x", 20).date;
        assert!(store.set_snoozed_until("a", until).await.unwrap());
        assert!(store.set_snoozed_until("a", until).await.unwrap());
        assert_eq!(store.snoozed_until("a").await.unwrap(), Some(until));
        let found = store.find_email("a", "u1").await.unwrap().unwrap();
        assert_eq!(found.snoozed_until, Some(until));
        assert!(!store.set_snoozed_until("nope", until).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_unbounded_limit_returns_everything() {
        let store = SqliteMailStore::open_in_memory().unwrap();
        for day in 1..=3 {
            store.upsert_email(email(&format!("m{day}"), day)).await.unwrap();
        }
        assert_eq!(store.recent_emails("u1", usize::MAX).await.unwrap().len(), 3);
        assert_eq!(store.recent_emails("u1", 1).await.unwrap().len(), 1);
    }
}
