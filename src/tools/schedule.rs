//! schedule_meeting：`meeting_details|target_email`，target 缺省为任务发件人地址

use std::sync::Arc;

use async_trait::async_trait;

use crate::mail::{extract_address, looks_like_address, TaskContext};
use crate::scheduling::{MeetingStatus, SchedulingService};
use crate::tools::{Tool, ToolKind};

pub struct ScheduleTool {
    service: Arc<SchedulingService>,
    ctx: TaskContext,
}

impl ScheduleTool {
    pub fn new(service: Arc<SchedulingService>, ctx: TaskContext) -> Self {
        Self { service, ctx }
    }

    /// 最后一段像邮箱地址时作为 target，否则整段都是会议描述
    fn split_target(&self, input: &str) -> (String, String) {
        if let Some((details, target)) = input.rsplit_once('|') {
            let target = extract_address(target);
            if looks_like_address(&target) {
                return (details.trim().to_string(), target);
            }
            if target.is_empty() {
                return (details.trim().to_string(), extract_address(&self.ctx.sender));
            }
        }
        (input.trim().to_string(), extract_address(&self.ctx.sender))
    }
}

#[async_trait]
impl Tool for ScheduleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ScheduleMeeting
    }

    fn description(&self) -> &str {
        "Schedule a meeting. Input: meeting_details (or meeting_details|target_email; defaults to the sender)"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let (details, target) = self.split_target(input);
        if details.is_empty() {
            return Err("No meeting details provided".to_string());
        }
        let record = self
            .service
            .schedule_from_text(&self.ctx, &details, &target)
            .await
            .map_err(|e| e.to_string())?;

        let when = format!(
            "{} to {}",
            record.start_time.format("%Y-%m-%d %H:%M"),
            record.end_time.format("%Y-%m-%d %H:%M")
        );
        let attendees = record.attendees.iter().cloned().collect::<Vec<_>>().join(", ");
        Ok(match record.status {
            MeetingStatus::Scheduled if !record.meeting_link.is_empty() => format!(
                "Meeting '{}' scheduled on {} ({}) from {when} with {attendees}. Link: {}",
                record.title, record.platform, record.id, record.meeting_link
            ),
            MeetingStatus::Scheduled => format!(
                "Meeting '{}' scheduled on {} ({}) from {when} with {attendees}.",
                record.title, record.platform, record.id
            ),
            MeetingStatus::RecordedOnly => format!(
                "Calendar unavailable; meeting '{}' recorded internally ({}) from {when} with {attendees}.",
                record.title, record.id
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::llm::MockLlmClient;
    use crate::mail::{InMemoryMailStore, MailStore};
    use crate::scheduling::{InternalCalendar, MeetingExtractor};
    use chrono::NaiveDateTime;

    fn tool(store: Arc<InMemoryMailStore>) -> ScheduleTool {
        let llm = Arc::new(MockLlmClient::with_script([
            r#"{"title": "Intro call", "start_time": "2024-01-02T17:00:00", "end_time": "2024-01-02T18:00:00"}"#,
        ]));
        let now = NaiveDateTime::parse_from_str("2024-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let service = SchedulingService::new(
            MeetingExtractor::new(llm),
            Arc::new(InternalCalendar),
            store,
            Arc::new(FixedClock(now)),
        );
        ScheduleTool::new(
            Arc::new(service),
            TaskContext {
                user_id: "u1".into(),
                email_id: "e1".into(),
                sender: "Bob Smith <bob@example.com>".into(),
            },
        )
    }

    #[test]
    fn test_target_defaults_to_sender() {
        let t = tool(Arc::new(InMemoryMailStore::new()));
        assert_eq!(
            t.split_target("tomorrow at 5pm"),
            ("tomorrow at 5pm".to_string(), "bob@example.com".to_string())
        );
        assert_eq!(
            t.split_target("tomorrow at 5pm|Amy <amy@corp.io>"),
            ("tomorrow at 5pm".to_string(), "amy@corp.io".to_string())
        );
        assert_eq!(
            t.split_target("room 4|5"),
            ("room 4|5".to_string(), "bob@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_schedule_records_meeting() {
        let store = Arc::new(InMemoryMailStore::new());
        let out = tool(store.clone()).execute("Let's meet tomorrow at 5pm").await.unwrap();
        assert!(out.contains("Intro call"));
        assert!(out.contains("2024-01-02 17:00 to 2024-01-02 18:00"));
        assert!(out.contains("bob@example.com"));
        let meetings = store.meetings_for_email("e1").await.unwrap();
        assert_eq!(meetings.len(), 1);
    }
}
