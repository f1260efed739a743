//! 调度服务：抽取 → 补全参与者 → 创建日历事件 → 持久化
//!
//! 日历平台失败时降级为内部记录（链接为空），调度意图不会丢失。

use std::sync::Arc;

use crate::core::Clock;
use crate::mail::{looks_like_address, MailStore, StoreError, TaskContext};
use crate::scheduling::calendar::{CalendarProvider, EventRequest};
use crate::scheduling::extractor::MeetingExtractor;
use crate::scheduling::{MeetingRecord, MeetingStatus};

pub struct SchedulingService {
    extractor: MeetingExtractor,
    calendar: Arc<dyn CalendarProvider>,
    store: Arc<dyn MailStore>,
    clock: Arc<dyn Clock>,
}

impl SchedulingService {
    pub fn new(
        extractor: MeetingExtractor,
        calendar: Arc<dyn CalendarProvider>,
        store: Arc<dyn MailStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            extractor,
            calendar,
            store,
            clock,
        }
    }

    /// 从自由文本安排会议。target 为对方地址；user_id 本身是邮箱地址时也加入参与者
    pub async fn schedule_from_text(
        &self,
        ctx: &TaskContext,
        details: &str,
        target: &str,
    ) -> Result<MeetingRecord, StoreError> {
        let now = self.clock.now();
        let meeting = self.extractor.extract(details, now).await;

        let mut attendees = meeting.attendees.clone();
        for addr in [target, ctx.user_id.as_str()] {
            let addr = addr.trim().to_lowercase();
            if looks_like_address(&addr) {
                attendees.insert(addr);
            }
        }

        let request = EventRequest {
            title: meeting.title.clone(),
            description: meeting.description.clone(),
            start: meeting.start_time,
            end: meeting.end_time,
            attendees: attendees.clone(),
        };

        let (platform, external_id, meeting_link, status) =
            match self.calendar.create_event(&request).await {
                Ok(event) => (
                    self.calendar.platform().as_str().to_string(),
                    Some(event.event_id),
                    event.join_link,
                    MeetingStatus::Scheduled,
                ),
                Err(e) => {
                    tracing::warn!(
                        platform = %self.calendar.platform().as_str(),
                        error = %e,
                        "calendar event creation failed, recording meeting internally"
                    );
                    ("internal".to_string(), None, String::new(), MeetingStatus::RecordedOnly)
                }
            };

        let record = MeetingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: ctx.user_id.clone(),
            email_id: ctx.email_id.clone(),
            title: meeting.title,
            description: meeting.description,
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            attendees,
            meeting_link,
            platform,
            external_id,
            status,
            created_at: now,
        };
        self.store.insert_meeting(record.clone()).await?;
        tracing::info!(
            meeting_id = %record.id,
            email_id = %record.email_id,
            start = %record.start_time,
            status = ?record.status,
            "meeting recorded"
        );
        Ok(record)
    }
}
