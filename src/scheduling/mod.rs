//! 会议调度：会议信息抽取、日历平台与调度服务

pub mod calendar;
pub mod extractor;
pub mod service;

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use calendar::{
    create_calendar_from_config, CalComCalendar, CalendarError, CalendarProvider, CreatedEvent,
    EventRequest, GoogleCalendar, InternalCalendar,
};
pub use extractor::{parse_instant, parse_payload, MeetingDetails, MeetingExtractor};
pub use service::SchedulingService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    /// 外部日历失败，仅内部记录
    RecordedOnly,
}

/// 持久化的会议记录（每次调度一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub user_id: String,
    pub email_id: String,
    pub title: String,
    pub description: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub attendees: BTreeSet<String>,
    /// 会议链接；仅内部记录时为空
    pub meeting_link: String,
    pub platform: String,
    pub external_id: Option<String>,
    pub status: MeetingStatus,
    pub created_at: NaiveDateTime,
}
