//! 日历平台：Google Calendar v3、Cal.com bookings、仅内部记录
//!
//! 平台由 `[scheduling].platform` 显式选择。凭据缺失不在构造时报错，
//! 而是在 create_event 时返回 NotConfigured，由调度服务降级为内部记录。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{Platform, SchedulingSection};

const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const CAL_COM_API: &str = "https://api.cal.com/v1";

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("calendar not configured: {0}")]
    NotConfigured(String),

    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid calendar response: {0}")]
    InvalidResponse(String),
}

/// 创建日历事件所需信息
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: String,
    pub join_link: String,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn platform(&self) -> Platform;

    async fn create_event(&self, req: &EventRequest) -> Result<CreatedEvent, CalendarError>;
}

fn iso(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

async fn json_or_api_error(resp: reqwest::Response) -> Result<Value, CalendarError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CalendarError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}

/// Google Calendar（带 Meet 会议链接）
pub struct GoogleCalendar {
    client: Client,
    access_token: Option<String>,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(access_token: Option<String>, calendar_id: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            calendar_id: calendar_id.unwrap_or_else(|| "primary".to_string()),
        }
    }

    fn event_body(req: &EventRequest) -> Value {
        json!({
            "summary": req.title,
            "description": req.description,
            "start": { "dateTime": iso(&req.start), "timeZone": "UTC" },
            "end": { "dateTime": iso(&req.end), "timeZone": "UTC" },
            "attendees": req.attendees.iter().map(|a| json!({ "email": a })).collect::<Vec<_>>(),
            "conferenceData": {
                "createRequest": {
                    "requestId": uuid::Uuid::new_v4().to_string(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" }
                }
            }
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    fn platform(&self) -> Platform {
        Platform::GoogleCalendar
    }

    async fn create_event(&self, req: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| CalendarError::NotConfigured("google access_token missing".into()))?;
        let url = format!(
            "{}/calendars/{}/events?conferenceDataVersion=1",
            GOOGLE_CALENDAR_API, self.calendar_id
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&Self::event_body(req))
            .send()
            .await?;
        let body = json_or_api_error(resp).await?;
        let event_id = body["id"]
            .as_str()
            .ok_or_else(|| CalendarError::InvalidResponse("missing event id".into()))?;
        Ok(CreatedEvent {
            event_id: event_id.to_string(),
            join_link: body["hangoutLink"].as_str().unwrap_or_default().to_string(),
        })
    }
}

/// Cal.com bookings API；首个非用户本人的参与者作为预约人
pub struct CalComCalendar {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    event_type_id: Option<u64>,
}

impl CalComCalendar {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        event_type_id: Option<u64>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| CAL_COM_API.to_string())
                .trim_end_matches('/')
                .to_string(),
            event_type_id,
        }
    }

    fn booking_body(event_type_id: u64, req: &EventRequest) -> Value {
        let attendee = req.attendees.iter().next().cloned().unwrap_or_default();
        json!({
            "eventTypeId": event_type_id,
            "start": format!("{}Z", iso(&req.start)),
            "end": format!("{}Z", iso(&req.end)),
            "title": req.title,
            "description": req.description,
            "responses": {
                "name": attendee.split('@').next().unwrap_or_default(),
                "email": attendee,
                "guests": req.attendees.iter().skip(1).collect::<Vec<_>>(),
            },
            "timeZone": "UTC",
            "language": "en",
            "metadata": {}
        })
    }
}

#[async_trait]
impl CalendarProvider for CalComCalendar {
    fn platform(&self) -> Platform {
        Platform::CalCom
    }

    async fn create_event(&self, req: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CalendarError::NotConfigured("cal.com api_key missing".into()))?;
        let event_type_id = self
            .event_type_id
            .ok_or_else(|| CalendarError::NotConfigured("cal.com event_type_id missing".into()))?;
        if req.attendees.is_empty() {
            return Err(CalendarError::NotConfigured("cal.com booking needs an attendee".into()));
        }

        let url = format!("{}/bookings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("apiKey", api_key)])
            .json(&Self::booking_body(event_type_id, req))
            .send()
            .await?;
        let body = json_or_api_error(resp).await?;
        let event_id = match &body["id"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => body["uid"]
                .as_str()
                .map(String::from)
                .ok_or_else(|| CalendarError::InvalidResponse("missing booking id".into()))?,
        };
        let join_link = body["metadata"]["videoCallUrl"]
            .as_str()
            .or_else(|| body["location"].as_str().filter(|l| l.starts_with("http")))
            .unwrap_or_default()
            .to_string();
        Ok(CreatedEvent { event_id, join_link })
    }
}

/// 不调用外部服务，只生成内部 ID
#[derive(Debug, Default)]
pub struct InternalCalendar;

#[async_trait]
impl CalendarProvider for InternalCalendar {
    fn platform(&self) -> Platform {
        Platform::Internal
    }

    async fn create_event(&self, _req: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        Ok(CreatedEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            join_link: String::new(),
        })
    }
}

pub fn create_calendar_from_config(cfg: &SchedulingSection) -> Arc<dyn CalendarProvider> {
    tracing::info!(platform = %cfg.platform.as_str(), "calendar platform selected");
    match cfg.platform {
        Platform::GoogleCalendar => Arc::new(GoogleCalendar::new(
            cfg.google.access_token.clone(),
            cfg.google.calendar_id.clone(),
            cfg.request_timeout_secs,
        )),
        Platform::CalCom => Arc::new(CalComCalendar::new(
            cfg.cal_com.api_key.clone(),
            cfg.cal_com.base_url.clone(),
            cfg.cal_com.event_type_id,
            cfg.request_timeout_secs,
        )),
        Platform::Internal => Arc::new(InternalCalendar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EventRequest {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        EventRequest {
            title: "Sync".into(),
            description: "weekly".into(),
            start,
            end: start + chrono::Duration::hours(1),
            attendees: ["amy@corp.io".to_string(), "bob@example.com".to_string()]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_google_event_body() {
        let body = GoogleCalendar::event_body(&request());
        assert_eq!(body["start"]["dateTime"], "2024-01-02T17:00:00");
        assert_eq!(body["attendees"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
    }

    #[test]
    fn test_cal_com_booking_body() {
        let body = CalComCalendar::booking_body(42, &request());
        assert_eq!(body["eventTypeId"], 42);
        assert_eq!(body["start"], "2024-01-02T17:00:00Z");
        assert_eq!(body["responses"]["email"], "amy@corp.io");
        assert_eq!(body["responses"]["guests"][0], "bob@example.com");
    }

    #[tokio::test]
    async fn test_missing_credentials_not_configured() {
        let google = GoogleCalendar::new(None, None, 5);
        assert!(matches!(
            google.create_event(&request()).await,
            Err(CalendarError::NotConfigured(_))
        ));
        let cal = CalComCalendar::new(Some("key".into()), None, None, 5);
        assert!(matches!(
            cal.create_event(&request()).await,
            Err(CalendarError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_internal_calendar_has_empty_link() {
        let event = InternalCalendar.create_event(&request()).await.unwrap();
        assert!(event.join_link.is_empty());
        assert!(!event.event_id.is_empty());
    }

    #[test]
    fn test_platform_selection() {
        let mut cfg = SchedulingSection::default();
        assert_eq!(create_calendar_from_config(&cfg).platform(), Platform::Internal);
        cfg.platform = Platform::CalCom;
        assert_eq!(create_calendar_from_config(&cfg).platform(), Platform::CalCom);
    }
}
