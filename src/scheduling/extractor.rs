//! 会议信息抽取：LLM 负责理解相对日期，这里负责解析、兜底与时间校正
//!
//! 返回值恒满足 `start_time >= now` 且 `end_time > start_time`。
//! 载荷无法解析或 LLM 调用失败时使用兜底记录，从不向调用方报错。

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::LlmClient;
use crate::mail::looks_like_address;

const FALLBACK_TITLE: &str = "Meeting";
const DESCRIPTION_LIMIT: usize = 200;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub title: String,
    pub description: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub attendees: BTreeSet<String>,
}

impl MeetingDetails {
    /// 兜底记录：标题 "Meeting"，描述为原文前 200 字符，从 now 开始持续一小时
    pub fn fallback(text: &str, now: NaiveDateTime) -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            description: text.chars().take(DESCRIPTION_LIMIT).collect(),
            start_time: now,
            end_time: now + Duration::hours(1),
            attendees: BTreeSet::new(),
        }
    }

    /// 解析 LLM 输出，失败时兜底，最后统一校正时间
    pub fn from_completion(raw: &str, text: &str, now: NaiveDateTime) -> Self {
        parse_payload(raw, now)
            .unwrap_or_else(|| {
                tracing::warn!("meeting payload not parseable, using fallback record");
                Self::fallback(text, now)
            })
            .clamped(now)
    }

    /// 开始早于 now 时改为 now+1h；结束不晚于开始时改为开始+1h
    pub fn clamped(mut self, now: NaiveDateTime) -> Self {
        if self.start_time < now {
            tracing::info!(start = %self.start_time, now = %now, "meeting start in the past, moved");
            self.start_time = now + Duration::hours(1);
        }
        if self.end_time <= self.start_time {
            tracing::info!(end = %self.end_time, start = %self.start_time, "meeting end not after start, moved");
            self.end_time = self.start_time + Duration::hours(1);
        }
        self
    }
}

/// 去掉 ``` / ```json 代码围栏
fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.find('\n').map_or("", |nl| &rest[nl + 1..]);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// 取第一个 '{' 到最后一个 '}' 之间的 JSON 对象
fn json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    let s = strip_code_fence(raw);
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&s[start..=end]).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// 解析不带时区的 ISO 时间；带偏移量时保留墙钟时间
pub fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let parsed = FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(9, 0, 0))
        })?;
    (parsed.year() <= MAX_YEAR).then_some(parsed)
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn attendees_field(value: Option<&Value>) -> BTreeSet<String> {
    let candidates: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(String::from).collect(),
        _ => Vec::new(),
    };
    candidates
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| looks_like_address(a))
        .collect()
}

/// 把 LLM 载荷解析为会议信息（未校正）；不是 JSON 对象时返回 None
pub fn parse_payload(raw: &str, now: NaiveDateTime) -> Option<MeetingDetails> {
    let map = json_object(raw)?;
    let start_time = string_field(&map, "start_time")
        .and_then(|s| parse_instant(&s))
        .unwrap_or(now);
    let end_time = string_field(&map, "end_time")
        .and_then(|s| parse_instant(&s))
        .unwrap_or(start_time + Duration::hours(1));
    Some(MeetingDetails {
        title: string_field(&map, "title").unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        description: string_field(&map, "description").unwrap_or_default(),
        start_time,
        end_time,
        attendees: attendees_field(map.get("attendees")),
    })
}

fn extraction_prompt(text: &str, now: NaiveDateTime) -> String {
    format!(
        "Extract meeting details from the text below.\n\
        The current date and time is {now} ({weekday}). Resolve relative dates such as \
        \"tomorrow\" or \"next Monday\" from this reference, never from any other clock. \
        The year of every date must be {year} or later.\n\
        Respond with a JSON object only, no prose:\n\
        {{\"title\": string, \"description\": string, \
        \"start_time\": \"YYYY-MM-DDTHH:MM:SS\", \"end_time\": \"YYYY-MM-DDTHH:MM:SS\", \
        \"attendees\": [email addresses]}}\n\
        If no duration is given, the meeting lasts one hour.\n\n\
        Text:\n{text}",
        now = now.format("%Y-%m-%dT%H:%M:%S"),
        weekday = now.format("%A"),
        year = now.year(),
    )
}

pub struct MeetingExtractor {
    llm: Arc<dyn LlmClient>,
}

impl MeetingExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, text: &str, now: NaiveDateTime) -> MeetingDetails {
        match self.llm.complete_prompt(&extraction_prompt(text, now)).await {
            Ok(raw) => MeetingDetails::from_completion(&raw, text, now),
            Err(e) => {
                tracing::warn!(error = %e, "meeting extraction call failed, using fallback record");
                MeetingDetails::fallback(text, now).clamped(now)
            }
        }
    }
}
