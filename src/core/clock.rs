//! 时钟抽象：抽取与 snooze 以注入的 now 为锚点，测试中可固定

use chrono::{NaiveDateTime, Timelike, Utc};

/// 提供当前时刻（无时区，按 UTC 理解）
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 系统墙钟（精确到秒）
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// 固定时钟
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
