use chrono::{DateTime, Utc};
use quill_api::clock::Clock;

/// SystemClock 系统时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
