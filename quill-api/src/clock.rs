use chrono::{DateTime, Utc};

/// Clock 时间协作方
///
/// 定时发布的扫描需要可注入的时钟，测试里用固定时间实现。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// FixedClock 返回固定时间，测试用
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
