use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Wall-clock source for challenge expiry and session bookkeeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type ClockPtr = Arc<dyn Clock>;
