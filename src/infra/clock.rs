use chrono::{NaiveDate, Utc};

use crate::application::clock::Clock;

/// Wall-clock dates in UTC. The whole engine works in calendar days, so UTC
/// midnight is the tenant-independent day boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
