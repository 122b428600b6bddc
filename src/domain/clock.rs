use chrono::{DateTime, NaiveDate, Utc};

/// Source of "today" for overdue calculations and audit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one calendar day. Timestamps still advance in real time
/// but are shifted onto that day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let time = Utc::now().time();
        self.today.and_time(time).and_utc()
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
