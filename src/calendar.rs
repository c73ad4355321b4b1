//! Trading-day and session-time utilities.
//!
//! The engine only ever asks three questions: which trading day is it
//! (the price-cache key), is the session still open, and what time is it
//! now (for report headers). Behind a trait so tests can pin the clock.

use chrono::{Datelike, Days, Local, NaiveDate, Timelike, Weekday};

/// Clock and trading-calendar queries consumed by the engine.
pub trait Calendar: Send + Sync {
    /// Key for today's price cache: the most recent business day,
    /// formatted `YYYY-MM-DD`.
    fn trading_day(&self) -> String;

    /// Whether the local time is still before the session close.
    fn before_close(&self) -> bool;

    /// Current local time as `HH:MM:SS`, for report headers.
    fn now_hms(&self) -> String;
}

/// Calendar backed by the system clock.
pub struct SystemCalendar {
    close_hour: u32,
}

impl SystemCalendar {
    pub fn new(close_hour: u32) -> Self {
        Self { close_hour }
    }
}

impl Calendar for SystemCalendar {
    fn trading_day(&self) -> String {
        business_day(Local::now().date_naive()).format("%Y-%m-%d").to_string()
    }

    fn before_close(&self) -> bool {
        Local::now().hour() < self.close_hour
    }

    fn now_hms(&self) -> String {
        Local::now().format("%H:%M:%S").to_string()
    }
}

/// Roll a date back to the most recent weekday.
fn business_day(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day
            .checked_sub_days(Days::new(1))
            .unwrap_or(day);
    }
    day
}
