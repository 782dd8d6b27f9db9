use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use super::mytime::DummyTimeProvider;

pub fn time(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).expect(&format!("Expected {:0>2}:{:0>2}:{:0>2} to be a valid time", hour, minute, second))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect(&format!("Expected {:0>4}-{:0>2}-{:0>2} to be a valid date", year, month, day))
}

pub fn utc_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date(year, month, day).and_time(time(hour, minute, second)))
}

/// A dummy clock starting at a fixed, arbitrary point in time.
pub fn dummy_clock() -> DummyTimeProvider {
    DummyTimeProvider::new(utc_datetime(2024, 1, 3, 19, 51, 42))
}
