// used for calendar dates in the local timezone
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Calendar date of `instant` as seen in the local timezone.
pub fn convert_date(instant: &DateTime<Utc>) -> NaiveDate {
    convert_date_in(instant, &Local)
}

/// Wall-clock date and time of `instant` in the local timezone.
pub fn convert_date_time(instant: &DateTime<Utc>) -> NaiveDateTime {
    convert_date_time_in(instant, &Local)
}

pub fn convert_date_in<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

pub fn convert_date_time_in<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

pub fn today_date() -> NaiveDate {
    Local::now().date_naive()
}

// a copy of the given instant, or now
pub fn wrap_date(date: Option<&DateTime<Utc>>) -> DateTime<Utc> {
    date.copied().unwrap_or_else(Utc::now)
}
