use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// The first date on or after `today` that falls on `weekday`.
pub fn first_occurrence_date(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let offset = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    today + Duration::days(offset as i64)
}

/// `date` at `hour:00` local time in `tz`, as a UTC instant. An hour that a
/// DST jump skips is read as UTC wall time.
pub fn local_instant(tz: Tz, date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| anyhow!("Reminder hour {} is not a valid time of day", hour))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive));
    Ok(local.with_timezone(&Utc))
}

/// Next weekly fire of `weekday` at `hour` in `tz` strictly after `now`.
pub fn next_fire_time(now: DateTime<Utc>, tz: Tz, weekday: Weekday, hour: u32) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    let date = first_occurrence_date(today, weekday);
    let candidate = local_instant(tz, date, hour)?;
    if candidate > now {
        Ok(candidate)
    } else {
        local_instant(tz, date + Duration::days(7), hour)
    }
}

/// The fire one week after `previous`, keeping the local hour across DST.
pub fn following_fire(previous: DateTime<Utc>, tz: Tz, hour: u32) -> Result<DateTime<Utc>> {
    let date = previous.with_timezone(&tz).date_naive() + Duration::days(7);
    local_instant(tz, date, hour)
}
