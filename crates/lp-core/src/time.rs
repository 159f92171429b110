//! Unix-second timestamps and ISO-8601 rendering.
//!
//! The engine never reads the clock inside scheduling logic; callers pass
//! `now` in, so tests can drive time explicitly.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::SECS_PER_DAY;

/// Seconds since the Unix epoch, UTC.
pub type UnixSecs = u64;

pub fn now_unix_secs() -> UnixSecs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `ts` shifted forward by whole days, saturating at the far future.
pub fn after_days(ts: UnixSecs, days: u32) -> UnixSecs {
    ts.saturating_add(u64::from(days) * SECS_PER_DAY)
}

/// Render a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso8601(ts: UnixSecs) -> String {
    let (year, month, day) = date_from_epoch_days((ts / SECS_PER_DAY) as i64);
    let secs_of_day = ts % SECS_PER_DAY;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        secs_of_day / 3600,
        secs_of_day % 3600 / 60,
        secs_of_day % 60
    )
}

/// Proleptic Gregorian date for a count of days since 1970-01-01
/// (Hinnant's civil-from-days).
fn date_from_epoch_days(days: i64) -> (i64, u32, u32) {
    let shifted = days + 719_468;
    let era = shifted.div_euclid(146_097);
    let day_of_era = shifted.rem_euclid(146_097);
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_index + 2) / 5 + 1) as u32;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    } as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
