use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

use crate::domain::common::model::{FirstDayOfWeek, Resolution};

const TIMESTAMP_LEN: usize = 14;

/// Timezone in which wall-clock timestamps are read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneSpec {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl TimeZoneSpec {
    /// Accepts `utc`, `+HH:MM` / `-HHMM` offsets and IANA names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("utc") || value == "Z" {
            return Some(TimeZoneSpec::Utc);
        }
        if value.starts_with('+') || value.starts_with('-') {
            return parse_offset(value).map(TimeZoneSpec::Fixed);
        }
        value.parse::<Tz>().ok().map(TimeZoneSpec::Named)
    }

    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self {
            TimeZoneSpec::Utc => Utc.fix(),
            TimeZoneSpec::Fixed(offset) => *offset,
            TimeZoneSpec::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// Wall-clock time of `instant` in this zone; `None` past the calendar's range.
    pub fn to_local(&self, instant: DateTime<Utc>) -> Option<NaiveDateTime> {
        let shift = Duration::seconds(self.offset_at(instant).local_minus_utc() as i64);
        instant.naive_utc().checked_add_signed(shift)
    }

    /// Resolves a wall-clock time in this zone. Ambiguous DST times pick the
    /// earlier instant; times skipped by a DST gap do not exist.
    pub fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            TimeZoneSpec::Utc => Some(local.and_utc()),
            TimeZoneSpec::Fixed(offset) => offset
                .from_local_datetime(&local)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            TimeZoneSpec::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Offset at `instant` as `+HH:MM`.
    pub fn offset_string(&self, instant: DateTime<Utc>) -> String {
        let total = self.offset_at(instant).local_minus_utc();
        let sign = if total < 0 { '-' } else { '+' };
        let total = total.abs();
        format!("{}{:02}:{:02}", sign, total / 3600, (total % 3600) / 60)
    }
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let sign = if value.starts_with('-') { -1 } else { 1 };
    let digits: String = value[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Fixed-width `YYYYMMDDhhmmss` timestamps as exchanged with the analytics service.
pub struct TimestampCodec;

impl TimestampCodec {
    pub fn format(instant: DateTime<Utc>, tz: &TimeZoneSpec) -> Option<String> {
        tz.to_local(instant).map(Self::format_naive)
    }

    pub fn format_naive(local: NaiveDateTime) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            local.second()
        )
    }

    /// Wall-clock fields of a 14-digit timestamp; `None` when malformed.
    pub fn parse_naive(ts: &str) -> Option<NaiveDateTime> {
        if ts.len() != TIMESTAMP_LEN || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let field = |from: usize, to: usize| ts[from..to].parse::<u32>().ok();
        let date = NaiveDate::from_ymd_opt(field(0, 4)? as i32, field(4, 6)?, field(6, 8)?)?;
        date.and_hms_opt(field(8, 10)?, field(10, 12)?, field(12, 14)?)
    }

    /// Epoch millis of a 14-digit timestamp, read in `tz` or in UTC when absent.
    pub fn parse_to_epoch_millis(ts: &str, tz: Option<&TimeZoneSpec>) -> Option<i64> {
        let local = Self::parse_naive(ts)?;
        let instant = match tz {
            Some(tz) => tz.from_local(local)?,
            None => local.and_utc(),
        };
        Some(instant.timestamp_millis())
    }

    pub fn floor_to_resolution(
        ts: &str,
        resolution: Resolution,
        first_day_of_week: FirstDayOfWeek,
    ) -> Option<NaiveDateTime> {
        Self::parse_naive(ts).map(|local| Self::floor_naive(local, resolution, first_day_of_week))
    }

    /// Truncates a wall-clock time to the start of its bucket.
    pub fn floor_naive(
        local: NaiveDateTime,
        resolution: Resolution,
        first_day_of_week: FirstDayOfWeek,
    ) -> NaiveDateTime {
        let date = local.date();
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        match resolution {
            Resolution::Year => first_of(date.year(), 1),
            Resolution::Month => first_of(date.year(), date.month()),
            Resolution::Week => {
                let current = date.weekday().num_days_from_sunday() as i64;
                let first = first_day_of_week.weekday().num_days_from_sunday() as i64;
                midnight - Duration::days((current - first).rem_euclid(7))
            }
            Resolution::Day => midnight,
            Resolution::Hour => midnight + Duration::hours(local.hour() as i64),
            Resolution::Min1 | Resolution::Raw | Resolution::Period => floor_minutes(local, 1),
            Resolution::Min5 => floor_minutes(local, 5),
            Resolution::Min10 => floor_minutes(local, 10),
            Resolution::Min15 => floor_minutes(local, 15),
            Resolution::Min30 => floor_minutes(local, 30),
            Resolution::Sec10 => floor_seconds(local, 10),
            Resolution::Sec15 => floor_seconds(local, 15),
        }
    }
}

fn first_of(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
}

fn floor_minutes(local: NaiveDateTime, every: u32) -> NaiveDateTime {
    let minute = local.minute() - local.minute() % every;
    local.date().and_time(chrono::NaiveTime::MIN)
        + Duration::hours(local.hour() as i64)
        + Duration::minutes(minute as i64)
}

fn floor_seconds(local: NaiveDateTime, every: u32) -> NaiveDateTime {
    let second = local.second() - local.second() % every;
    floor_minutes(local, 1) + Duration::seconds(second as i64)
}
