//! Per-series corrections: ordering, in-progress bucket stamping, gap filling.

use chrono::{DateTime, Months, NaiveDateTime, Utc};
use tracing::warn;

use crate::core::util::timestamp_codec::{TimeZoneSpec, TimestampCodec};
use crate::domain::common::model::{FirstDayOfWeek, Resolution};
use crate::domain::query::dto::result_frame::SeriesPoint;

/// Upper bound on synthesized grid slots for one series.
pub const MAX_GRID_POINTS: usize = 100_000;

/// Explicit settings of one reconstruction pass.
#[derive(Debug, Clone)]
pub struct ReconstructionSettings {
    pub resolution: Resolution,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub timezone: TimeZoneSpec,
    pub complete_series_with_zeros: bool,
    pub progress_last_data_point: bool,
    /// Semantic period the request was sent with (empty for absolute ranges).
    pub selected_period: String,
    pub first_day_of_week: FirstDayOfWeek,
}

/// Ascending by timestamp; stable, unreadable timestamps first.
pub fn sort_points(points: &mut [SeriesPoint]) {
    points.sort_by_key(|p| p.time());
}

/// Re-stamps the last point at the range end when it lies less than one
/// bucket before it (the bucket is still in progress).
pub fn progress_last_point(points: &mut [SeriesPoint], settings: &ReconstructionSettings) {
    let to = settings.to.timestamp_millis();
    let step = settings.resolution.step_millis();
    if let Some(last) = points.last_mut() {
        if let Some(time) = last.time() {
            let behind = to - time;
            if (0..step).contains(&behind) {
                last.1 = Some(to);
            }
        }
    }
}

/// Bucket key of an epoch timestamp: its floored wall-clock time.
fn bucket_key(time: Option<i64>, settings: &ReconstructionSettings) -> Option<NaiveDateTime> {
    let instant = DateTime::from_timestamp_millis(time?)?;
    Some(TimestampCodec::floor_naive(
        settings.timezone.to_local(instant)?,
        settings.resolution,
        settings.first_day_of_week,
    ))
}

fn advance(slot: NaiveDateTime, resolution: Resolution) -> Option<NaiveDateTime> {
    match resolution {
        Resolution::Month => slot.checked_add_months(Months::new(1)),
        Resolution::Year => slot.checked_add_months(Months::new(12)),
        other => slot.checked_add_signed(other.step()),
    }
}

/// Expected buckets of a range as `(wall-clock key, epoch millis)`.
#[derive(Debug, Default)]
pub struct BucketGrid {
    pub slots: Vec<(NaiveDateTime, i64)>,
    /// Set when the range held more than [`MAX_GRID_POINTS`] buckets.
    pub truncated: bool,
}

/// Buckets between floor(from) and floor(to), inclusive. Wall-clock slots
/// skipped by DST do not exist.
pub fn bucket_grid(settings: &ReconstructionSettings) -> BucketGrid {
    let floor = |instant: DateTime<Utc>| {
        settings.timezone.to_local(instant).map(|local| {
            TimestampCodec::floor_naive(
                local,
                settings.resolution,
                settings.first_day_of_week,
            )
        })
    };
    let mut grid = BucketGrid::default();
    let (Some(start), Some(end)) = (floor(settings.from), floor(settings.to)) else {
        return grid;
    };

    let mut slot = Some(start);
    while let Some(current) = slot.filter(|s| *s <= end) {
        if grid.slots.len() >= MAX_GRID_POINTS {
            warn!(
                resolution = settings.resolution.as_code(),
                "Gap filling stopped after {} buckets", MAX_GRID_POINTS
            );
            grid.truncated = true;
            break;
        }
        if let Some(instant) = settings.timezone.from_local(current) {
            grid.slots.push((current, instant.timestamp_millis()));
        }
        slot = advance(current, settings.resolution);
    }
    grid
}

/// Gap-filled points; `truncated` when buckets past the cap were left out.
#[derive(Debug)]
pub struct FilledSeries {
    pub points: Vec<SeriesPoint>,
    pub truncated: bool,
}

/// Merges sorted `points` with the bucket grid, inserting `fill` wherever a
/// bucket has no point. Points match a bucket by calendar equality at the
/// resolution's granularity.
pub fn complete_with_fill(
    points: Vec<SeriesPoint>,
    settings: &ReconstructionSettings,
    fill: f64,
) -> FilledSeries {
    let BucketGrid { slots, truncated } = bucket_grid(settings);
    let keyed: Vec<(Option<NaiveDateTime>, SeriesPoint)> = points
        .into_iter()
        .map(|p| (bucket_key(p.time(), settings), p))
        .collect();

    let mut out = Vec::with_capacity(slots.len().max(keyed.len()));
    let mut actual = keyed.into_iter().peekable();

    for (slot, millis) in slots {
        while let Some((_, point)) = actual.next_if(|(key, _)| *key < Some(slot)) {
            out.push(point);
        }
        let mut matched = false;
        while let Some((_, point)) = actual.next_if(|(key, _)| *key == Some(slot)) {
            out.push(point);
            matched = true;
        }
        if !matched {
            out.push(SeriesPoint::new(fill, millis));
        }
    }
    out.extend(actual.map(|(_, point)| point));
    FilledSeries {
        points: out,
        truncated,
    }
}
