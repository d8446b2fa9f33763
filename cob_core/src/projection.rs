//! Forward projections of COB/IOB for charting.

use crate::aggregate::{aggregate, entry_remaining};
use crate::config::MAX_DURATION_MINUTES;
use crate::status::PEAK_WINDOW_MINUTES;
use crate::{EngineConfig, InsulinActivityPoint, LogEntry, ProjectionPoint};
use chrono::{DateTime, Duration, Utc};

/// Sample spacing of a single dose's activity timeline
pub const TIMELINE_STEP_MINUTES: i64 = 15;

/// Project COB/IOB forward from `now`.
///
/// Returns `steps` points spaced `step_minutes` apart, the first at `now`.
/// Every point is evaluated against the same entry snapshot. A non-positive
/// `steps` or `step_minutes` yields an empty projection. The sequence ends
/// early at the first point whose time cannot be represented.
pub fn project(
    entries: &[LogEntry],
    config: &EngineConfig,
    now: DateTime<Utc>,
    steps: i64,
    step_minutes: i64,
) -> Vec<ProjectionPoint> {
    if steps <= 0 || step_minutes <= 0 {
        tracing::debug!(
            "Empty projection requested (steps={}, step_minutes={})",
            steps,
            step_minutes
        );
        return Vec::new();
    }

    let points: Vec<ProjectionPoint> = (0..steps)
        .map_while(|i| offset_time(now, i.checked_mul(step_minutes)?))
        .map(|time| {
            let totals = aggregate(entries, time, config);
            ProjectionPoint {
                time,
                cob: totals.carbs_remaining,
                iob: totals.insulin_remaining,
            }
        })
        .collect();

    if (points.len() as i64) < steps {
        tracing::debug!(
            "Projection truncated to {} of {} points (step_minutes={})",
            points.len(),
            steps,
            step_minutes
        );
    }

    points
}

/// `start` shifted by `minutes`, or `None` when out of range
fn offset_time(start: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::try_minutes(minutes)?)
}

/// Activity timeline for one dose, sampled every 15 minutes from the time it
/// was logged through `duration_minutes` inclusive.
///
/// `duration_minutes` is capped at `MAX_DURATION_MINUTES`.
pub fn insulin_timeline(
    entry: &LogEntry,
    config: &EngineConfig,
    duration_minutes: i64,
) -> Vec<InsulinActivityPoint> {
    if duration_minutes < 0 {
        return Vec::new();
    }

    let dose = entry.effective_insulin();
    let duration_minutes = duration_minutes.min(MAX_DURATION_MINUTES as i64);

    (0..=duration_minutes / TIMELINE_STEP_MINUTES)
        .map(|i| i * TIMELINE_STEP_MINUTES)
        .map_while(|offset| Some((offset, offset_time(entry.timestamp, offset)?)))
        .map(|(offset, time)| {
            let (_, remaining_units) = entry_remaining(entry, offset as f64, config);
            let percentage_remaining = if dose > 0.0 {
                remaining_units / dose * 100.0
            } else {
                0.0
            };

            InsulinActivityPoint {
                time,
                remaining_units,
                percentage_remaining,
                is_peak: (offset as f64 - config.insulin_peak_minutes).abs()
                    <= PEAK_WINDOW_MINUTES,
            }
        })
        .collect()
}
