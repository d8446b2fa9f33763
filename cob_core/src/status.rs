//! Current COB/IOB snapshot.
//!
//! Recomputed from the full entry list on every call; nothing is cached
//! between calls.

use crate::aggregate::{aggregate, minutes_between};
use crate::{CobLevel, CobStatus, EngineConfig, InsulinPhase, LogEntry};
use chrono::{DateTime, Utc};

/// Half-width of the window around the insulin peak reported as `Peak`
pub const PEAK_WINDOW_MINUTES: f64 = 15.0;

/// Compute the status snapshot at `now`
pub fn compute_status(
    entries: &[LogEntry],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> CobStatus {
    let totals = aggregate(entries, now, config);

    let estimated_glucose_impact = totals.carbs_remaining * config.carb_to_glucose_factor
        - totals.insulin_remaining * config.insulin_to_glucose_factor;

    let status = CobStatus {
        evaluated_at: now,
        current_cob: totals.carbs_remaining,
        insulin_on_board: totals.insulin_remaining,
        estimated_glucose_impact,
        time_to_zero_minutes: time_to_zero(entries, config, now),
        cob_level: CobLevel::from_grams(totals.carbs_remaining),
        insulin_phase: insulin_phase(entries, config, now),
        active_entries: totals.active,
    };

    tracing::debug!(
        "Status at {}: COB {:.1}g, IOB {:.2}u, {} active entries",
        now,
        status.current_cob,
        status.insulin_on_board,
        status.active_entries.len()
    );

    status
}

/// Minutes until every entry active at `now` has fully cleared.
///
/// Each substance stops contributing exactly when its window ends, so the
/// answer is the latest window end among the active entries. Entries logged
/// after `now` are not counted.
pub fn time_to_zero(entries: &[LogEntry], config: &EngineConfig, now: DateTime<Utc>) -> f64 {
    entries
        .iter()
        .filter_map(|entry| {
            let elapsed = minutes_between(entry.timestamp, now);
            if elapsed < 0.0 {
                return None;
            }

            let carbs_left = if entry.effective_carbs() > 0.0 {
                config.carb_absorption_minutes - elapsed
            } else {
                0.0
            };
            let insulin_left = if entry.effective_insulin() > 0.0 {
                config.insulin_action_minutes - elapsed
            } else {
                0.0
            };

            Some(carbs_left.max(insulin_left))
        })
        .fold(0.0, f64::max)
}

/// Phase of the most recent insulin dose still inside its action window
pub fn insulin_phase(
    entries: &[LogEntry],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> InsulinPhase {
    let latest_dose = entries
        .iter()
        .filter(|entry| entry.effective_insulin() > 0.0)
        .map(|entry| minutes_between(entry.timestamp, now))
        .filter(|elapsed| *elapsed >= 0.0 && *elapsed < config.insulin_action_minutes)
        .fold(None, |best: Option<f64>, elapsed| match best {
            Some(b) if b <= elapsed => Some(b),
            _ => Some(elapsed),
        });

    match latest_dose {
        None => InsulinPhase::None,
        Some(elapsed) if elapsed < config.insulin_peak_minutes - PEAK_WINDOW_MINUTES => {
            InsulinPhase::Rising
        }
        Some(elapsed) if elapsed < config.insulin_peak_minutes + PEAK_WINDOW_MINUTES => {
            InsulinPhase::Peak
        }
        Some(_) => InsulinPhase::Falling,
    }
}

/// One-line summary of insulin activity, e.g. "Insulin at peak - 2.4u active"
pub fn describe_insulin_activity(status: &CobStatus) -> String {
    let label = match status.insulin_phase {
        InsulinPhase::None => return "No active insulin".to_string(),
        InsulinPhase::Rising => "Insulin rising",
        InsulinPhase::Peak => "Insulin at peak",
        InsulinPhase::Falling => "Insulin falling",
    };

    if status.insulin_on_board <= 0.0 {
        return "No active insulin".to_string();
    }

    format!("{} - {:.1}u active", label, status.insulin_on_board)
}
