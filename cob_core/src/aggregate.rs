//! Sums the still-active part of every logged entry at one instant.

use crate::decay::remaining_fraction;
use crate::{ActiveEntry, EngineConfig, LogEntry};
use chrono::{DateTime, Utc};

/// Combined remaining amount (grams + units) below which an entry is not
/// listed as active. Only affects the active list, never the totals.
pub const ACTIVE_ENTRY_EPSILON: f64 = 1e-3;

/// Totals and contributing entries at one instant
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub carbs_remaining: f64,
    pub insulin_remaining: f64,
    /// Newest first
    pub active: Vec<ActiveEntry>,
}

/// Minutes from `from` to `to`, negative if `to` is earlier
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Remaining carbs and insulin of a single entry `elapsed` minutes after it
/// was logged. Negative quantities count as zero.
pub fn entry_remaining(entry: &LogEntry, elapsed: f64, config: &EngineConfig) -> (f64, f64) {
    let carbs = entry.effective_carbs()
        * remaining_fraction(
            elapsed,
            config.carb_absorption_minutes,
            config.carb_peak_minutes,
        );
    let insulin = entry.effective_insulin()
        * remaining_fraction(
            elapsed,
            config.insulin_action_minutes,
            config.insulin_peak_minutes,
        );
    (carbs, insulin)
}

/// Aggregate all entries at `at`.
///
/// Entries logged after `at` are not active yet and entries older than the
/// longest window are fully cleared; both are skipped. Malformed entries
/// (negative or non-finite amounts) are clamped to zero with a warning
/// instead of failing the whole computation.
pub fn aggregate(entries: &[LogEntry], at: DateTime<Utc>, config: &EngineConfig) -> Aggregate {
    let max_active = config.max_active_minutes();
    let mut carbs_total = 0.0;
    let mut insulin_total = 0.0;
    let mut active = Vec::new();

    for entry in entries {
        let elapsed = minutes_between(entry.timestamp, at);
        if elapsed < 0.0 || elapsed >= max_active {
            continue;
        }

        if entry.is_malformed() {
            tracing::warn!(
                "Entry {} has invalid amounts (carbs={}, insulin={}), clamping to zero",
                entry.id,
                entry.carbs,
                entry.insulin
            );
        }

        let (carbs, insulin) = entry_remaining(entry, elapsed, config);
        carbs_total += carbs;
        insulin_total += insulin;

        if carbs + insulin > ACTIVE_ENTRY_EPSILON {
            active.push(ActiveEntry {
                entry: entry.clone(),
                carbs_remaining: carbs,
                insulin_remaining: insulin,
            });
        }
    }

    // Stable sort keeps input order for identical timestamps
    active.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));

    Aggregate {
        carbs_remaining: carbs_total.max(0.0),
        insulin_remaining: insulin_total.max(0.0),
        active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn scenario_config() -> EngineConfig {
        EngineConfig {
            carb_absorption_minutes: 180.0,
            insulin_action_minutes: 240.0,
            carb_peak_minutes: 45.0,
            insulin_peak_minutes: 75.0,
            carb_to_glucose_factor: 0.05,
            insulin_to_glucose_factor: 2.0,
        }
    }

    fn entry(id: &str, minutes_ago: i64, carbs: f64, insulin: f64) -> LogEntry {
        LogEntry::new(id, now() - Duration::minutes(minutes_ago), carbs, insulin, "Meal")
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(&[], now(), &scenario_config());
        assert_eq!(result, Aggregate::default());
    }

    #[test]
    fn test_single_meal_partially_absorbed() {
        let entries = vec![entry("a", 60, 60.0, 6.0)];
        let result = aggregate(&entries, now(), &scenario_config());

        assert!(result.carbs_remaining > 0.0 && result.carbs_remaining < 60.0);
        assert!(result.insulin_remaining > 0.0 && result.insulin_remaining < 6.0);
        assert_eq!(result.active.len(), 1);
        assert_eq!(result.active[0].entry.id, "a");
    }

    #[test]
    fn test_entry_at_now_is_fully_active() {
        let entries = vec![entry("a", 0, 30.0, 3.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        assert_eq!(result.carbs_remaining, 30.0);
        assert_eq!(result.insulin_remaining, 3.0);
    }

    #[test]
    fn test_future_entry_contributes_nothing() {
        let entries = vec![entry("future", -30, 50.0, 5.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        assert_eq!(result.carbs_remaining, 0.0);
        assert_eq!(result.insulin_remaining, 0.0);
        assert!(result.active.is_empty());
    }

    #[test]
    fn test_expired_entry_contributes_nothing() {
        let entries = vec![entry("old", 300, 60.0, 6.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        assert_eq!(result.carbs_remaining, 0.0);
        assert_eq!(result.insulin_remaining, 0.0);
        assert!(result.active.is_empty());
    }

    #[test]
    fn test_carbs_expire_before_insulin() {
        // Between the carb and insulin windows only insulin remains
        let entries = vec![entry("a", 200, 60.0, 6.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        assert_eq!(result.carbs_remaining, 0.0);
        assert!(result.insulin_remaining > 0.0);
        assert_eq!(result.active.len(), 1);
    }

    #[test]
    fn test_additivity() {
        let a = entry("a", 30, 40.0, 2.0);
        let b = entry("b", 95, 25.0, 3.5);
        let config = scenario_config();

        let both = aggregate(&[a.clone(), b.clone()], now(), &config);
        let only_a = aggregate(&[a], now(), &config);
        let only_b = aggregate(&[b], now(), &config);

        assert!(
            (both.carbs_remaining - (only_a.carbs_remaining + only_b.carbs_remaining)).abs()
                < 1e-9
        );
        assert!(
            (both.insulin_remaining - (only_a.insulin_remaining + only_b.insulin_remaining))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_identical_timestamps_are_summed() {
        let entries = vec![entry("a", 45, 20.0, 0.0), entry("b", 45, 20.0, 0.0)];
        let single = aggregate(&entries[..1], now(), &scenario_config());
        let result = aggregate(&entries, now(), &scenario_config());

        assert!((result.carbs_remaining - 2.0 * single.carbs_remaining).abs() < 1e-9);
        assert_eq!(result.active.len(), 2);
        // Ties keep input order
        assert_eq!(result.active[0].entry.id, "a");
        assert_eq!(result.active[1].entry.id, "b");
    }

    #[test]
    fn test_active_list_newest_first() {
        let entries = vec![
            entry("oldest", 120, 10.0, 1.0),
            entry("newest", 5, 10.0, 1.0),
            entry("middle", 60, 10.0, 1.0),
        ];
        let result = aggregate(&entries, now(), &scenario_config());
        let ids: Vec<_> = result.active.iter().map(|a| a.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_zero_entry_is_not_listed() {
        let entries = vec![entry("empty", 10, 0.0, 0.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        assert_eq!(result.carbs_remaining, 0.0);
        assert!(result.active.is_empty());
    }

    #[test]
    fn test_negative_amounts_are_clamped() {
        crate::logging::init_test();
        let entries = vec![entry("bad", 30, -40.0, -2.0), entry("good", 30, 40.0, 2.0)];
        let good_only = aggregate(&entries[1..], now(), &scenario_config());
        let result = aggregate(&entries, now(), &scenario_config());

        assert_eq!(result.carbs_remaining, good_only.carbs_remaining);
        assert_eq!(result.insulin_remaining, good_only.insulin_remaining);
        assert_eq!(result.active.len(), 1);
        assert_eq!(result.active[0].entry.id, "good");
    }

    #[test]
    fn test_per_entry_amounts_sum_to_totals() {
        let entries = vec![entry("a", 20, 30.0, 3.0), entry("b", 80, 50.0, 1.0)];
        let result = aggregate(&entries, now(), &scenario_config());
        let carbs: f64 = result.active.iter().map(|a| a.carbs_remaining).sum();
        let insulin: f64 = result.active.iter().map(|a| a.insulin_remaining).sum();
        assert!((carbs - result.carbs_remaining).abs() < 1e-9);
        assert!((insulin - result.insulin_remaining).abs() < 1e-9);
    }
}
