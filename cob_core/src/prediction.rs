//! Glucose prediction and bolus suggestions built on the COB/IOB totals.
//!
//! Glucose values are in mmol/L. These are dashboard heuristics, not dosing
//! advice.

use crate::aggregate::{aggregate, Aggregate};
use crate::{EngineConfig, GlucosePrediction, GlucoseTrend, LogEntry, PredictionFactors};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_HORIZON_MINUTES: i64 = 120;

const MIN_PREDICTED_GLUCOSE: f64 = 1.0;
const MAX_PREDICTED_GLUCOSE: f64 = 25.0;

/// Net change (mmol/L) beyond which the trend is no longer stable
const TREND_THRESHOLD: f64 = 0.5;

const CONFIDENCE_HIGH: f64 = 0.9;
const CONFIDENCE_MEDIUM: f64 = 0.7;
const CONFIDENCE_LOW: f64 = 0.5;

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Predict glucose `horizon_minutes` after `now`.
///
/// The carb and insulin contributions use the full amounts on board now;
/// the COB/IOB left at the horizon are reported alongside for context.
/// A horizon too far out to represent leaves nothing on board there.
pub fn predict_glucose(
    current_glucose: f64,
    entries: &[LogEntry],
    config: &EngineConfig,
    now: DateTime<Utc>,
    horizon_minutes: i64,
) -> GlucosePrediction {
    let current = aggregate(entries, now, config);
    let future = match Duration::try_minutes(horizon_minutes)
        .and_then(|horizon| now.checked_add_signed(horizon))
    {
        Some(at) => aggregate(entries, at, config),
        None => {
            tracing::debug!("Horizon of {} min is out of range", horizon_minutes);
            Aggregate::default()
        }
    };

    let factors = PredictionFactors {
        carb_contribution: round_to(current.carbs_remaining * config.carb_to_glucose_factor, 2),
        insulin_contribution: round_to(
            -current.insulin_remaining * config.insulin_to_glucose_factor,
            2,
        ),
        baseline_contribution: 0.0,
        trend_contribution: 0.0,
    };

    let net = factors.total();
    let predicted = (current_glucose + net).clamp(MIN_PREDICTED_GLUCOSE, MAX_PREDICTED_GLUCOSE);

    let trend = if net > TREND_THRESHOLD {
        GlucoseTrend::Rising
    } else if net < -TREND_THRESHOLD {
        GlucoseTrend::Falling
    } else {
        GlucoseTrend::Stable
    };

    let carb_entries = current
        .active
        .iter()
        .filter(|a| a.carbs_remaining > 0.0)
        .count();
    let insulin_entries = current
        .active
        .iter()
        .filter(|a| a.insulin_remaining > 0.0)
        .count();

    tracing::debug!(
        "Prediction over {} min: {:.1} -> {:.1} mmol/L (net {:+.2})",
        horizon_minutes,
        current_glucose,
        predicted,
        net
    );

    GlucosePrediction {
        calculated_at: now,
        horizon_minutes,
        current_glucose,
        predicted_glucose: round_to(predicted, 1),
        trend,
        confidence: round_to(confidence(carb_entries, insulin_entries, current_glucose), 2),
        active_cob: round_to(current.carbs_remaining, 1),
        active_iob: round_to(current.insulin_remaining, 2),
        future_cob: round_to(future.carbs_remaining, 1),
        future_iob: round_to(future.insulin_remaining, 2),
        factors,
    }
}

/// More logged data raises confidence; extreme glucose lowers it
fn confidence(carb_entries: usize, insulin_entries: usize, current_glucose: f64) -> f64 {
    let mut confidence = if carb_entries > 3 || insulin_entries > 3 {
        CONFIDENCE_HIGH
    } else if carb_entries == 0 && insulin_entries == 0 {
        CONFIDENCE_LOW
    } else {
        CONFIDENCE_MEDIUM
    };

    if !(3.0..=15.0).contains(&current_glucose) {
        confidence *= 0.8;
    }

    confidence.max(CONFIDENCE_LOW)
}

/// Suggested insulin units for a meal and/or correction.
///
/// Covers the carbs' glucose impact, corrects down to `target_glucose` when
/// above it, and subtracts what is already on board. Never negative.
pub fn recommend_bolus(
    carbs: f64,
    current_glucose: f64,
    target_glucose: f64,
    insulin_on_board: f64,
    config: &EngineConfig,
) -> f64 {
    let carbs = if carbs.is_finite() { carbs.max(0.0) } else { 0.0 };

    let mut units = carbs * config.carb_to_glucose_factor / config.insulin_to_glucose_factor;

    if current_glucose > target_glucose {
        units += (current_glucose - target_glucose) / config.insulin_to_glucose_factor;
    }

    round_to((units - insulin_on_board.max(0.0)).max(0.0), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, minutes_ago: i64, carbs: f64, insulin: f64) -> LogEntry {
        LogEntry::new(id, now() - Duration::minutes(minutes_ago), carbs, insulin, "Meal")
    }

    #[test]
    fn test_no_entries_is_stable_with_low_confidence() {
        let prediction = predict_glucose(6.0, &[], &EngineConfig::default(), now(), 120);
        assert_eq!(prediction.predicted_glucose, 6.0);
        assert_eq!(prediction.trend, GlucoseTrend::Stable);
        assert_eq!(prediction.confidence, 0.5);
        assert_eq!(prediction.active_cob, 0.0);
        assert_eq!(prediction.factors.total(), 0.0);
    }

    #[test]
    fn test_fresh_carbs_predict_rise() {
        // 20 g at 0.2 mmol/L per gram = +4.0
        let entries = vec![entry("juice", 0, 20.0, 0.0)];
        let prediction = predict_glucose(5.0, &entries, &EngineConfig::default(), now(), 120);

        assert_eq!(prediction.factors.carb_contribution, 4.0);
        assert_eq!(prediction.predicted_glucose, 9.0);
        assert_eq!(prediction.trend, GlucoseTrend::Rising);
        assert_eq!(prediction.confidence, 0.7);
        assert!(prediction.future_cob < prediction.active_cob);
    }

    #[test]
    fn test_fresh_insulin_predicts_fall() {
        let entries = vec![entry("correction", 0, 0.0, 2.0)];
        let prediction = predict_glucose(10.0, &entries, &EngineConfig::default(), now(), 120);

        assert_eq!(prediction.factors.insulin_contribution, -2.0);
        assert_eq!(prediction.predicted_glucose, 8.0);
        assert_eq!(prediction.trend, GlucoseTrend::Falling);
    }

    #[test]
    fn test_prediction_is_clamped() {
        let entries = vec![entry("big", 0, 0.0, 20.0)];
        let low = predict_glucose(4.0, &entries, &EngineConfig::default(), now(), 120);
        assert_eq!(low.predicted_glucose, 1.0);

        let entries = vec![entry("feast", 0, 200.0, 0.0)];
        let high = predict_glucose(12.0, &entries, &EngineConfig::default(), now(), 120);
        assert_eq!(high.predicted_glucose, 25.0);
    }

    #[test]
    fn test_out_of_range_horizon_leaves_nothing_on_board() {
        let entries = vec![entry("juice", 0, 20.0, 1.0)];
        let config = EngineConfig::default();

        for horizon in [i64::MAX, i64::MIN, 1_000_000_000_000] {
            let prediction = predict_glucose(6.0, &entries, &config, now(), horizon);
            assert_eq!(prediction.horizon_minutes, horizon);
            assert_eq!(prediction.active_cob, 20.0);
            assert_eq!(prediction.future_cob, 0.0);
            assert_eq!(prediction.future_iob, 0.0);
        }

        let empty = predict_glucose(6.0, &[], &config, now(), i64::MAX);
        assert_eq!(empty.predicted_glucose, 6.0);
    }

    #[test]
    fn test_confidence_rules() {
        assert_eq!(confidence(0, 0, 6.0), CONFIDENCE_LOW);
        assert_eq!(confidence(1, 1, 6.0), CONFIDENCE_MEDIUM);
        assert_eq!(confidence(4, 0, 6.0), CONFIDENCE_HIGH);
        assert!((confidence(4, 0, 18.0) - 0.72).abs() < 1e-12);
        // Never below the floor
        assert_eq!(confidence(0, 0, 2.0), CONFIDENCE_LOW);
    }

    #[test]
    fn test_recommend_bolus_covers_carbs_and_correction() {
        let config = EngineConfig::default();
        // 50 g * 0.2 / 1.0 = 10 units, plus (9 - 6) / 1.0 = 3
        assert_eq!(recommend_bolus(50.0, 9.0, 6.0, 0.0, &config), 13.0);
        // Below target: no correction
        assert_eq!(recommend_bolus(50.0, 5.0, 6.0, 0.0, &config), 10.0);
        // Insulin on board is subtracted
        assert_eq!(recommend_bolus(50.0, 5.0, 6.0, 2.5, &config), 7.5);
    }

    #[test]
    fn test_recommend_bolus_never_negative() {
        let config = EngineConfig::default();
        assert_eq!(recommend_bolus(0.0, 5.0, 6.0, 3.0, &config), 0.0);
        assert_eq!(recommend_bolus(-20.0, 5.0, 6.0, 0.0, &config), 0.0);
    }
}
