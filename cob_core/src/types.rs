//! Core domain types for the COB/IOB engine.
//!
//! This module defines the values that flow through the engine:
//! - Log entries (meals, insulin doses) handed in by the notes collaborator
//! - Derived status snapshots and projection points for display
//! - Glucose prediction and bolus suggestion results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Input Types
// ============================================================================

/// One logged meal and/or insulin event.
///
/// Owned by the notes collaborator; the engine only ever reads a snapshot.
/// Field names follow the notes JSON format (`mealType`, `glucoseValue`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Carbohydrate, grams
    #[serde(default)]
    pub carbs: f64,
    /// Insulin, units
    #[serde(default)]
    pub insulin: f64,
    #[serde(default)]
    pub meal_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub glucose_value: Option<f64>,
}

impl LogEntry {
    /// Build an entry with no comment or glucose reading attached
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        carbs: f64,
        insulin: f64,
        meal_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            carbs,
            insulin,
            meal_type: meal_type.into(),
            comment: None,
            glucose_value: None,
        }
    }

    /// Carbs with negative or non-finite values treated as zero
    pub fn effective_carbs(&self) -> f64 {
        sanitize_amount(self.carbs)
    }

    /// Insulin with negative or non-finite values treated as zero
    pub fn effective_insulin(&self) -> f64 {
        sanitize_amount(self.insulin)
    }

    /// True if either quantity had to be clamped
    pub fn is_malformed(&self) -> bool {
        self.effective_carbs() != self.carbs || self.effective_insulin() != self.insulin
    }
}

fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ============================================================================
// Derived Types
// ============================================================================

/// An entry still contributing at the evaluation instant
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ActiveEntry {
    pub entry: LogEntry,
    pub carbs_remaining: f64,
    pub insulin_remaining: f64,
}

/// Coarse carbs-on-board bucket for at-a-glance display
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CobLevel {
    None,
    Low,
    Moderate,
    High,
}

impl CobLevel {
    pub fn from_grams(cob: f64) -> Self {
        if cob <= 0.0 {
            CobLevel::None
        } else if cob < 5.0 {
            CobLevel::Low
        } else if cob < 15.0 {
            CobLevel::Moderate
        } else {
            CobLevel::High
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CobLevel::None => "No carbs on board",
            CobLevel::Low => "Low carbs on board",
            CobLevel::Moderate => "Moderate carbs on board",
            CobLevel::High => "High carbs on board",
        }
    }
}

/// Where the most recent active insulin dose sits on its action curve
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsulinPhase {
    None,
    Rising,
    Peak,
    Falling,
}

/// Current snapshot, recomputed from scratch on every call
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CobStatus {
    pub evaluated_at: DateTime<Utc>,
    pub current_cob: f64,
    pub insulin_on_board: f64,
    /// Newest first
    pub active_entries: Vec<ActiveEntry>,
    /// Carbs push up, insulin pushes down
    pub estimated_glucose_impact: f64,
    pub time_to_zero_minutes: f64,
    pub cob_level: CobLevel,
    pub insulin_phase: InsulinPhase,
}

/// One sample of a forward projection
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProjectionPoint {
    pub time: DateTime<Utc>,
    pub cob: f64,
    pub iob: f64,
}

/// One sample of a single dose's insulin activity curve
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InsulinActivityPoint {
    pub time: DateTime<Utc>,
    pub remaining_units: f64,
    pub percentage_remaining: f64,
    pub is_peak: bool,
}

// ============================================================================
// Prediction Types
// ============================================================================

/// Direction of the predicted glucose change
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseTrend {
    Rising,
    Stable,
    Falling,
}

/// Contributions (mmol/L) that add up to the predicted change
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PredictionFactors {
    pub carb_contribution: f64,
    pub insulin_contribution: f64,
    pub baseline_contribution: f64,
    pub trend_contribution: f64,
}

impl PredictionFactors {
    pub fn total(&self) -> f64 {
        self.carb_contribution
            + self.insulin_contribution
            + self.baseline_contribution
            + self.trend_contribution
    }
}

/// Glucose estimate at a horizon, with the on-board values behind it
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GlucosePrediction {
    pub calculated_at: DateTime<Utc>,
    pub horizon_minutes: i64,
    pub current_glucose: f64,
    pub predicted_glucose: f64,
    pub trend: GlucoseTrend,
    pub confidence: f64,
    pub active_cob: f64,
    pub active_iob: f64,
    pub future_cob: f64,
    pub future_iob: f64,
    pub factors: PredictionFactors,
}
