//! Decay curves for carbohydrate absorption and insulin action.
//!
//! Both substances use the same curve family with independent parameters:
//! the exponential activity model, where activity rises from zero to a peak
//! and falls back to zero exactly at the end of the active window.
//! The fraction still on board is one minus the integral of that activity.
//!
//! With `td` the total active time and `tp` the peak time:
//! - `tau = tp * (1 - tp/td) / (1 - 2*tp/td)`
//! - `a = 2 * tau / td`
//! - `S = 1 / (1 - a + (1 + a) * exp(-td/tau))`
//! - `remaining(t) = 1 - S * (1 - a) * ((t^2 / (tau*td*(1 - a)) - t/tau - 1) * exp(-t/tau) + 1)`
//!
//! The shape requires `0 < tp < td/2`. Outside that range the curve
//! degrades to a straight line from 1 to 0 over `td`.

/// Curve parameters derived once per (duration, peak) pair
#[derive(Clone, Copy, Debug)]
struct ExponentialCurve {
    total: f64,
    tau: f64,
    a: f64,
    s: f64,
}

impl ExponentialCurve {
    fn new(total: f64, peak: f64) -> Option<Self> {
        if !(total.is_finite() && peak.is_finite()) || peak <= 0.0 || peak * 2.0 >= total {
            return None;
        }

        let tau = peak * (1.0 - peak / total) / (1.0 - 2.0 * peak / total);
        let a = 2.0 * tau / total;
        let s = 1.0 / (1.0 - a + (1.0 + a) * (-total / tau).exp());

        if !(tau.is_finite() && s.is_finite()) {
            return None;
        }

        Some(Self { total, tau, a, s })
    }

    fn remaining(&self, t: f64) -> f64 {
        let Self { total, tau, a, s } = *self;
        let bracket = (t * t / (tau * total * (1.0 - a)) - t / tau - 1.0) * (-t / tau).exp() + 1.0;
        1.0 - s * (1.0 - a) * bracket
    }
}

/// Fraction of a dose still active after `elapsed_minutes`.
///
/// Returns 1.0 at or before the dose time and 0.0 once the full active
/// window has passed. In between the value is continuous and
/// non-increasing, shaped by `peak_minutes`.
pub fn remaining_fraction(
    elapsed_minutes: f64,
    total_active_minutes: f64,
    peak_minutes: f64,
) -> f64 {
    if elapsed_minutes.is_nan() || elapsed_minutes <= 0.0 {
        return 1.0;
    }
    if !(elapsed_minutes < total_active_minutes) {
        return 0.0;
    }

    let fraction = match ExponentialCurve::new(total_active_minutes, peak_minutes) {
        Some(curve) => curve.remaining(elapsed_minutes),
        None => 1.0 - elapsed_minutes / total_active_minutes,
    };

    fraction.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARB_T: f64 = 180.0;
    const CARB_P: f64 = 45.0;
    const INSULIN_T: f64 = 240.0;
    const INSULIN_P: f64 = 75.0;

    #[test]
    fn test_full_at_dose_time() {
        assert_eq!(remaining_fraction(0.0, CARB_T, CARB_P), 1.0);
        assert_eq!(remaining_fraction(0.0, INSULIN_T, INSULIN_P), 1.0);
    }

    #[test]
    fn test_future_dose_is_full() {
        assert_eq!(remaining_fraction(-30.0, CARB_T, CARB_P), 1.0);
    }

    #[test]
    fn test_cleared_at_and_after_window() {
        for t in [CARB_T, CARB_T + 0.5, 1_000.0] {
            assert_eq!(remaining_fraction(t, CARB_T, CARB_P), 0.0);
        }
        assert_eq!(remaining_fraction(INSULIN_T, INSULIN_T, INSULIN_P), 0.0);
    }

    #[test]
    fn test_monotonic_non_increasing() {
        for (total, peak) in [(CARB_T, CARB_P), (INSULIN_T, INSULIN_P), (300.0, 20.0)] {
            let mut prev = remaining_fraction(0.0, total, peak);
            let mut t = 0.0;
            while t <= total + 5.0 {
                let current = remaining_fraction(t, total, peak);
                assert!(
                    current <= prev,
                    "curve increased at t={} ({} > {})",
                    t,
                    current,
                    prev
                );
                assert!((0.0..=1.0).contains(&current));
                prev = current;
                t += 1.0;
            }
        }
    }

    #[test]
    fn test_continuous_near_end_of_window() {
        let just_before = remaining_fraction(CARB_T - 0.01, CARB_T, CARB_P);
        assert!(just_before < 1e-6);
    }

    #[test]
    fn test_peak_shapes_the_curve() {
        // An earlier peak clears more of the dose by the same instant
        let early = remaining_fraction(60.0, 240.0, 55.0);
        let late = remaining_fraction(60.0, 240.0, 100.0);
        assert!(early < late);
    }

    #[test]
    fn test_invalid_peak_falls_back_to_linear() {
        assert!((remaining_fraction(60.0, 120.0, 90.0) - 0.5).abs() < 1e-12);
        assert!((remaining_fraction(30.0, 120.0, 0.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_duration_window() {
        assert_eq!(remaining_fraction(0.0, 0.0, 0.0), 1.0);
        assert_eq!(remaining_fraction(1.0, 0.0, 0.0), 0.0);
    }
}
