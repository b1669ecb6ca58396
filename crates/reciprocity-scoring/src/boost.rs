//! Activity and new-user multipliers derived from profile timestamps.

use chrono::{DateTime, Utc};

use reciprocity_core::defaults::{
    ACTIVITY_BOOST_MAX, ACTIVITY_BOOST_MIN, ACTIVITY_HALF_LIFE_DAYS, NEW_USER_BOOST_DAYS,
    NEW_USER_BOOST_MAX,
};
use reciprocity_core::MatchingConfig;

const SECONDS_PER_DAY: f32 = 86_400.0;

/// Computes boost multipliers. `now` is always passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostCalculator {
    pub half_life_days: f32,
    pub ramp_days: f32,
}

impl Default for BoostCalculator {
    fn default() -> Self {
        Self {
            half_life_days: ACTIVITY_HALF_LIFE_DAYS,
            ramp_days: NEW_USER_BOOST_DAYS,
        }
    }
}

impl BoostCalculator {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            half_life_days: config.activity_half_life_days,
            ramp_days: config.new_user_boost_days,
        }
    }

    /// `0.5 + exp(-ln2 / half_life * days_since_update)`, clamped to `[0.5, 1.5]`.
    pub fn activity_boost(&self, last_updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        activity_boost_for_days(days_between(last_updated_at, now), self.half_life_days)
    }

    /// Linear ramp from 1.3 at creation to 1.0 at `ramp_days`, 1.0 afterwards.
    pub fn temporal_boost(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        temporal_boost_for_days(days_between(created_at, now), self.ramp_days)
    }
}

/// Whole and fractional days from `from` to `now`; future timestamps count as 0.
fn days_between(from: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    ((now - from).num_seconds() as f32 / SECONDS_PER_DAY).max(0.0)
}

pub fn activity_boost_for_days(days_since: f32, half_life_days: f32) -> f32 {
    if half_life_days <= 0.0 {
        return ACTIVITY_BOOST_MIN;
    }
    let decay = (-std::f32::consts::LN_2 / half_life_days * days_since.max(0.0)).exp();
    (ACTIVITY_BOOST_MIN + decay).clamp(ACTIVITY_BOOST_MIN, ACTIVITY_BOOST_MAX)
}

pub fn temporal_boost_for_days(days_since: f32, ramp_days: f32) -> f32 {
    if ramp_days <= 0.0 || days_since >= ramp_days {
        return 1.0;
    }
    let progress = days_since.max(0.0) / ramp_days;
    NEW_USER_BOOST_MAX - (NEW_USER_BOOST_MAX - 1.0) * progress
}

/// `clamp(combined * intent_quality * activity * temporal, 0, 1)`.
pub fn final_score(combined: f32, intent_quality: f32, activity: f32, temporal: f32) -> f32 {
    let score = combined * intent_quality * activity * temporal;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn activity_today_is_max() {
        assert!(approx(activity_boost_for_days(0.0, 30.0), 1.5));
    }

    #[test]
    fn activity_one_half_life() {
        assert!(approx(activity_boost_for_days(30.0, 30.0), 1.0));
    }

    #[test]
    fn activity_stale_approaches_floor() {
        let boost = activity_boost_for_days(3650.0, 30.0);
        assert!(boost >= 0.5);
        assert!(approx(boost, 0.5));
    }

    #[test]
    fn activity_monotonically_decreasing() {
        let mut prev = f32::MAX;
        for d in [0.0, 1.0, 7.0, 30.0, 90.0, 365.0] {
            let b = activity_boost_for_days(d, 30.0);
            assert!(b <= prev);
            assert!((0.5..=1.5).contains(&b));
            prev = b;
        }
    }

    #[test]
    fn temporal_ramp_endpoints() {
        assert!(approx(temporal_boost_for_days(0.0, 14.0), 1.3));
        assert!(approx(temporal_boost_for_days(7.0, 14.0), 1.15));
        assert_eq!(temporal_boost_for_days(14.0, 14.0), 1.0);
        assert_eq!(temporal_boost_for_days(100.0, 14.0), 1.0);
        assert_eq!(temporal_boost_for_days(0.0, 0.0), 1.0);
    }

    #[test]
    fn calculator_uses_timestamps() {
        let now = Utc::now();
        let calc = BoostCalculator::default();
        assert!(approx(calc.activity_boost(now, now), 1.5));
        assert!(approx(calc.activity_boost(now - Duration::days(30), now), 1.0));
        assert!(approx(calc.temporal_boost(now - Duration::days(7), now), 1.15));
        // future timestamps are treated as "now"
        assert!(approx(calc.activity_boost(now + Duration::days(2), now), 1.5));
    }

    #[test]
    fn final_score_is_clamped() {
        assert_eq!(final_score(0.9, 1.0, 1.5, 1.3), 1.0);
        assert_eq!(final_score(-0.5, 1.0, 1.0, 1.0), 0.0);
        assert!(approx(final_score(0.5, 0.5, 1.0, 1.0), 0.25));
    }
}
