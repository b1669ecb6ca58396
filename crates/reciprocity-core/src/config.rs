//! Matching configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MATCH_ALGORITHM` | `enhanced` | `simple`, `multi_vector` or `enhanced` |
//! | `SIMILARITY_THRESHOLD` | `0.5` | acceptance threshold |
//! | `MATCH_WEIGHT_<DIMENSION>` | see [`crate::defaults`] | dimension weight, normalized |
//! | `MATCH_REQUIRED_DIMENSIONS` | `primary_goal` | comma-separated required dimensions |
//! | `MATCH_MIN_TIER` | `worth_exploring` | multi-vector inclusion floor |
//! | `MATCH_TIER_PERFECT` / `_STRONG` / `_WORTH_EXPLORING` | `0.80` / `0.65` / `0.45` | tier cutoffs |
//! | `ACTIVITY_HALF_LIFE_DAYS` | `30` | activity decay half-life |
//! | `NEW_USER_BOOST_DAYS` | `14` | new-user ramp window |
//! | `MATCH_LIMIT` | `50` | per-viewer result limit |
//! | `MAX_MATCHES_PER_CYCLE` | `10` | per-source pair cap per run |
//! | `ENFORCE_HARD_DEALBREAKERS` | `true` | dealbreaker filter switch |
//! | `BLOCK_SAME_OBJECTIVE` | `true` | same-objective filter switch |
//! | `NOTIFY_MIN_SCORE` | `0.0` | minimum score for a pair to be notified |
//! | `OPERATION_TIMEOUT_MS` | `10000` | bound on each store/index call |
//!
//! Unparseable values log a warning and keep the default.

use std::time::Duration;

use tracing::warn;

use crate::defaults;
use crate::error::Result;
use crate::models::{Dimension, DimensionWeight, MatchTier, TierCutoffs, WeightTable};

/// Which matching strategy the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlgorithmKind {
    /// Independent forward and reverse lookups on the plain vectors.
    Simple,
    /// Weighted per-dimension scoring, tiered.
    MultiVector,
    /// Bidirectional intersection with filters, intent and boosts.
    #[default]
    Enhanced,
}

impl AlgorithmKind {
    /// Parse from string (case-insensitive, accepts hyphens/underscores).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "simple" | "basic" => Some(Self::Simple),
            "multi_vector" | "multivector" | "weighted" => Some(Self::MultiVector),
            "enhanced" | "bidirectional" => Some(Self::Enhanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::MultiVector => write!(f, "multi_vector"),
            Self::Enhanced => write!(f, "enhanced"),
        }
    }
}

/// Process-wide matching configuration.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub algorithm: AlgorithmKind,
    pub similarity_threshold: f32,
    pub weights: WeightTable,
    pub tiers: TierCutoffs,
    pub min_tier: MatchTier,
    pub activity_half_life_days: f32,
    pub new_user_boost_days: f32,
    pub limit: usize,
    pub max_matches_per_cycle: usize,
    pub enforce_dealbreakers: bool,
    pub block_same_objective: bool,
    pub notify_min_score: f32,
    pub operation_timeout: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::default(),
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            weights: WeightTable::default(),
            tiers: TierCutoffs::default(),
            min_tier: MatchTier::WorthExploring,
            activity_half_life_days: defaults::ACTIVITY_HALF_LIFE_DAYS,
            new_user_boost_days: defaults::NEW_USER_BOOST_DAYS,
            limit: defaults::MATCH_LIMIT,
            max_matches_per_cycle: defaults::MAX_MATCHES_PER_CYCLE,
            enforce_dealbreakers: true,
            block_same_objective: true,
            notify_min_score: defaults::NOTIFY_MIN_SCORE,
            operation_timeout: Duration::from_millis(defaults::OPERATION_TIMEOUT_MS),
        }
    }
}

impl MatchingConfig {
    /// Load configuration from environment variables with fallback to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Fails only when the resulting weight table is unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("MATCH_ALGORITHM") {
            match AlgorithmKind::from_str_loose(&val) {
                Some(kind) => config.algorithm = kind,
                None => warn!(value = %val, "Invalid MATCH_ALGORITHM, using default"),
            }
        }

        config.similarity_threshold =
            parse_or(&lookup, "SIMILARITY_THRESHOLD", config.similarity_threshold)
                .clamp(0.0, 1.0);

        let required: Vec<Dimension> = match lookup("MATCH_REQUIRED_DIMENSIONS") {
            Some(val) => val
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| match s.parse::<Dimension>() {
                    Ok(d) => Some(d),
                    Err(_) => {
                        warn!(value = %s, "Unknown dimension in MATCH_REQUIRED_DIMENSIONS, ignoring");
                        None
                    }
                })
                .collect(),
            None => vec![Dimension::PrimaryGoal],
        };

        let weights = WeightTable::default()
            .weights()
            .iter()
            .map(|w| {
                let key = format!("MATCH_WEIGHT_{}", w.dimension.as_str().to_uppercase());
                DimensionWeight {
                    dimension: w.dimension,
                    weight: parse_or(&lookup, &key, w.weight),
                    required: required.contains(&w.dimension),
                }
            })
            .collect();
        config.weights = WeightTable::new(weights)?;

        config.tiers = TierCutoffs {
            perfect: parse_or(&lookup, "MATCH_TIER_PERFECT", config.tiers.perfect),
            strong: parse_or(&lookup, "MATCH_TIER_STRONG", config.tiers.strong),
            worth_exploring: parse_or(
                &lookup,
                "MATCH_TIER_WORTH_EXPLORING",
                config.tiers.worth_exploring,
            ),
        };
        if !(config.tiers.perfect >= config.tiers.strong
            && config.tiers.strong >= config.tiers.worth_exploring)
        {
            warn!(
                perfect = config.tiers.perfect,
                strong = config.tiers.strong,
                worth_exploring = config.tiers.worth_exploring,
                "Tier cutoffs not descending, using defaults"
            );
            config.tiers = TierCutoffs::default();
        }

        if let Some(val) = lookup("MATCH_MIN_TIER") {
            match val.parse::<MatchTier>() {
                Ok(tier) => config.min_tier = tier,
                Err(_) => warn!(value = %val, "Invalid MATCH_MIN_TIER, using default"),
            }
        }

        config.activity_half_life_days =
            parse_or(&lookup, "ACTIVITY_HALF_LIFE_DAYS", config.activity_half_life_days);
        if config.activity_half_life_days <= 0.0 {
            config.activity_half_life_days = defaults::ACTIVITY_HALF_LIFE_DAYS;
        }
        config.new_user_boost_days =
            parse_or(&lookup, "NEW_USER_BOOST_DAYS", config.new_user_boost_days).max(0.0);

        config.limit = parse_or(&lookup, "MATCH_LIMIT", config.limit).max(1);
        config.max_matches_per_cycle =
            parse_or(&lookup, "MAX_MATCHES_PER_CYCLE", config.max_matches_per_cycle);

        if let Some(val) = lookup("ENFORCE_HARD_DEALBREAKERS") {
            config.enforce_dealbreakers = val != "false" && val != "0";
        }
        if let Some(val) = lookup("BLOCK_SAME_OBJECTIVE") {
            config.block_same_objective = val != "false" && val != "0";
        }

        config.notify_min_score = parse_or(&lookup, "NOTIFY_MIN_SCORE", config.notify_min_score);

        let timeout_ms = parse_or(&lookup, "OPERATION_TIMEOUT_MS", defaults::OPERATION_TIMEOUT_MS);
        config.operation_timeout = Duration::from_millis(timeout_ms.max(1));

        Ok(config)
    }

    /// Floor used when fetching candidates from the index.
    pub fn candidate_floor(&self) -> f32 {
        self.similarity_threshold * defaults::CANDIDATE_FLOOR_RATIO
    }

    pub fn with_algorithm(mut self, algorithm: AlgorithmKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_matches_per_cycle(mut self, cap: usize) -> Self {
        self.max_matches_per_cycle = cap;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(val) => match val.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %val, "Invalid numeric configuration, using default");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = MatchingConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::Enhanced);
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.max_matches_per_cycle, 10);
        assert_eq!(config.min_tier, MatchTier::WorthExploring);
        assert!(config.enforce_dealbreakers);
        assert!((config.candidate_floor() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn parses_overrides() {
        let config = MatchingConfig::from_lookup(lookup_from(&[
            ("MATCH_ALGORITHM", "multi-vector"),
            ("SIMILARITY_THRESHOLD", "0.6"),
            ("MAX_MATCHES_PER_CYCLE", "3"),
            ("MATCH_MIN_TIER", "strong"),
            ("BLOCK_SAME_OBJECTIVE", "false"),
            ("MATCH_REQUIRED_DIMENSIONS", "industry, stage"),
        ]))
        .unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::MultiVector);
        assert!((config.similarity_threshold - 0.6).abs() < 1e-6);
        assert_eq!(config.max_matches_per_cycle, 3);
        assert_eq!(config.min_tier, MatchTier::Strong);
        assert!(!config.block_same_objective);
        assert!(config.weights.get(Dimension::Industry).unwrap().required);
        assert!(config.weights.get(Dimension::Stage).unwrap().required);
        assert!(!config.weights.get(Dimension::PrimaryGoal).unwrap().required);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = MatchingConfig::from_lookup(lookup_from(&[
            ("SIMILARITY_THRESHOLD", "high"),
            ("MATCH_ALGORITHM", "quantum"),
        ]))
        .unwrap();
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.algorithm, AlgorithmKind::Enhanced);
    }

    #[test]
    fn weights_are_normalized() {
        let config = MatchingConfig::from_lookup(lookup_from(&[
            ("MATCH_WEIGHT_PRIMARY_GOAL", "1"),
            ("MATCH_WEIGHT_INDUSTRY", "1"),
            ("MATCH_WEIGHT_STAGE", "0"),
            ("MATCH_WEIGHT_GEOGRAPHY", "0"),
            ("MATCH_WEIGHT_ENGAGEMENT_STYLE", "0"),
            ("MATCH_WEIGHT_DEALBREAKERS", "0"),
        ]))
        .unwrap();
        let goal = config.weights.get(Dimension::PrimaryGoal).unwrap().weight;
        assert!((goal - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_weights_are_config_error() {
        let result = MatchingConfig::from_lookup(lookup_from(&[
            ("MATCH_WEIGHT_PRIMARY_GOAL", "0"),
            ("MATCH_WEIGHT_INDUSTRY", "0"),
            ("MATCH_WEIGHT_STAGE", "0"),
            ("MATCH_WEIGHT_GEOGRAPHY", "0"),
            ("MATCH_WEIGHT_ENGAGEMENT_STYLE", "0"),
            ("MATCH_WEIGHT_DEALBREAKERS", "0"),
        ]));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn non_descending_tiers_reset() {
        let config = MatchingConfig::from_lookup(lookup_from(&[
            ("MATCH_TIER_PERFECT", "0.3"),
            ("MATCH_TIER_STRONG", "0.9"),
        ]))
        .unwrap();
        assert_eq!(config.tiers, TierCutoffs::default());
    }

    #[test]
    fn algorithm_kind_display() {
        assert_eq!(AlgorithmKind::MultiVector.to_string(), "multi_vector");
        assert_eq!(AlgorithmKind::from_str_loose("BIDIRECTIONAL"), Some(AlgorithmKind::Enhanced));
    }
}
