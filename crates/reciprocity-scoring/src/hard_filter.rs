//! Hard filters applied to a candidate before it is scored.
//!
//! A filtered candidate is ineligible, not low-scoring: it never reaches the
//! result set and its exclusion is counted separately from threshold misses.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use reciprocity_core::logging;
use reciprocity_core::MatchIntent;

/// Static synonym expansion for dealbreaker terms.
pub const DEALBREAKER_SYNONYMS: &[(&str, &[&str])] = &[
    ("crypto", &["cryptocurrency", "blockchain", "web3", "defi", "nft"]),
    ("blockchain", &["crypto", "cryptocurrency", "web3", "defi"]),
    ("gambling", &["casino", "betting", "gaming"]),
    ("tobacco", &["cigarette", "smoking", "vaping"]),
    ("alcohol", &["liquor", "beer", "wine", "spirits"]),
    ("early stage", &["pre-seed", "seed", "early-stage", "ideation"]),
    ("late stage", &["series c", "series d", "growth stage", "late-stage"]),
    ("remote", &["distributed", "work from home", "virtual"]),
    ("consumer", &["b2c", "direct to consumer", "d2c"]),
    ("enterprise", &["b2b", "corporate", "business to business"]),
];

/// Same-intent pairs that are mutually excluded: both sides want the same
/// thing and neither can supply it.
pub const BLOCKED_SAME_OBJECTIVE: &[MatchIntent] = &[
    MatchIntent::InvestorSeekingFounder,
    MatchIntent::FounderSeekingInvestor,
    MatchIntent::TalentSeeking,
    MatchIntent::OpportunitySeeking,
    MatchIntent::MentorSeekingMentee,
    MatchIntent::MenteeSeekingMentor,
];

/// Every term checked for a dealbreaker: the term itself plus its synonyms.
pub fn expand_term(term: &str) -> Vec<&str> {
    let mut terms = vec![term];
    if let Some((_, synonyms)) = DEALBREAKER_SYNONYMS.iter().find(|(t, _)| *t == term) {
        terms.extend(synonyms.iter().copied());
    }
    terms
}

/// Dealbreakers of the viewer that the candidate text violates.
///
/// `candidate_text` is expected lowercased. Returns the viewer's terms (not
/// the synonyms) that matched; an empty vec means no violation.
pub fn violated_dealbreakers(dealbreakers: &BTreeSet<String>, candidate_text: &str) -> Vec<String> {
    dealbreakers
        .iter()
        .filter(|term| {
            expand_term(term.as_str())
                .iter()
                .any(|t| !t.is_empty() && candidate_text.contains(t))
        })
        .cloned()
        .collect()
}

/// Whether two intents are a blocked same-objective pair.
pub fn is_same_objective_blocked(a: MatchIntent, b: MatchIntent) -> bool {
    a == b && BLOCKED_SAME_OBJECTIVE.contains(&a)
}

/// Why a candidate was left out of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExclusionReason {
    Dealbreaker,
    SameObjective,
    BelowThreshold,
    RequiredDimension,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dealbreaker => logging::EXCLUSION_DEALBREAKER,
            Self::SameObjective => logging::EXCLUSION_SAME_OBJECTIVE,
            Self::BelowThreshold => logging::EXCLUSION_BELOW_THRESHOLD,
            Self::RequiredDimension => logging::EXCLUSION_REQUIRED_DIMENSION,
        }
    }

    /// Exclusions made by a hard filter before scoring.
    pub fn is_hard_filter(&self) -> bool {
        matches!(self, Self::Dealbreaker | Self::SameObjective)
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run exclusion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionStats {
    pub dealbreaker: usize,
    pub same_objective: usize,
    pub below_threshold: usize,
    pub required_dimension: usize,
}

impl ExclusionStats {
    pub fn record(&mut self, reason: ExclusionReason) {
        match reason {
            ExclusionReason::Dealbreaker => self.dealbreaker += 1,
            ExclusionReason::SameObjective => self.same_objective += 1,
            ExclusionReason::BelowThreshold => self.below_threshold += 1,
            ExclusionReason::RequiredDimension => self.required_dimension += 1,
        }
    }

    /// Candidates excluded by hard filters.
    pub fn hard_filtered(&self) -> usize {
        self.dealbreaker + self.same_objective
    }

    pub fn total(&self) -> usize {
        self.hard_filtered() + self.below_threshold + self.required_dimension
    }

    pub fn merge(&mut self, other: &ExclusionStats) {
        self.dealbreaker += other.dealbreaker;
        self.same_objective += other.same_objective;
        self.below_threshold += other.below_threshold;
        self.required_dimension += other.required_dimension;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reciprocity_core::parse_dealbreakers;

    #[test]
    fn direct_term_violates() {
        let db = parse_dealbreakers("gambling");
        assert_eq!(
            violated_dealbreakers(&db, "we run an online gambling platform"),
            vec!["gambling".to_string()]
        );
    }

    #[test]
    fn synonym_violates() {
        let db = parse_dealbreakers("crypto");
        assert_eq!(
            violated_dealbreakers(&db, "building blockchain settlement rails"),
            vec!["crypto".to_string()]
        );
    }

    #[test]
    fn unrelated_text_passes() {
        let db = parse_dealbreakers("crypto; tobacco");
        assert!(violated_dealbreakers(&db, "fintech payments for clinics").is_empty());
    }

    #[test]
    fn no_dealbreakers_never_violates() {
        assert!(violated_dealbreakers(&BTreeSet::new(), "crypto casino").is_empty());
    }

    #[test]
    fn multiword_synonym_violates() {
        let db = parse_dealbreakers("remote");
        assert_eq!(
            violated_dealbreakers(&db, "we prefer to work from home").len(),
            1
        );
    }

    #[test]
    fn same_objective_blocking_table() {
        assert!(is_same_objective_blocked(
            MatchIntent::FounderSeekingInvestor,
            MatchIntent::FounderSeekingInvestor
        ));
        assert!(is_same_objective_blocked(
            MatchIntent::OpportunitySeeking,
            MatchIntent::OpportunitySeeking
        ));
        assert!(!is_same_objective_blocked(
            MatchIntent::CofounderSeeking,
            MatchIntent::CofounderSeeking
        ));
        assert!(!is_same_objective_blocked(
            MatchIntent::Partnership,
            MatchIntent::Partnership
        ));
        assert!(!is_same_objective_blocked(MatchIntent::General, MatchIntent::General));
        assert!(!is_same_objective_blocked(
            MatchIntent::InvestorSeekingFounder,
            MatchIntent::FounderSeekingInvestor
        ));
    }

    #[test]
    fn stats_distinguish_hard_filters_from_low_score() {
        let mut stats = ExclusionStats::default();
        stats.record(ExclusionReason::Dealbreaker);
        stats.record(ExclusionReason::SameObjective);
        stats.record(ExclusionReason::BelowThreshold);
        assert_eq!(stats.hard_filtered(), 2);
        assert_eq!(stats.total(), 3);
        assert!(ExclusionReason::Dealbreaker.is_hard_filter());
        assert!(!ExclusionReason::BelowThreshold.is_hard_filter());
        assert_eq!(ExclusionReason::SameObjective.to_string(), "same_objective");
    }
}
