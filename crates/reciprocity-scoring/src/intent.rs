//! Keyword-based intent classification and the intent compatibility table.
//!
//! Each intent carries three cue lists: general cues matched anywhere in the
//! profile, and directional cues matched only against the requirements or
//! offerings text. Directional cues let "needs funding" and "offers funding"
//! land on complementary intents. Confidence is the fraction of cues hit,
//! doubled and capped, so identical text always yields identical output.

use reciprocity_core::defaults::{
    INTENT_DEFAULT_COMPATIBILITY, INTENT_FALLBACK_CONFIDENCE, INTENT_MAX_CONFIDENCE,
};
use reciprocity_core::{ClassifiedIntent, MatchIntent, Profile};

/// Cue lists for one intent.
#[derive(Debug, Clone, Copy)]
pub struct IntentCues {
    pub intent: MatchIntent,
    /// Matched against the full lowercased profile text.
    pub any: &'static [&'static str],
    /// Matched against the requirements side only.
    pub requirements: &'static [&'static str],
    /// Matched against the offerings side only.
    pub offerings: &'static [&'static str],
}

impl IntentCues {
    fn cue_count(&self) -> usize {
        self.any.len() + self.requirements.len() + self.offerings.len()
    }
}

/// Cue table, in tie-break order (earlier wins on equal score).
pub const INTENT_CUES: &[IntentCues] = &[
    IntentCues {
        intent: MatchIntent::FounderSeekingInvestor,
        any: &[
            "raising",
            "fundraising",
            "seeking investment",
            "looking for funding",
            "seed round",
            "series a",
            "need capital",
            "investor relations",
        ],
        requirements: &["funding", "investment", "capital", "investor", "seed"],
        offerings: &[],
    },
    IntentCues {
        intent: MatchIntent::InvestorSeekingFounder,
        any: &[
            "angel",
            "venture capital",
            "portfolio",
            "deal flow",
            "pre-seed",
            "check size",
            "invests in",
            "thesis",
        ],
        requirements: &[],
        offerings: &["funding", "investment", "capital", "seed", "backing"],
    },
    IntentCues {
        intent: MatchIntent::MenteeSeekingMentor,
        any: &[
            "seeking mentor",
            "learn from",
            "looking for guidance",
            "want to learn",
            "career guidance",
        ],
        requirements: &["mentor", "guidance", "advice", "coaching"],
        offerings: &[],
    },
    IntentCues {
        intent: MatchIntent::MentorSeekingMentee,
        any: &[
            "mentorship",
            "share knowledge",
            "give back",
            "help others",
            "coach",
        ],
        requirements: &[],
        offerings: &["mentor", "guidance", "advice", "advise", "experience"],
    },
    IntentCues {
        intent: MatchIntent::CofounderSeeking,
        any: &[
            "co-founder",
            "cofounder",
            "founding team",
            "build together",
            "start together",
            "technical cofounder",
        ],
        requirements: &[],
        offerings: &[],
    },
    IntentCues {
        intent: MatchIntent::TalentSeeking,
        any: &[
            "hiring",
            "recruit",
            "looking for talent",
            "team expansion",
            "new hire",
        ],
        requirements: &["engineer", "developer", "designer", "talent"],
        offerings: &[],
    },
    IntentCues {
        intent: MatchIntent::OpportunitySeeking,
        any: &[
            "job",
            "opportunity",
            "position",
            "career",
            "looking for work",
            "next role",
        ],
        requirements: &[],
        offerings: &["engineer", "developer", "design", "skills"],
    },
    IntentCues {
        intent: MatchIntent::Partnership,
        any: &[
            "partner",
            "collaborate",
            "b2b",
            "strategic",
            "alliance",
            "joint venture",
            "integration",
        ],
        requirements: &[],
        offerings: &[],
    },
];

/// Complementary and explicitly scored intent pairs. Order-sensitive.
pub const COMPATIBILITY: &[(MatchIntent, MatchIntent, f32)] = &[
    (MatchIntent::InvestorSeekingFounder, MatchIntent::FounderSeekingInvestor, 1.0),
    (MatchIntent::FounderSeekingInvestor, MatchIntent::InvestorSeekingFounder, 1.0),
    (MatchIntent::MentorSeekingMentee, MatchIntent::MenteeSeekingMentor, 1.0),
    (MatchIntent::MenteeSeekingMentor, MatchIntent::MentorSeekingMentee, 1.0),
    (MatchIntent::TalentSeeking, MatchIntent::OpportunitySeeking, 1.0),
    (MatchIntent::OpportunitySeeking, MatchIntent::TalentSeeking, 1.0),
    (MatchIntent::CofounderSeeking, MatchIntent::CofounderSeeking, 0.9),
    (MatchIntent::Partnership, MatchIntent::Partnership, 0.85),
];

/// Classify a profile's intent from its texts.
pub fn classify(profile: &Profile) -> ClassifiedIntent {
    let all = profile.combined_text();
    let requirements = profile.requirements_text.to_lowercase();
    let offerings = profile.offerings_text.to_lowercase();
    classify_texts(&all, &requirements, &offerings)
}

/// The cached intent when present, otherwise a fresh classification.
pub fn intent_of(profile: &Profile) -> ClassifiedIntent {
    profile.intent.unwrap_or_else(|| classify(profile))
}

/// Classify from already-lowercased texts.
pub fn classify_texts(all: &str, requirements: &str, offerings: &str) -> ClassifiedIntent {
    let mut best: Option<(MatchIntent, f32)> = None;

    for cues in INTENT_CUES {
        let hits = cues.any.iter().filter(|kw| all.contains(*kw)).count()
            + cues
                .requirements
                .iter()
                .filter(|kw| requirements.contains(*kw))
                .count()
            + cues
                .offerings
                .iter()
                .filter(|kw| offerings.contains(*kw))
                .count();
        if hits == 0 {
            continue;
        }
        let fraction = hits as f32 / cues.cue_count() as f32;
        if best.map_or(true, |(_, b)| fraction > b) {
            best = Some((cues.intent, fraction));
        }
    }

    match best {
        Some((intent, fraction)) => ClassifiedIntent {
            intent,
            confidence: (fraction * 2.0).min(INTENT_MAX_CONFIDENCE),
        },
        None => ClassifiedIntent {
            intent: MatchIntent::General,
            confidence: INTENT_FALLBACK_CONFIDENCE,
        },
    }
}

/// Base compatibility of a viewer intent with a candidate intent.
pub fn compatibility(a: MatchIntent, b: MatchIntent) -> f32 {
    COMPATIBILITY
        .iter()
        .find(|(x, y, _)| *x == a && *y == b)
        .map(|(_, _, score)| *score)
        .unwrap_or(INTENT_DEFAULT_COMPATIBILITY)
}

/// `compatibility(a, b) * mean(confidence_a, confidence_b)`.
pub fn intent_quality(a: &ClassifiedIntent, b: &ClassifiedIntent) -> f32 {
    compatibility(a.intent, b.intent) * (a.confidence + b.confidence) / 2.0
}
