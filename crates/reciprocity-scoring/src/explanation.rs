//! Human-readable explanations stored alongside each match entry.

use reciprocity_core::{CandidateScore, MatchIntent, MatchList, MatchTier};

/// Quality band for a raw score.
pub fn quality_band(score: f32) -> &'static str {
    if score >= 0.8 {
        "Excellent match"
    } else if score >= 0.6 {
        "Strong match"
    } else if score >= 0.4 {
        "Good match"
    } else {
        "Moderate match"
    }
}

/// Explanation for a single-direction (simple) match.
pub fn simple_explanation(score: f32, list: MatchList) -> String {
    let detail = match list {
        MatchList::Requirements => "Their offerings line up with what you are looking for",
        MatchList::Offerings => "What you offer lines up with what they are looking for",
    };
    format!("{} ({:.2}). {}.", quality_band(score), score, detail)
}

/// Explanation for a multi-vector match: tier plus strongest dimensions.
pub fn multi_vector_explanation(tier: MatchTier, breakdown: &[CandidateScore]) -> String {
    let mut parts = Vec::new();
    match tier {
        MatchTier::Perfect => parts.push("Excellent fit across dimensions.".to_string()),
        MatchTier::Strong => parts.push("Strong compatibility.".to_string()),
        _ => {}
    }

    let mut strongest: Vec<&CandidateScore> =
        breakdown.iter().filter(|d| d.similarity >= 0.7).collect();
    strongest.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    if !strongest.is_empty() {
        let dims: Vec<&str> = strongest.iter().take(3).map(|d| d.dimension.label()).collect();
        parts.push(format!("Closest on {}.", dims.join(", ")));
    }

    if parts.is_empty() {
        "Compatible across several profile dimensions.".to_string()
    } else {
        parts.join(" ")
    }
}

/// Reasons supporting an enhanced bidirectional match.
pub fn enhanced_reasons(
    forward: f32,
    reverse: f32,
    viewer: MatchIntent,
    candidate: MatchIntent,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if forward >= 0.8 {
        reasons.push("What they offer closely matches what you need".to_string());
    } else if forward >= 0.6 {
        reasons.push("Their offerings cover much of what you need".to_string());
    }

    if reverse >= 0.8 {
        reasons.push("What you offer closely matches what they need".to_string());
    } else if reverse >= 0.6 {
        reasons.push("You offer much of what they are looking for".to_string());
    }

    if let Some(sentence) = intent_pair_reason(viewer, candidate) {
        reasons.push(sentence.to_string());
    }

    reasons
}

fn intent_pair_reason(viewer: MatchIntent, candidate: MatchIntent) -> Option<&'static str> {
    use MatchIntent::*;
    match (viewer, candidate) {
        (InvestorSeekingFounder, FounderSeekingInvestor) => {
            Some("Investor and founder: they are raising and you are looking for deals")
        }
        (FounderSeekingInvestor, InvestorSeekingFounder) => {
            Some("Founder and investor: they back companies like yours")
        }
        (MentorSeekingMentee, MenteeSeekingMentor) => {
            Some("Mentorship: they are looking for the guidance you offer")
        }
        (MenteeSeekingMentor, MentorSeekingMentee) => {
            Some("Mentorship: they have experience to pass on to you")
        }
        (TalentSeeking, OpportunitySeeking) => Some("Hiring: they are looking for a role like yours"),
        (OpportunitySeeking, TalentSeeking) => Some("Hiring: they are recruiting for your skills"),
        (CofounderSeeking, CofounderSeeking) => Some("Both of you are looking for a co-founder"),
        _ => None,
    }
}

/// Caveats for an enhanced match.
pub fn enhanced_gaps(forward: f32, reverse: f32) -> Vec<String> {
    let mut gaps = Vec::new();
    if forward < 0.5 {
        gaps.push("Their offerings may only partly cover your needs".to_string());
    }
    if reverse < 0.5 {
        gaps.push("Your offerings may only partly cover their needs".to_string());
    }
    if (forward - reverse).abs() > 0.3 {
        gaps.push("Match strength is unbalanced".to_string());
    }
    gaps
}

/// Explanation for an entry mirrored into the counterpart's document.
///
/// `list` is the counterpart's list receiving the entry.
pub fn reciprocal_explanation(list: MatchList, score: f32) -> String {
    match list {
        MatchList::Offerings => format!("This user needs what you offer (score: {:.2})", score),
        MatchList::Requirements => format!("This user offers what you need (score: {:.2})", score),
    }
}
