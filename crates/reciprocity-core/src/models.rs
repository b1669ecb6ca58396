//! Domain models for the matching engine.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

/// Opaque, stable user identifier.
pub type UserId = String;

// =============================================================================
// VECTORS
// =============================================================================

/// Which side of a profile a text or vector describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// What the user is looking for.
    Requirements,
    /// What the user brings.
    Offerings,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Offerings => "offerings",
        }
    }

    /// The side a vector of this direction is compared against.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Requirements => Self::Offerings,
            Self::Offerings => Self::Requirements,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requirements" => Ok(Self::Requirements),
            "offerings" => Ok(Self::Offerings),
            _ => Err(format!("Invalid direction: {}", s)),
        }
    }
}

/// A semantic facet embedded and compared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PrimaryGoal,
    Industry,
    Stage,
    Geography,
    EngagementStyle,
    Dealbreakers,
}

impl Dimension {
    /// All dimensions in their canonical order.
    pub const ALL: [Dimension; 6] = [
        Self::PrimaryGoal,
        Self::Industry,
        Self::Stage,
        Self::Geography,
        Self::EngagementStyle,
        Self::Dealbreakers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryGoal => "primary_goal",
            Self::Industry => "industry",
            Self::Stage => "stage",
            Self::Geography => "geography",
            Self::EngagementStyle => "engagement_style",
            Self::Dealbreakers => "dealbreakers",
        }
    }

    /// Human-readable label used in explanations.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrimaryGoal => "primary goal",
            Self::Industry => "industry",
            Self::Stage => "stage",
            Self::Geography => "geography",
            Self::EngagementStyle => "engagement style",
            Self::Dealbreakers => "dealbreakers",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "primary_goal" | "goal" => Ok(Self::PrimaryGoal),
            "industry" => Ok(Self::Industry),
            "stage" => Ok(Self::Stage),
            "geography" | "geo" => Ok(Self::Geography),
            "engagement_style" | "style" => Ok(Self::EngagementStyle),
            "dealbreakers" | "deal" => Ok(Self::Dealbreakers),
            _ => Err(format!("Invalid dimension: {}", s)),
        }
    }
}

/// Key of a stored vector: a direction plus an optional dimension.
///
/// `dimension == None` is the plain whole-text vector used by the simple
/// and enhanced algorithms. Serialized as `requirements`, `offerings_industry`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorKind {
    pub direction: Direction,
    pub dimension: Option<Dimension>,
}

impl VectorKind {
    /// Whole-text vector for a direction.
    pub fn plain(direction: Direction) -> Self {
        Self {
            direction,
            dimension: None,
        }
    }

    /// Per-dimension vector for a direction.
    pub fn dimension(direction: Direction, dimension: Dimension) -> Self {
        Self {
            direction,
            dimension: Some(dimension),
        }
    }

    /// The kind this vector is compared against on the other profile.
    pub fn counterpart(&self) -> Self {
        Self {
            direction: self.direction.opposite(),
            dimension: self.dimension,
        }
    }
}

impl fmt::Display for VectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension {
            None => f.write_str(self.direction.as_str()),
            Some(d) => write!(f, "{}_{}", self.direction.as_str(), d.as_str()),
        }
    }
}

impl std::str::FromStr for VectorKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        for direction in [Direction::Requirements, Direction::Offerings] {
            let prefix = direction.as_str();
            if lower == prefix {
                return Ok(Self::plain(direction));
            }
            if let Some(rest) = lower.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) {
                let dimension = rest.parse::<Dimension>()?;
                return Ok(Self::dimension(direction, dimension));
            }
        }
        Err(format!("Invalid vector kind: {}", s))
    }
}

/// A user's nearest-neighbour hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub score: f32,
}

// =============================================================================
// PROFILES
// =============================================================================

/// Coarse categorisation of what a profile is trying to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchIntent {
    InvestorSeekingFounder,
    FounderSeekingInvestor,
    MentorSeekingMentee,
    MenteeSeekingMentor,
    CofounderSeeking,
    TalentSeeking,
    OpportunitySeeking,
    Partnership,
    General,
}

impl MatchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvestorSeekingFounder => "investor_seeking_founder",
            Self::FounderSeekingInvestor => "founder_seeking_investor",
            Self::MentorSeekingMentee => "mentor_seeking_mentee",
            Self::MenteeSeekingMentor => "mentee_seeking_mentor",
            Self::CofounderSeeking => "cofounder_seeking",
            Self::TalentSeeking => "talent_seeking",
            Self::OpportunitySeeking => "opportunity_seeking",
            Self::Partnership => "partnership",
            Self::General => "general",
        }
    }
}

impl fmt::Display for MatchIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchIntent {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "investor_seeking_founder" => Ok(Self::InvestorSeekingFounder),
            "founder_seeking_investor" => Ok(Self::FounderSeekingInvestor),
            "mentor_seeking_mentee" => Ok(Self::MentorSeekingMentee),
            "mentee_seeking_mentor" => Ok(Self::MenteeSeekingMentor),
            "cofounder_seeking" => Ok(Self::CofounderSeeking),
            "talent_seeking" => Ok(Self::TalentSeeking),
            "opportunity_seeking" => Ok(Self::OpportunitySeeking),
            "partnership" => Ok(Self::Partnership),
            "general" => Ok(Self::General),
            _ => Err(format!("Invalid match intent: {}", s)),
        }
    }
}

/// An intent label with the classifier's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub intent: MatchIntent,
    pub confidence: f32,
}

/// A user's matching profile. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    /// Job title or role shown to the counterpart in notifications.
    pub designation: Option<String>,
    pub requirements_text: String,
    pub offerings_text: String,
    #[serde(default)]
    pub requirement_dimensions: BTreeMap<Dimension, String>,
    #[serde(default)]
    pub offering_dimensions: BTreeMap<Dimension, String>,
    /// Cached classification; recomputed when absent.
    pub intent: Option<ClassifiedIntent>,
    #[serde(default)]
    pub dealbreakers: BTreeSet<String>,
    pub last_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(
        user_id: impl Into<UserId>,
        requirements_text: impl Into<String>,
        offerings_text: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            designation: None,
            requirements_text: requirements_text.into(),
            offerings_text: offerings_text.into(),
            requirement_dimensions: BTreeMap::new(),
            offering_dimensions: BTreeMap::new(),
            intent: None,
            dealbreakers: BTreeSet::new(),
            last_updated_at: now,
            created_at: now,
        }
    }

    pub fn with_designation(mut self, designation: impl Into<String>) -> Self {
        self.designation = Some(designation.into());
        self
    }

    pub fn with_dimension(
        mut self,
        direction: Direction,
        dimension: Dimension,
        text: impl Into<String>,
    ) -> Self {
        let map = match direction {
            Direction::Requirements => &mut self.requirement_dimensions,
            Direction::Offerings => &mut self.offering_dimensions,
        };
        map.insert(dimension, text.into());
        self
    }

    /// Sets dealbreakers from a free-text list separated by `,` or `;`.
    pub fn with_dealbreakers(mut self, raw: &str) -> Self {
        self.dealbreakers = parse_dealbreakers(raw);
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, last_updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.last_updated_at = last_updated_at;
        self
    }

    pub fn text(&self, direction: Direction) -> &str {
        match direction {
            Direction::Requirements => &self.requirements_text,
            Direction::Offerings => &self.offerings_text,
        }
    }

    pub fn dimensions(&self, direction: Direction) -> &BTreeMap<Dimension, String> {
        match direction {
            Direction::Requirements => &self.requirement_dimensions,
            Direction::Offerings => &self.offering_dimensions,
        }
    }

    /// Requirements, offerings and every dimension text, lowercased and space-joined.
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.requirements_text, &self.offerings_text];
        parts.extend(self.requirement_dimensions.values().map(String::as_str));
        parts.extend(self.offering_dimensions.values().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

/// Splits a free-text dealbreaker list on `,` and `;`, lowercasing and trimming.
pub fn parse_dealbreakers(raw: &str) -> BTreeSet<String> {
    raw.split([',', ';'])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Why a user carries the "needs matching" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    /// First match run, or a periodic refresh.
    Pending,
    /// Requirement/offering text changed since the last run.
    ProfileChanged,
}

impl PendingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ProfileChanged => "profile_changed",
        }
    }
}

impl std::str::FromStr for PendingReason {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "profile_changed" => Ok(Self::ProfileChanged),
            _ => Err(format!("Invalid pending reason: {}", s)),
        }
    }
}

/// A user flagged for the next scheduled sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUser {
    pub user_id: UserId,
    pub reason: PendingReason,
    /// Flag version when the user was listed. Every re-flag bumps it, so a
    /// flag set mid-run no longer matches and survives the clear.
    #[serde(default)]
    pub flag_version: i64,
}

impl PendingUser {
    pub fn new(user_id: impl Into<UserId>, reason: PendingReason) -> Self {
        Self {
            user_id: user_id.into(),
            reason,
            flag_version: 0,
        }
    }

    pub fn with_flag_version(mut self, version: i64) -> Self {
        self.flag_version = version;
        self
    }
}

// =============================================================================
// SCORING
// =============================================================================

/// One configured dimension weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeight {
    pub dimension: Dimension,
    pub weight: f32,
    pub required: bool,
}

/// Ordered dimension weights, normalized to sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: Vec<DimensionWeight>,
}

impl WeightTable {
    /// Builds a table, normalizing weights so they sum to 1.0.
    ///
    /// Negative weights and a non-positive sum are configuration errors.
    pub fn new(weights: Vec<DimensionWeight>) -> Result<Self> {
        if let Some(w) = weights.iter().find(|w| w.weight < 0.0 || !w.weight.is_finite()) {
            return Err(Error::Config(format!(
                "weight for {} must be a non-negative number, got {}",
                w.dimension, w.weight
            )));
        }
        let sum: f32 = weights.iter().map(|w| w.weight).sum();
        if sum <= 0.0 {
            return Err(Error::Config(
                "dimension weights must sum to a positive value".to_string(),
            ));
        }
        let weights = weights
            .into_iter()
            .map(|w| DimensionWeight {
                weight: w.weight / sum,
                ..w
            })
            .collect();
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &[DimensionWeight] {
        &self.weights
    }

    pub fn get(&self, dimension: Dimension) -> Option<&DimensionWeight> {
        self.weights.iter().find(|w| w.dimension == dimension)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.weights.iter().map(|w| w.dimension)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        let w = |dimension, weight, required| DimensionWeight {
            dimension,
            weight,
            required,
        };
        Self {
            weights: vec![
                w(Dimension::PrimaryGoal, defaults::WEIGHT_PRIMARY_GOAL, true),
                w(Dimension::Industry, defaults::WEIGHT_INDUSTRY, false),
                w(Dimension::Stage, defaults::WEIGHT_STAGE, false),
                w(Dimension::Geography, defaults::WEIGHT_GEOGRAPHY, false),
                w(Dimension::EngagementStyle, defaults::WEIGHT_ENGAGEMENT_STYLE, false),
                w(Dimension::Dealbreakers, defaults::WEIGHT_DEALBREAKERS, false),
            ],
        }
    }
}

/// Coarse match-quality bucket. Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Low,
    WorthExploring,
    Strong,
    Perfect,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::WorthExploring => "worth_exploring",
            Self::Strong => "strong",
            Self::Perfect => "perfect",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchTier {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "low" => Ok(Self::Low),
            "worth_exploring" => Ok(Self::WorthExploring),
            "strong" => Ok(Self::Strong),
            "perfect" => Ok(Self::Perfect),
            _ => Err(format!("Invalid match tier: {}", s)),
        }
    }
}

/// Minimum scores for each tier above LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCutoffs {
    pub perfect: f32,
    pub strong: f32,
    pub worth_exploring: f32,
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self {
            perfect: defaults::TIER_PERFECT,
            strong: defaults::TIER_STRONG,
            worth_exploring: defaults::TIER_WORTH_EXPLORING,
        }
    }
}

/// One dimension's contribution to a weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub dimension: Dimension,
    pub similarity: f32,
    pub weight: f32,
    pub weighted_score: f32,
}

/// Aggregated multi-vector score for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiVectorResult {
    pub user_id: UserId,
    pub total_score: f32,
    pub tier: MatchTier,
    pub breakdown: Vec<CandidateScore>,
}

/// Full scoring detail for an enhanced bidirectional match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidirectionalMatch {
    pub candidate_id: UserId,
    pub forward_score: f32,
    pub reverse_score: f32,
    pub combined_score: f32,
    pub intent_quality: f32,
    pub activity_boost: f32,
    pub temporal_boost: f32,
    pub final_score: f32,
    pub reasons: Vec<String>,
    pub gaps: Vec<String>,
}

// =============================================================================
// MATCH STORE
// =============================================================================

/// Which of the owner's two stored lists an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchList {
    /// Candidates offering what the owner requires.
    Requirements,
    /// Candidates requiring what the owner offers.
    Offerings,
}

impl MatchList {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Offerings => "offerings",
        }
    }

    /// The counterpart's list that mirrors an entry in this list.
    ///
    /// If A's requirements are met by B, then from B's side A needs what B offers.
    pub fn reciprocal(&self) -> Self {
        match self {
            Self::Requirements => Self::Offerings,
            Self::Offerings => Self::Requirements,
        }
    }
}

impl fmt::Display for MatchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchList {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requirements" => Ok(Self::Requirements),
            "offerings" => Ok(Self::Offerings),
            _ => Err(format!("Invalid match list: {}", s)),
        }
    }
}

/// How a stored entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Simple,
    MultiVector,
    Enhanced,
    /// Mirrored from the counterpart's own computation.
    Reciprocal,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::MultiVector => "multi_vector",
            Self::Enhanced => "enhanced",
            Self::Reciprocal => "reciprocal",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "multi_vector" => Ok(Self::MultiVector),
            "enhanced" => Ok(Self::Enhanced),
            "reciprocal" => Ok(Self::Reciprocal),
            _ => Err(format!("Invalid match type: {}", s)),
        }
    }
}

/// One persisted match inside a user's document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatchEntry {
    pub matched_user_id: UserId,
    pub similarity_score: f32,
    pub match_type: MatchType,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

/// A user's stored outbound match lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDocument {
    pub owner: UserId,
    pub requirements_matches: Vec<StoredMatchEntry>,
    pub offerings_matches: Vec<StoredMatchEntry>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MatchDocument {
    pub fn empty(owner: impl Into<UserId>) -> Self {
        Self {
            owner: owner.into(),
            requirements_matches: Vec::new(),
            offerings_matches: Vec::new(),
            updated_at: None,
        }
    }

    pub fn list(&self, list: MatchList) -> &[StoredMatchEntry] {
        match list {
            MatchList::Requirements => &self.requirements_matches,
            MatchList::Offerings => &self.offerings_matches,
        }
    }

    pub fn list_mut(&mut self, list: MatchList) -> &mut Vec<StoredMatchEntry> {
        match list {
            MatchList::Requirements => &mut self.requirements_matches,
            MatchList::Offerings => &mut self.offerings_matches,
        }
    }

    /// Whether either list already shows `user_id`.
    pub fn contains(&self, user_id: &str) -> bool {
        self.requirements_matches
            .iter()
            .chain(self.offerings_matches.iter())
            .any(|e| e.matched_user_id == user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.requirements_matches.is_empty() && self.offerings_matches.is_empty()
    }

    /// Number of entries across both lists.
    pub fn len(&self) -> usize {
        self.requirements_matches.len() + self.offerings_matches.len()
    }
}

/// How `MatchStore::upsert` treats existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Discard the existing list and write the given entries.
    Replace,
    /// Add only entries whose `matched_user_id` is not already in the list.
    AppendIfAbsent,
}

/// A ranked candidate produced by a matching algorithm for one list.
///
/// The same user may appear twice with different `list` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub user_id: UserId,
    pub score: f32,
    pub list: MatchList,
    pub match_type: MatchType,
    pub explanation: String,
    pub tier: Option<MatchTier>,
    pub detail: Option<BidirectionalMatch>,
}

impl ScoredCandidate {
    /// Converts to a stored entry stamped with `now`.
    pub fn to_entry(&self, now: DateTime<Utc>) -> StoredMatchEntry {
        StoredMatchEntry {
            matched_user_id: self.user_id.clone(),
            similarity_score: self.score,
            match_type: self.match_type,
            explanation: self.explanation.clone(),
            created_at: now,
        }
    }
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Separator between the two sorted ids of a pair key.
pub const PAIR_KEY_SEPARATOR: char = '|';

const PAIR_KEY_ESCAPE: char = '\\';

/// Order-independent identifier of an unordered user pair.
///
/// Separator and escape characters inside an id are backslash-escaped, so
/// distinct pairs never share a key.
pub fn pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut key = String::with_capacity(lo.len() + hi.len() + 1);
    push_escaped(&mut key, lo);
    key.push(PAIR_KEY_SEPARATOR);
    push_escaped(&mut key, hi);
    key
}

fn push_escaped(key: &mut String, id: &str) {
    for c in id.chars() {
        if c == PAIR_KEY_SEPARATOR || c == PAIR_KEY_ESCAPE {
            key.push(PAIR_KEY_ESCAPE);
        }
        key.push(c);
    }
}

/// A ledger row recording that a pair has been notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifiedPair {
    pub pair_key: String,
    /// Lexicographically smaller id.
    pub user_a_id: UserId,
    pub user_b_id: UserId,
    pub notified_at: DateTime<Utc>,
    pub notification_count: i32,
    pub last_similarity_score: f32,
}

/// A pair produced by a run, before ledger and backfill checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    /// The user whose computation produced the pair.
    pub source_id: UserId,
    pub target_id: UserId,
    pub score: f32,
}

impl MatchPair {
    pub fn key(&self) -> String {
        pair_key(&self.source_id, &self.target_id)
    }
}

/// One pair in an outbound notification batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMatch {
    pub user_a_id: UserId,
    pub user_b_id: UserId,
    pub user_a_designation: Option<String>,
    pub user_b_designation: Option<String>,
}

/// Body of the single per-run notification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub batch_id: Uuid,
    pub matches: Vec<NotificationMatch>,
}

impl NotificationBatch {
    pub fn new(matches: Vec<NotificationMatch>) -> Self {
        Self {
            batch_id: Uuid::now_v7(),
            matches,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
