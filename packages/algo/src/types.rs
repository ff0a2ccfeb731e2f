//! Common Types and Constants
//!
//! Input and output shapes of the scoring pipeline. Output field names are part of the
//! persisted contract: the result object is stored verbatim by the submission handler.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ==================== Constants ====================

/// Lowest normalised answer value
pub const MIN_ANSWER_VALUE: u8 = 1;

/// Highest normalised answer value
pub const MAX_ANSWER_VALUE: u8 = 5;

/// Value used when an answer cannot be interpreted
pub const DEFAULT_ANSWER_VALUE: u8 = 3;

/// Upper bound of a compatibility score
pub const MAX_SCORE: u8 = 100;

/// Half-width of the per-category random offset, inclusive on both ends
pub const JITTER_SPAN: i64 = 10;

/// Maximum number of recommendations returned
pub const MAX_RECOMMENDATIONS: usize = 5;

// ==================== Input Types ====================

/// Identifier of the answered question. Clients send either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) => write!(f, "{n}"),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

/// Raw answer as submitted: a vocabulary phrase, a numeric string, or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::Text(value.to_string())
    }
}

impl From<i64> for Answer {
    fn from(value: i64) -> Self {
        Answer::Integer(value)
    }
}

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    #[serde(rename = "questionId", alias = "question_id")]
    pub question_id: QuestionId,
    pub answer: Answer,
}

impl QuestionResponse {
    pub fn new(question_id: i64, answer: impl Into<Answer>) -> Self {
        Self {
            question_id: QuestionId::Number(question_id),
            answer: answer.into(),
        }
    }
}

// ==================== Output Types ====================

/// Score of a single career category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareerScore {
    pub career: String,
    pub score: u8,
}

/// Career scores in catalog order, serialised as a JSON object `{name: score}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CareerScores(pub Vec<CareerScore>);

impl CareerScores {
    pub fn get(&self, career: &str) -> Option<u8> {
        self.0
            .iter()
            .find(|entry| entry.career == career)
            .map(|entry| entry.score)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CareerScore> {
        self.0.iter()
    }
}

impl Serialize for CareerScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.career, &entry.score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CareerScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = CareerScores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of career name to score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((career, score)) = access.next_entry::<String, u8>()? {
                    entries.push(CareerScore { career, score });
                }
                Ok(CareerScores(entries))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// Five-trait personality readout, each value an integer percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub analytical: u8,
    pub creative: u8,
    pub social: u8,
    pub practical: u8,
    pub leadership: u8,
}

/// Half-open range `[low, high)` a trait value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitRange {
    pub low: u8,
    pub high: u8,
}

pub const ANALYTICAL_RANGE: TraitRange = TraitRange { low: 50, high: 100 };
pub const CREATIVE_RANGE: TraitRange = TraitRange { low: 30, high: 80 };
pub const SOCIAL_RANGE: TraitRange = TraitRange { low: 40, high: 90 };
pub const PRACTICAL_RANGE: TraitRange = TraitRange { low: 45, high: 95 };
pub const LEADERSHIP_RANGE: TraitRange = TraitRange { low: 35, high: 85 };

impl TraitRange {
    pub fn contains(&self, value: u8) -> bool {
        value >= self.low && value < self.high
    }
}

/// Preferred learning modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
}

impl LearningStyle {
    pub const ALL: [LearningStyle; 4] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::Kinesthetic,
        LearningStyle::ReadingWriting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::Kinesthetic => "kinesthetic",
            LearningStyle::ReadingWriting => "reading_writing",
        }
    }
}

/// Learning style with its display sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStyleReadout {
    pub primary: LearningStyle,
    pub description: String,
}

impl LearningStyleReadout {
    pub fn new(primary: LearningStyle) -> Self {
        Self {
            description: format!("You learn best through {} methods.", primary.as_str()),
            primary,
        }
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedCareer {
    pub rank: u32,
    pub career: String,
    pub compatibility_score: u8,
    pub description: String,
    pub recommended_courses: Vec<String>,
}

/// Full output of one scoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub career_scores: CareerScores,
    pub personality_profile: PersonalityProfile,
    pub recommended_careers: Vec<RecommendedCareer>,
    pub learning_style: LearningStyleReadout,
}

// ==================== Errors ====================

/// What went wrong inside the pipeline. Callers only ever see the opaque message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingErrorKind {
    MalformedResponses,
    InvalidCatalog,
    InvalidVocabulary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingError {
    kind: ProcessingErrorKind,
    detail: String,
}

impl ProcessingError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: ProcessingErrorKind::MalformedResponses,
            detail: detail.into(),
        }
    }

    pub fn invalid_catalog(detail: impl Into<String>) -> Self {
        Self {
            kind: ProcessingErrorKind::InvalidCatalog,
            detail: detail.into(),
        }
    }

    pub fn invalid_vocabulary(detail: impl Into<String>) -> Self {
        Self {
            kind: ProcessingErrorKind::InvalidVocabulary,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> &ProcessingErrorKind {
        &self.kind
    }

    /// Underlying cause, for logs only.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Failed to process assessment")
    }
}

impl std::error::Error for ProcessingError {}
