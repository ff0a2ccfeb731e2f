//! Answer vocabulary: maps free-form answers onto the 1..=5 scale.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::sanitize::{normalize_answer_value, parse_leading_int};
use crate::types::{
    Answer, ProcessingError, DEFAULT_ANSWER_VALUE, MAX_ANSWER_VALUE, MIN_ANSWER_VALUE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub phrase: String,
    pub value: u8,
}

/// Versionable phrase table. Phrases match case-insensitively after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVocabulary {
    pub version: String,
    pub entries: Vec<VocabularyEntry>,
}

impl Default for AnswerVocabulary {
    fn default() -> Self {
        const TABLE: &[(&str, u8)] = &[
            ("strongly agree", 5),
            ("very interested", 5),
            ("excellent", 5),
            ("agree", 4),
            ("interested", 4),
            ("good", 4),
            ("neutral", 3),
            ("somewhat interested", 3),
            ("average", 3),
            ("disagree", 2),
            ("not very interested", 2),
            ("below average", 2),
            ("strongly disagree", 1),
            ("not interested", 1),
            ("poor", 1),
        ];

        Self {
            version: "1.0".to_string(),
            entries: TABLE
                .iter()
                .map(|(phrase, value)| VocabularyEntry {
                    phrase: (*phrase).to_string(),
                    value: *value,
                })
                .collect(),
        }
    }
}

impl AnswerVocabulary {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Rejects blank phrases, values outside 1..=5 and phrases listed twice.
    pub fn validate(&self) -> Result<(), ProcessingError> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            let key = entry.phrase.trim().to_lowercase();
            if key.is_empty() {
                return Err(ProcessingError::invalid_vocabulary("entry with empty phrase"));
            }
            if !(MIN_ANSWER_VALUE..=MAX_ANSWER_VALUE).contains(&entry.value) {
                return Err(ProcessingError::invalid_vocabulary(format!(
                    "value {} out of range for {}",
                    entry.value, entry.phrase
                )));
            }
            if !seen.insert(key) {
                return Err(ProcessingError::invalid_vocabulary(format!(
                    "duplicate phrase {}",
                    entry.phrase.trim()
                )));
            }
        }

        Ok(())
    }

    pub fn lookup(&self, phrase: &str) -> Option<u8> {
        let needle = phrase.trim().to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.phrase.trim().eq_ignore_ascii_case(&needle))
            .map(|entry| entry.value)
    }

    /// Normalised value of one answer.
    pub fn value_of(&self, answer: &Answer) -> u8 {
        match answer {
            Answer::Text(text) => self
                .lookup(text)
                .or_else(|| parse_leading_int(text).map(normalize_answer_value))
                .unwrap_or(DEFAULT_ANSWER_VALUE),
            Answer::Integer(value) => normalize_answer_value(*value),
            Answer::Float(value) if value.is_finite() => normalize_answer_value(value.trunc() as i64),
            Answer::Float(_) => DEFAULT_ANSWER_VALUE,
        }
    }

    pub fn values<'a>(&self, answers: impl IntoIterator<Item = &'a Answer>) -> Vec<u8> {
        answers.into_iter().map(|answer| self.value_of(answer)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrases_case_insensitive() {
        let vocab = AnswerVocabulary::default();
        assert_eq!(vocab.value_of(&Answer::from("Strongly Agree")), 5);
        assert_eq!(vocab.value_of(&Answer::from("  NOT interested ")), 1);
        assert_eq!(vocab.value_of(&Answer::from("Below Average")), 2);
        assert_eq!(vocab.value_of(&Answer::from("neutral")), 3);
    }

    #[test]
    fn test_unrecognized_text_defaults_to_three() {
        let vocab = AnswerVocabulary::default();
        assert_eq!(vocab.value_of(&Answer::from("xyz")), 3);
    }

    #[test]
    fn test_numeric_string_bypasses_vocabulary() {
        let vocab = AnswerVocabulary::default();
        assert_eq!(vocab.value_of(&Answer::from("4")), 4);
        assert_eq!(vocab.value_of(&Answer::from("2 - somewhat")), 2);
    }

    #[test]
    fn test_numbers() {
        let vocab = AnswerVocabulary::default();
        assert_eq!(vocab.value_of(&Answer::Integer(1)), 1);
        assert_eq!(vocab.value_of(&Answer::Integer(0)), 3);
        assert_eq!(vocab.value_of(&Answer::Integer(42)), 5);
        assert_eq!(vocab.value_of(&Answer::Float(4.9)), 4);
        assert_eq!(vocab.value_of(&Answer::Float(f64::NAN)), 3);
    }

    #[test]
    fn test_custom_vocabulary_from_json() {
        let vocab = AnswerVocabulary::from_json(
            r#"{"version":"2.0","entries":[{"phrase":"love it","value":5}]}"#,
        )
        .unwrap();
        assert_eq!(vocab.value_of(&Answer::from("Love it")), 5);
        assert_eq!(vocab.value_of(&Answer::from("agree")), 3);
    }

    #[test]
    fn test_default_vocabulary_is_valid() {
        assert!(AnswerVocabulary::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        for value in [0, 6, 255] {
            let vocab = AnswerVocabulary {
                version: "2.0".to_string(),
                entries: vec![VocabularyEntry {
                    phrase: "love it".to_string(),
                    value,
                }],
            };
            let err = vocab.validate().unwrap_err();
            assert_eq!(err.kind(), &crate::types::ProcessingErrorKind::InvalidVocabulary);
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_and_blank_phrases() {
        let dup = AnswerVocabulary::from_json(
            r#"{"version":"2.0","entries":[{"phrase":"Agree","value":4},{"phrase":" agree ","value":5}]}"#,
        )
        .unwrap();
        let err = dup.validate().unwrap_err();
        assert_eq!(err.detail(), "duplicate phrase agree");

        let blank = AnswerVocabulary::from_json(
            r#"{"version":"2.0","entries":[{"phrase":"   ","value":3}]}"#,
        )
        .unwrap();
        assert!(blank.validate().is_err());
    }
}
