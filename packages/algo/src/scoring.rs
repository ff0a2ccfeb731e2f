//! Assessment scoring pipeline.
//!
//! `responses -> AssessmentResult` in five steps: answer normalisation, per-category
//! percentage (plus jitter in randomized mode), personality readout, learning style,
//! and ranking. The scorer holds no mutable state; randomness is injected per call.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::answer::AnswerVocabulary;
use crate::catalog::CareerCatalog;
use crate::profile::{
    derived_learning_style, derived_personality, random_learning_style, random_personality,
    AnswerTally,
};
use crate::sanitize::{clamp_score, round_half_up};
use crate::types::{
    AssessmentResult, CareerScore, CareerScores, LearningStyleReadout, ProcessingError,
    QuestionResponse, RecommendedCareer, JITTER_SPAN, MAX_RECOMMENDATIONS,
};

/// How the non-score parts of the readout are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Jittered scores, random personality and learning style.
    #[default]
    Randomized,
    /// No jitter; personality and style derived from the answers.
    Derived,
}

impl ScoringMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "randomized" | "random" => Some(Self::Randomized),
            "derived" | "deterministic" => Some(Self::Derived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentScorer {
    catalog: CareerCatalog,
    vocabulary: AnswerVocabulary,
    mode: ScoringMode,
}

impl AssessmentScorer {
    pub fn new(catalog: CareerCatalog, vocabulary: AnswerVocabulary, mode: ScoringMode) -> Self {
        Self {
            catalog,
            vocabulary,
            mode,
        }
    }

    pub fn catalog(&self) -> &CareerCatalog {
        &self.catalog
    }

    pub fn vocabulary(&self) -> &AnswerVocabulary {
        &self.vocabulary
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn process<R: Rng + ?Sized>(
        &self,
        responses: &[QuestionResponse],
        rng: &mut R,
    ) -> Result<AssessmentResult, ProcessingError> {
        self.catalog.validate()?;
        self.vocabulary.validate()?;

        let values = self
            .vocabulary
            .values(responses.iter().map(|response| &response.answer));
        let tally = AnswerTally::from_values(&values);

        let career_scores = self.career_scores(&tally, rng);

        let (personality_profile, style) = match self.mode {
            ScoringMode::Randomized => (random_personality(rng), random_learning_style(rng)),
            ScoringMode::Derived => (derived_personality(&tally), derived_learning_style(&tally)),
        };

        let recommended_careers = self.recommend(&career_scores);

        Ok(AssessmentResult {
            career_scores,
            personality_profile,
            recommended_careers,
            learning_style: LearningStyleReadout::new(style),
        })
    }

    /// Scores with the thread-local RNG.
    pub fn process_fresh(
        &self,
        responses: &[QuestionResponse],
    ) -> Result<AssessmentResult, ProcessingError> {
        self.process(responses, &mut rand::thread_rng())
    }

    /// Scores with a ChaCha RNG seeded from `seed`.
    pub fn process_seeded(
        &self,
        responses: &[QuestionResponse],
        seed: u64,
    ) -> Result<AssessmentResult, ProcessingError> {
        self.process(responses, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    /// Accepts the raw request payload; any shape problem becomes a `ProcessingError`.
    pub fn process_value<R: Rng + ?Sized>(
        &self,
        value: &serde_json::Value,
        rng: &mut R,
    ) -> Result<AssessmentResult, ProcessingError> {
        let responses: Vec<QuestionResponse> = serde_json::from_value(value.clone())
            .map_err(|err| ProcessingError::malformed(err.to_string()))?;
        self.process(&responses, rng)
    }

    /// Scores independent submissions in parallel. Item `i` uses a ChaCha RNG seeded
    /// with `seed + i`, so a batch is reproducible for a given seed.
    pub fn process_batch(
        &self,
        submissions: &[Vec<QuestionResponse>],
        seed: u64,
    ) -> Vec<Result<AssessmentResult, ProcessingError>> {
        submissions
            .par_iter()
            .enumerate()
            .map(|(idx, responses)| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(idx as u64));
                self.process(responses, &mut rng)
            })
            .collect()
    }

    fn career_scores<R: Rng + ?Sized>(&self, tally: &AnswerTally, rng: &mut R) -> CareerScores {
        let entries = self
            .catalog
            .categories
            .iter()
            .map(|category| {
                let score = if tally.is_empty() {
                    0
                } else {
                    let base = round_half_up(tally.fill_ratio() * 100.0 * category.score_multiplier);
                    let offset = match self.mode {
                        ScoringMode::Randomized => rng.gen_range(-JITTER_SPAN..=JITTER_SPAN),
                        ScoringMode::Derived => 0,
                    };
                    clamp_score(base.saturating_add(offset))
                };

                CareerScore {
                    career: category.name.clone(),
                    score,
                }
            })
            .collect();

        CareerScores(entries)
    }

    fn recommend(&self, scores: &CareerScores) -> Vec<RecommendedCareer> {
        let mut ranked: Vec<&CareerScore> = scores.iter().collect();
        // Stable sort: equal scores keep catalog order.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        ranked
            .into_iter()
            .take(MAX_RECOMMENDATIONS)
            .enumerate()
            .map(|(idx, entry)| {
                let description = self
                    .catalog
                    .category(&entry.career)
                    .map(|category| category.display_description())
                    .unwrap_or(crate::catalog::FALLBACK_DESCRIPTION)
                    .to_string();

                RecommendedCareer {
                    rank: idx as u32 + 1,
                    career: entry.career.clone(),
                    compatibility_score: entry.score,
                    description,
                    recommended_courses: self.catalog.courses_for(&entry.career),
                }
            })
            .collect()
    }
}

/// Scores with the built-in catalog, randomized mode and the thread-local RNG.
pub fn process_assessment(
    responses: &[QuestionResponse],
) -> Result<AssessmentResult, ProcessingError> {
    AssessmentScorer::default().process_fresh(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CareerCategory, FALLBACK_COURSE};
    use crate::types::{Answer, LearningStyle, ProcessingErrorKind};

    fn responses(answers: &[&str]) -> Vec<QuestionResponse> {
        answers
            .iter()
            .enumerate()
            .map(|(idx, answer)| QuestionResponse::new(idx as i64 + 1, *answer))
            .collect()
    }

    fn seeded(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_all_strongly_agree_scores_between_90_and_100() {
        let scorer = AssessmentScorer::default();
        let input = responses(&["Strongly Agree"; 5]);

        for seed in 0..200 {
            let result = scorer.process(&input, &mut seeded(seed)).unwrap();
            for entry in result.career_scores.iter() {
                assert!((90..=100).contains(&entry.score), "score {}", entry.score);
            }
        }
    }

    #[test]
    fn test_scores_cover_catalog() {
        let scorer = AssessmentScorer::default();
        let result = scorer
            .process(&responses(&["agree", "poor", "3"]), &mut seeded(1))
            .unwrap();

        let names: Vec<&str> = result.career_scores.iter().map(|e| e.career.as_str()).collect();
        let expected: Vec<&str> = scorer.catalog().categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_recommendations_sorted_and_ranked() {
        let scorer = AssessmentScorer::default();
        let result = scorer
            .process(&responses(&["good", "neutral", "excellent"]), &mut seeded(3))
            .unwrap();

        let recs = &result.recommended_careers;
        assert_eq!(recs.len(), 4);
        for (idx, rec) in recs.iter().enumerate() {
            assert_eq!(rec.rank, idx as u32 + 1);
            assert_eq!(Some(rec.compatibility_score), result.career_scores.get(&rec.career));
        }
        assert!(recs
            .windows(2)
            .all(|w| w[0].compatibility_score >= w[1].compatibility_score));
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let scorer = AssessmentScorer::new(
            CareerCatalog::default(),
            AnswerVocabulary::default(),
            ScoringMode::Derived,
        );
        let result = scorer
            .process(&responses(&["agree", "agree"]), &mut seeded(0))
            .unwrap();

        let order: Vec<&str> = result
            .recommended_careers
            .iter()
            .map(|r| r.career.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "Computer Science & Technology",
                "Medical & Healthcare",
                "Business & Management",
                "Engineering"
            ]
        );
        assert!(result.recommended_careers.iter().all(|r| r.compatibility_score == 80));
    }

    #[test]
    fn test_empty_responses_score_zero() {
        let scorer = AssessmentScorer::default();
        let result = scorer.process(&[], &mut seeded(9)).unwrap();

        assert_eq!(result.career_scores.len(), 4);
        assert!(result.career_scores.iter().all(|e| e.score == 0));
        assert_eq!(result.recommended_careers.len(), 4);
        assert_eq!(result.recommended_careers[0].career, "Computer Science & Technology");
    }

    #[test]
    fn test_repeated_runs_are_not_required_to_match() {
        let scorer = AssessmentScorer::default();
        let input = responses(&["agree", "neutral", "disagree", "good"]);

        let first = scorer.process(&input, &mut seeded(100)).unwrap();
        let differs = (101..120).any(|seed| {
            let other = scorer.process(&input, &mut seeded(seed)).unwrap();
            other.career_scores != first.career_scores
                || other.personality_profile != first.personality_profile
                || other.learning_style != first.learning_style
        });
        assert!(differs);
    }

    #[test]
    fn test_same_seed_reproduces() {
        let scorer = AssessmentScorer::default();
        let input = responses(&["agree", "interested"]);
        let a = scorer.process(&input, &mut seeded(42)).unwrap();
        let b = scorer.process(&input, &mut seeded(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derived_mode_is_deterministic() {
        let scorer = AssessmentScorer::new(
            CareerCatalog::default(),
            AnswerVocabulary::default(),
            ScoringMode::Derived,
        );
        let input = responses(&["excellent", "good", "good"]);
        let a = scorer.process(&input, &mut seeded(1)).unwrap();
        let b = scorer.process(&input, &mut seeded(2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.learning_style.primary, LearningStyle::Visual);
        // (5 + 4 + 4) / 15 = 86.67%
        assert_eq!(a.career_scores.get("Engineering"), Some(87));
    }

    #[test]
    fn test_large_catalog_truncates_to_five() {
        let mut catalog = CareerCatalog::default();
        for name in ["Law", "Arts", "Media"] {
            catalog.categories.push(CareerCategory {
                name: name.to_string(),
                score_multiplier: 1.0,
                description: String::new(),
                recommended_courses: Vec::new(),
            });
        }
        let scorer = AssessmentScorer::new(catalog, AnswerVocabulary::default(), ScoringMode::Randomized);
        let result = scorer.process(&responses(&["agree"]), &mut seeded(5)).unwrap();

        assert_eq!(result.career_scores.len(), 7);
        assert_eq!(result.recommended_careers.len(), 5);
        for rec in &result.recommended_careers {
            if rec.career == "Law" {
                assert_eq!(rec.recommended_courses, vec![FALLBACK_COURSE]);
                assert_eq!(rec.description, "Explore opportunities in this field.");
            }
        }
    }

    #[test]
    fn test_multiplier_scales_base() {
        let mut catalog = CareerCatalog::default();
        catalog.categories[0].score_multiplier = 0.5;
        let scorer = AssessmentScorer::new(catalog, AnswerVocabulary::default(), ScoringMode::Derived);
        let result = scorer
            .process(&responses(&["strongly agree", "strongly agree"]), &mut seeded(0))
            .unwrap();
        assert_eq!(result.career_scores.get("Computer Science & Technology"), Some(50));
        assert_eq!(result.career_scores.get("Engineering"), Some(100));
    }

    #[test]
    fn test_oversized_multiplier_saturates_instead_of_overflowing() {
        let mut catalog = CareerCatalog::default();
        catalog.categories[0].score_multiplier = 1e300;
        let scorer = AssessmentScorer::new(catalog, AnswerVocabulary::default(), ScoringMode::Randomized);
        let tally = AnswerTally::from_values(&[5, 5, 5]);

        for seed in 0..50 {
            let scores = scorer.career_scores(&tally, &mut seeded(seed));
            assert_eq!(scores.get("Computer Science & Technology"), Some(100));
        }
    }

    #[test]
    fn test_oversized_multiplier_is_rejected_before_scoring() {
        let mut catalog = CareerCatalog::default();
        catalog.categories[0].score_multiplier = 1e300;
        let scorer = AssessmentScorer::new(catalog, AnswerVocabulary::default(), ScoringMode::Randomized);
        let err = scorer
            .process(&responses(&["strongly agree"]), &mut seeded(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ProcessingErrorKind::InvalidCatalog);
    }

    #[test]
    fn test_invalid_vocabulary_fails_whole_run() {
        let vocabulary = AnswerVocabulary::from_json(
            r#"{"version":"2.0","entries":[{"phrase":"love it","value":9}]}"#,
        )
        .unwrap();
        let scorer = AssessmentScorer::new(CareerCatalog::default(), vocabulary, ScoringMode::Derived);
        let err = scorer
            .process(&responses(&["love it"]), &mut seeded(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ProcessingErrorKind::InvalidVocabulary);
    }

    #[test]
    fn test_malformed_payload_is_processing_error() {
        let scorer = AssessmentScorer::default();
        let err = scorer
            .process_value(&serde_json::json!({"answers": 1}), &mut seeded(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ProcessingErrorKind::MalformedResponses);
        assert_eq!(err.to_string(), "Failed to process assessment");

        let err = scorer
            .process_value(&serde_json::json!([{"questionId": 1, "answer": true}]), &mut seeded(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ProcessingErrorKind::MalformedResponses);
    }

    #[test]
    fn test_process_value_accepts_mixed_answers() {
        let scorer = AssessmentScorer::default();
        let payload = serde_json::json!([
            {"questionId": 1, "answer": "Strongly Agree"},
            {"questionId": "2", "answer": 4},
            {"questionId": 3, "answer": "xyz"}
        ]);
        let result = scorer.process_value(&payload, &mut seeded(8)).unwrap();
        assert_eq!(result.career_scores.len(), 4);
    }

    #[test]
    fn test_invalid_catalog_fails_whole_run() {
        let scorer = AssessmentScorer::new(
            CareerCatalog {
                version: "0".to_string(),
                categories: Vec::new(),
            },
            AnswerVocabulary::default(),
            ScoringMode::Randomized,
        );
        let err = scorer.process(&responses(&["agree"]), &mut seeded(0)).unwrap_err();
        assert_eq!(err.kind(), &ProcessingErrorKind::InvalidCatalog);
    }

    #[test]
    fn test_batch_matches_sequential_with_same_seeds() {
        let scorer = AssessmentScorer::default();
        let batch = vec![
            responses(&["agree", "poor"]),
            responses(&["excellent"]),
            Vec::new(),
        ];
        let parallel = scorer.process_batch(&batch, 77);

        for (idx, outcome) in parallel.iter().enumerate() {
            let mut rng = seeded(77 + idx as u64);
            let sequential = scorer.process(&batch[idx], &mut rng).unwrap();
            assert_eq!(outcome.as_ref().unwrap(), &sequential);
        }
    }

    #[test]
    fn test_output_json_keys() {
        let result = process_assessment(&[QuestionResponse {
            question_id: crate::types::QuestionId::Number(1),
            answer: Answer::Integer(4),
        }])
        .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        for key in ["careerScores", "personalityProfile", "recommendedCareers", "learningStyle"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json["recommendedCareers"][0].get("compatibility_score").is_some());
        assert!(json["recommendedCareers"][0].get("recommended_courses").is_some());
    }

    #[test]
    fn test_scoring_mode_parse() {
        assert_eq!(ScoringMode::parse("Derived"), Some(ScoringMode::Derived));
        assert_eq!(ScoringMode::parse("randomized"), Some(ScoringMode::Randomized));
        assert_eq!(ScoringMode::parse("other"), None);
    }
}
