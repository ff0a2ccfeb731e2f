//! # career-algo - career assessment scoring
//!
//! Pure Rust scoring pipeline for the CareerNavigator quiz:
//!
//! - **Answer normalisation** - vocabulary phrases and numeric answers onto a 1..=5 scale
//! - **Career scores** - per-category percentage, optionally jittered by ±10
//! - **Personality / learning style** - random readout or one derived from the answers
//! - **Recommendations** - top five categories with description and course list
//!
//! ## Modules
//!
//! - [`answer`] - answer vocabulary table
//! - [`catalog`] - career category catalog (versionable configuration)
//! - [`profile`] - answer tally, personality and learning-style generators
//! - [`scoring`] - `AssessmentScorer` and `process_assessment`
//! - [`sanitize`] - numeric helpers (parsing, rounding, clamping)
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use career_algo::{AssessmentScorer, QuestionResponse};
//! use rand::SeedableRng;
//!
//! let scorer = AssessmentScorer::default();
//! let responses = vec![
//!     QuestionResponse::new(1, "Strongly Agree"),
//!     QuestionResponse::new(2, "4"),
//! ];
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
//! let result = scorer.process(&responses, &mut rng).unwrap();
//! assert_eq!(result.career_scores.len(), 4);
//! ```

pub mod answer;
pub mod catalog;
pub mod profile;
pub mod sanitize;
pub mod scoring;
pub mod types;

pub use answer::{AnswerVocabulary, VocabularyEntry};
pub use catalog::{CareerCatalog, CareerCategory};
pub use scoring::{process_assessment, AssessmentScorer, ScoringMode};
pub use types::*;
