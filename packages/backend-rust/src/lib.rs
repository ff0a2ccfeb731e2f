pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod workers;

use std::path::Path;

use career_algo::{AnswerVocabulary, AssessmentScorer, CareerCatalog, ProcessingError};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::{Database, DbInitError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("database init failed: {0}")]
    Database(#[from] DbInitError),
    #[error("seeding reference data failed: {0}")]
    Seed(sqlx::Error),
    #[error("failed to read career catalog {path}: {source}")]
    CatalogRead {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse career catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),
    #[error("invalid career catalog: {0}")]
    CatalogInvalid(#[from] ProcessingError),
    #[error("failed to read answer vocabulary {path}: {source}")]
    VocabularyRead {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse answer vocabulary: {0}")]
    VocabularyParse(serde_json::Error),
    #[error("invalid answer vocabulary: {}", .0.detail())]
    VocabularyInvalid(ProcessingError),
}

/// Loads the career catalog from `path`, or the built-in one when unset.
pub fn load_catalog(path: Option<&Path>) -> Result<CareerCatalog, AppInitError> {
    let catalog = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| AppInitError::CatalogRead {
                path: path.display().to_string(),
                source,
            })?;
            CareerCatalog::from_json(&raw)?
        }
        None => CareerCatalog::default(),
    };
    catalog.validate()?;
    Ok(catalog)
}

/// Loads the answer vocabulary from `path`, or the built-in one when unset.
pub fn load_vocabulary(path: Option<&Path>) -> Result<AnswerVocabulary, AppInitError> {
    let vocabulary = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| AppInitError::VocabularyRead {
                path: path.display().to_string(),
                source,
            })?;
            AnswerVocabulary::from_json(&raw).map_err(AppInitError::VocabularyParse)?
        }
        None => AnswerVocabulary::default(),
    };
    vocabulary
        .validate()
        .map_err(AppInitError::VocabularyInvalid)?;
    Ok(vocabulary)
}

/// Connects the database, seeds reference data if asked and builds the scorer.
pub async fn build_state(config: Config) -> Result<AppState, AppInitError> {
    let db = Database::connect(&config.database_url).await?;

    if config.seed_demo_data {
        db::seed::seed_reference_data(db.pool())
            .await
            .map_err(AppInitError::Seed)?;
    }

    let catalog = load_catalog(config.catalog_path.as_deref())?;
    tracing::info!(
        version = %catalog.version,
        categories = catalog.len(),
        mode = ?config.scoring_mode,
        "career catalog loaded"
    );
    let vocabulary = load_vocabulary(config.vocabulary_path.as_deref())?;
    tracing::info!(
        version = %vocabulary.version,
        phrases = vocabulary.entries.len(),
        "answer vocabulary loaded"
    );
    let scorer = AssessmentScorer::new(catalog, vocabulary, config.scoring_mode);

    Ok(AppState::new(config, db, scorer))
}

pub fn build_router(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app(config: Config) -> Result<axum::Router, AppInitError> {
    let state = build_state(config).await?;
    Ok(build_router(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog_loads() {
        let catalog = load_catalog(None).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version":"2.0","categories":[{{"name":"Law","description":"Argue cases.","recommended_courses":["LLB"]}}]}}"#
        )
        .unwrap();
        let catalog = load_catalog(Some(file.path())).unwrap();
        assert_eq!(catalog.version, "2.0");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_missing_catalog_file() {
        let err = load_catalog(Some(Path::new("/nonexistent/catalog.json"))).unwrap_err();
        assert!(matches!(err, AppInitError::CatalogRead { .. }));
    }

    #[test]
    fn test_vocabulary_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version":"2.0","entries":[{{"phrase":"love it","value":5}},{{"phrase":"meh","value":2}}]}}"#
        )
        .unwrap();
        let vocabulary = load_vocabulary(Some(file.path())).unwrap();
        assert_eq!(vocabulary.version, "2.0");
        assert_eq!(vocabulary.lookup("Love It"), Some(5));
        assert_eq!(vocabulary.lookup("agree"), None);
        assert_eq!(load_vocabulary(None).unwrap(), AnswerVocabulary::default());
    }

    #[test]
    fn test_invalid_vocabulary_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version":"2.0","entries":[{{"phrase":"love it","value":7}}]}}"#
        )
        .unwrap();
        let err = load_vocabulary(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppInitError::VocabularyInvalid(_)));
        assert_eq!(
            err.to_string(),
            "invalid answer vocabulary: value 7 out of range for love it"
        );

        let mut dup = tempfile::NamedTempFile::new().unwrap();
        write!(
            dup,
            r#"{{"version":"2.0","entries":[{{"phrase":"Yes","value":5}},{{"phrase":"yes","value":4}}]}}"#
        )
        .unwrap();
        assert!(matches!(
            load_vocabulary(Some(dup.path())),
            Err(AppInitError::VocabularyInvalid(_))
        ));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(matches!(
            load_vocabulary(Some(garbage.path())),
            Err(AppInitError::VocabularyParse(_))
        ));

        let err = load_vocabulary(Some(Path::new("/nonexistent/vocabulary.json"))).unwrap_err();
        assert!(matches!(err, AppInitError::VocabularyRead { .. }));
    }
}
