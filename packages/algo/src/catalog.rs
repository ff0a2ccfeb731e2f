//! Career category catalog.
//!
//! Treated as configuration: the built-in default can be replaced by a JSON document
//! without code changes. Iteration order of `categories` defines tie-break order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::ProcessingError;

pub const FALLBACK_DESCRIPTION: &str = "Explore opportunities in this field.";
pub const FALLBACK_COURSE: &str = "General undergraduate programs";
/// Upper bound for `score_multiplier`; anything above only pins scores at 100.
pub const MAX_SCORE_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerCategory {
    pub name: String,
    #[serde(default = "default_multiplier")]
    pub score_multiplier: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommended_courses: Vec<String>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl CareerCategory {
    pub fn new(name: &str, description: &str, courses: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            score_multiplier: 1.0,
            description: description.to_string(),
            recommended_courses: courses.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() {
            FALLBACK_DESCRIPTION
        } else {
            &self.description
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerCatalog {
    pub version: String,
    pub categories: Vec<CareerCategory>,
}

impl Default for CareerCatalog {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            categories: vec![
                CareerCategory::new(
                    "Computer Science & Technology",
                    "Develop software, analyze data, and create technological solutions.",
                    &["B.Tech Computer Science", "BCA", "Data Science"],
                ),
                CareerCategory::new(
                    "Medical & Healthcare",
                    "Provide medical care, conduct research, and improve human health.",
                    &["MBBS", "B.Sc Nursing", "Pharmacy"],
                ),
                CareerCategory::new(
                    "Business & Management",
                    "Lead organizations, develop strategies, and manage business operations.",
                    &["BBA", "B.Com", "MBA"],
                ),
                CareerCategory::new(
                    "Engineering",
                    "Design, build, and maintain systems, structures, and technologies.",
                    &["B.Tech", "Mechanical Engineering", "Civil Engineering"],
                ),
            ],
        }
    }
}

impl CareerCatalog {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, name: &str) -> Option<&CareerCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Course list for a career, falling back to a generic entry.
    pub fn courses_for(&self, name: &str) -> Vec<String> {
        match self.category(name) {
            Some(category) if !category.recommended_courses.is_empty() => {
                category.recommended_courses.clone()
            }
            _ => vec![FALLBACK_COURSE.to_string()],
        }
    }

    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.categories.is_empty() {
            return Err(ProcessingError::invalid_catalog("catalog has no categories"));
        }

        let mut seen = HashSet::with_capacity(self.categories.len());
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ProcessingError::invalid_catalog("category with empty name"));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(ProcessingError::invalid_catalog(format!(
                    "duplicate category {}",
                    category.name
                )));
            }
            if !(0.0..=MAX_SCORE_MULTIPLIER).contains(&category.score_multiplier) {
                return Err(ProcessingError::invalid_catalog(format!(
                    "invalid multiplier for {}",
                    category.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_shape() {
        let catalog = CareerCatalog::default();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.validate().is_ok());
        assert_eq!(
            catalog.courses_for("Medical & Healthcare"),
            vec!["MBBS", "B.Sc Nursing", "Pharmacy"]
        );
        assert!(catalog
            .categories
            .iter()
            .all(|c| (c.score_multiplier - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_unknown_career_falls_back() {
        let catalog = CareerCatalog::default();
        assert_eq!(catalog.courses_for("Astronomy"), vec![FALLBACK_COURSE]);
    }

    #[test]
    fn test_catalog_from_json_defaults() {
        let catalog = CareerCatalog::from_json(
            r#"{"version":"2.0","categories":[{"name":"Law"}]}"#,
        )
        .unwrap();
        let law = catalog.category("Law").unwrap();
        assert_eq!(law.score_multiplier, 1.0);
        assert_eq!(law.display_description(), FALLBACK_DESCRIPTION);
        assert_eq!(catalog.courses_for("Law"), vec![FALLBACK_COURSE]);
    }

    #[test]
    fn test_validate_rejects_bad_catalogs() {
        let empty = CareerCatalog {
            version: "x".to_string(),
            categories: Vec::new(),
        };
        assert!(empty.validate().is_err());

        let mut dup = CareerCatalog::default();
        dup.categories.push(dup.categories[0].clone());
        assert!(dup.validate().is_err());

        let mut nan = CareerCatalog::default();
        nan.categories[1].score_multiplier = f64::NAN;
        assert!(nan.validate().is_err());

        let mut huge = CareerCatalog::default();
        huge.categories[2].score_multiplier = 1e300;
        assert!(huge.validate().is_err());

        let mut negative = CareerCatalog::default();
        negative.categories[0].score_multiplier = -0.5;
        assert!(negative.validate().is_err());

        let mut edge = CareerCatalog::default();
        edge.categories[0].score_multiplier = MAX_SCORE_MULTIPLIER;
        assert!(edge.validate().is_ok());
    }
}
