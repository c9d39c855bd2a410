//! Static card catalog: category name -> list of card items.
//!
//! Loaded once at startup from a JSON file and never mutated afterwards.

use crate::types::{CatalogEntry, Category};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog is missing category '{0}'")]
    MissingCategory(Category),
    #[error("category '{0}' has no entries")]
    EmptyCategory(Category),
    #[error("duplicate value '{value}' in category '{category}'")]
    DuplicateValue { category: Category, value: String },
}

/// Immutable lookup table over the eight categories.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    entries: HashMap<Category, Vec<CatalogEntry>>,
}

impl CardCatalog {
    /// Build from pre-parsed entries, validating completeness and per-category
    /// value uniqueness.
    pub fn new(entries: HashMap<Category, Vec<CatalogEntry>>) -> Result<Self, CatalogError> {
        for category in Category::ALL {
            let items = entries
                .get(&category)
                .ok_or(CatalogError::MissingCategory(category))?;
            if items.is_empty() {
                return Err(CatalogError::EmptyCategory(category));
            }
            let mut seen = std::collections::HashSet::new();
            for item in items {
                if !seen.insert(item.value.as_str()) {
                    return Err(CatalogError::DuplicateValue {
                        category,
                        value: item.value.clone(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: HashMap<Category, Vec<CatalogEntry>> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn load(path: &str) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn items(&self, category: Category) -> &[CatalogEntry] {
        // Constructor guarantees every category is present and non-empty.
        &self.entries[&category]
    }

    pub fn len(&self, category: Category) -> usize {
        self.items(category).len()
    }
}

#[cfg(test)]
pub(crate) fn test_catalog(per_category: usize) -> CardCatalog {
    let mut entries = HashMap::new();
    for category in Category::ALL {
        let items = (0..per_category)
            .map(|i| CatalogEntry {
                value: format!("{category}-{i}"),
                description: format!("test card {i} for {category}"),
                experience: None,
            })
            .collect();
        entries.insert(category, items);
    }
    CardCatalog::new(entries).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_catalog() {
        let json = r#"{
            "bandage": [{"value": "rope", "description": "50m of rope"}],
            "actions": [{"value": "swap", "description": "swap a trait"}],
            "fact": [{"value": "twin", "description": "has a twin"}],
            "phobia": [{"value": "darkness", "description": "fear of the dark"}],
            "health": [{"value": "healthy", "description": "no conditions"}],
            "hobby": [{"value": "chess", "description": "plays chess", "experience": 4}],
            "age": [{"value": "34"}],
            "profession": [{"value": "engineer", "description": "civil engineer", "experience": 10}]
        }"#;
        let catalog = CardCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(Category::Hobby), 1);
        assert_eq!(catalog.items(Category::Hobby)[0].experience, Some(4));
        assert_eq!(catalog.items(Category::Age)[0].description, "");
    }

    #[test]
    fn rejects_missing_category() {
        let json = r#"{"bandage": [{"value": "rope"}]}"#;
        let err = CardCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::MissingCategory(_)));
    }

    #[test]
    fn rejects_duplicate_values_within_category() {
        let mut entries = std::collections::HashMap::new();
        for category in Category::ALL {
            entries.insert(
                category,
                vec![
                    CatalogEntry {
                        value: "same".to_string(),
                        description: String::new(),
                        experience: None,
                    },
                    CatalogEntry {
                        value: "same".to_string(),
                        description: String::new(),
                        experience: None,
                    },
                ],
            );
        }
        let err = CardCatalog::new(entries).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateValue { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut entries = std::collections::HashMap::new();
        for category in Category::ALL {
            entries.insert(
                category.as_str(),
                vec![serde_json::json!({"value": "v1", "description": "d1"})],
            );
        }
        write!(file, "{}", serde_json::to_string(&entries).unwrap()).unwrap();

        let catalog = CardCatalog::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(catalog.len(Category::Fact), 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CardCatalog::load("/nonexistent/cards.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
