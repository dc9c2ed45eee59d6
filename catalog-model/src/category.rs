use crate::error::ModelError;
use crate::ids::CategoryID;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryID,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), ModelError> {
        let len = self.name.chars().count();
        if len == 0 || len > 100 {
            return Err(ModelError::Validation(
                "name must be between 1 and 100 characters".into(),
            ));
        }
        Ok(())
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lowercases, turns spaces into hyphens and drops anything outside
/// `[a-z0-9-]`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}
