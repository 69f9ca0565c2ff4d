use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, Entity, IngredientId};

use crate::category::Category;

/// Freshness of an ingredient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Fresh,
    Warning,
    Expired,
}

impl Status {
    /// Items with this many days left (or fewer) are flagged.
    pub const WARNING_DAYS: i64 = 2;

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Fresh => "fresh",
            Status::Warning => "warning",
            Status::Expired => "expired",
        }
    }

    /// Derive a status from a free-text expiry descriptor.
    ///
    /// Recognises "expired", "expiring soon" and leading day counts such as
    /// "2 days"; anything else ("Perfect", "Long term", "3 months") is fresh.
    pub fn from_expiry(expiry: &str) -> Status {
        let lower = expiry.trim().to_lowercase();
        if lower.contains("expired") {
            return Status::Expired;
        }
        if lower.contains("expiring soon") {
            return Status::Warning;
        }
        if lower.contains("day") {
            if let Some(days) = leading_number(&lower) {
                return if days <= 0 {
                    Status::Expired
                } else if days <= Self::WARNING_DAYS {
                    Status::Warning
                } else {
                    Status::Fresh
                };
            }
        }
        Status::Fresh
    }
}

fn leading_number(s: &str) -> Option<i64> {
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}

impl core::str::FromStr for Status {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fresh" => Ok(Status::Fresh),
            "warning" => Ok(Status::Warning),
            "expired" => Ok(Status::Expired),
            other => Err(DomainError::validation(format!("unknown status {other:?}"))),
        }
    }
}

/// An ingredient currently in the fridge (active collection).
///
/// The field names follow the persisted JSON layout (`createdAt` etc.), which
/// is shared by the local key-value store and the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Ingredient {
    /// Move to the trash, keeping the identifier.
    pub fn into_trash(self, deleted_at: DateTime<Utc>) -> TrashedIngredient {
        TrashedIngredient {
            ingredient: self,
            deleted_at,
        }
    }
}

impl Entity for Ingredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A soft-deleted ingredient, retained for restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashedIngredient {
    #[serde(flatten)]
    pub ingredient: Ingredient,
    #[serde(default = "Utc::now")]
    pub deleted_at: DateTime<Utc>,
}

impl TrashedIngredient {
    pub fn name(&self) -> &str {
        &self.ingredient.name
    }

    /// Bring the ingredient back with a fresh creation timestamp.
    pub fn restore(self, restored_at: DateTime<Utc>) -> Ingredient {
        Ingredient {
            created_at: restored_at,
            ..self.ingredient
        }
    }
}

impl Entity for TrashedIngredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.ingredient.id
    }
}

/// Input for creating an ingredient (manual add, scanner, shopping list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub category: Category,
    /// Defaults to "Fresh".
    pub expiry: Option<String>,
    /// Defaults to the status derived from `expiry`.
    pub status: Option<Status>,
}

impl NewIngredient {
    pub const DEFAULT_EXPIRY: &'static str = "Fresh";

    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            expiry: None,
            status: None,
        }
    }

    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Name as it will be stored (surrounding whitespace removed).
    pub fn normalized_name(&self) -> &str {
        self.name.trim()
    }

    /// Materialise the record with the given identity and timestamp.
    pub fn into_ingredient(self, id: IngredientId, created_at: DateTime<Utc>) -> Ingredient {
        let expiry = self
            .expiry
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_EXPIRY.to_string());
        let status = self.status.unwrap_or_else(|| Status::from_expiry(&expiry));
        Ingredient {
            id,
            name: self.name.trim().to_string(),
            category: self.category,
            expiry,
            status,
            created_at,
        }
    }
}

/// Partial update of an active ingredient. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl IngredientPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.expiry.is_none() && self.status.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        Ok(())
    }

    /// Merge the set fields into `ingredient`.
    pub fn apply(&self, ingredient: &mut Ingredient) {
        if let Some(name) = &self.name {
            ingredient.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            ingredient.category = category;
        }
        if let Some(expiry) = &self.expiry {
            ingredient.expiry = expiry.clone();
        }
        if let Some(status) = self.status {
            ingredient.status = status;
        }
    }

    /// The set fields as a JSON object (for field-level document updates).
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
