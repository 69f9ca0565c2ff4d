//! The signed-in user's session record and profile preferences.

use serde::{Deserialize, Serialize};

use larder_core::{UnitSystem, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<UnitSystem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl UserSession {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            dietary_restrictions: Vec::new(),
            unit_system: None,
            notifications_enabled: None,
            language: None,
        }
    }

    /// Unit system for recipe quantities (metric unless chosen otherwise).
    pub fn units(&self) -> UnitSystem {
        self.unit_system.unwrap_or_default()
    }
}

/// Profile edit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub dietary_restrictions: Option<Vec<String>>,
    pub unit_system: Option<UnitSystem>,
    pub notifications_enabled: Option<bool>,
    pub language: Option<String>,
}

impl ProfilePatch {
    pub fn apply(&self, session: &mut UserSession) {
        if let Some(name) = &self.name {
            session.name = name.trim().to_string();
        }
        if let Some(tags) = &self.dietary_restrictions {
            session.dietary_restrictions = tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(units) = self.unit_system {
            session.unit_system = Some(units);
        }
        if let Some(enabled) = self.notifications_enabled {
            session.notifications_enabled = Some(enabled);
        }
        if let Some(language) = &self.language {
            session.language = Some(language.clone());
        }
    }
}
