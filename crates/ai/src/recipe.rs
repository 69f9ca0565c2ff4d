//! Strict recipe schema and the parse boundary for model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "moderate" => Some(Difficulty::Medium),
            "hard" | "difficult" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    /// Whether the user already has it.
    pub available: bool,
}

/// A validated recipe.
///
/// `step_timers` and `step_tips` are parallel to `steps` (same length); a
/// timer of 0 means the step has no timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub title: String,
    pub time: String,
    pub difficulty: Difficulty,
    /// How well the recipe fits the selection, 0..=100.
    pub match_score: u8,
    pub image: Option<String>,
    pub description: String,
    pub steps: Vec<String>,
    pub step_timers: Vec<u32>,
    pub step_tips: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
}

/// Shape the model is asked to produce. Loosely typed on purpose: the
/// coercion into [`Recipe`] decides what is acceptable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecipe {
    title: String,
    #[serde(default)]
    time: Option<Value>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default, rename = "match")]
    match_score: Option<Value>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    description: Option<String>,
    steps: Vec<String>,
    #[serde(default)]
    step_timers: Option<Vec<Value>>,
    #[serde(default)]
    step_tips: Option<Vec<String>>,
    #[serde(default)]
    ingredients: Vec<RawIngredient>,
}

#[derive(Debug, Deserialize)]
struct RawIngredient {
    name: String,
    #[serde(default)]
    available: bool,
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse raw model text into recipes. Any invalid recipe rejects the whole
/// response.
pub fn parse_recipes(text: &str) -> Result<Vec<Recipe>, AiError> {
    let body = strip_code_fences(text);
    let raw: Vec<RawRecipe> = serde_json::from_str(body).map_err(|e| AiError::Parse(e.to_string()))?;
    raw.into_iter()
        .enumerate()
        .map(|(idx, r)| r.validate().map_err(|msg| AiError::Schema(format!("recipe {idx}: {msg}"))))
        .collect()
}

impl RawRecipe {
    fn validate(self) -> Result<Recipe, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("empty title".to_string());
        }

        let steps: Vec<String> = self.steps.into_iter().map(|s| s.trim().to_string()).collect();
        if steps.is_empty() || steps.iter().any(|s| s.is_empty()) {
            return Err("steps must be a non-empty list of non-empty strings".to_string());
        }

        let step_timers = match self.step_timers {
            None => vec![0; steps.len()],
            Some(timers) if timers.len() == steps.len() => timers
                .iter()
                .map(minutes)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| "stepTimers must be non-negative minute counts".to_string())?,
            Some(timers) => {
                return Err(format!("{} stepTimers for {} steps", timers.len(), steps.len()));
            }
        };

        let step_tips = match self.step_tips {
            None => vec![String::new(); steps.len()],
            Some(tips) if tips.len() == steps.len() => tips,
            Some(tips) => return Err(format!("{} stepTips for {} steps", tips.len(), steps.len())),
        };

        let difficulty = match self.difficulty.as_deref() {
            None => Difficulty::Medium,
            Some(raw) => Difficulty::parse(raw).ok_or_else(|| format!("unknown difficulty {raw:?}"))?,
        };

        let match_score = match &self.match_score {
            None => 0,
            Some(v) => percent(v).ok_or_else(|| format!("match must be 0-100, got {v}"))?,
        };

        let time = match self.time {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => format!("{n}m"),
            Some(other) => return Err(format!("time must be text, got {other}")),
        };

        let ingredients = self
            .ingredients
            .into_iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| RecipeIngredient {
                name: i.name.trim().to_string(),
                available: i.available,
            })
            .collect();

        Ok(Recipe {
            title,
            time,
            difficulty,
            match_score,
            image: self.image.filter(|s| !s.trim().is_empty()),
            description: self.description.unwrap_or_default().trim().to_string(),
            steps,
            step_timers,
            step_tips,
            ingredients,
        })
    }
}

fn minutes(v: &Value) -> Option<u32> {
    match v {
        Value::Null => Some(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|m| u32::try_from(m).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn percent(v: &Value) -> Option<u8> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    if (0.0..=100.0).contains(&n) { Some(n.round() as u8) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"```json
[
  {
    "title": "Pan-Seared Wild Salmon with Kale",
    "time": "25m",
    "difficulty": "Medium",
    "match": "98%",
    "image": "https://images.example.com/salmon.jpg",
    "description": "Crispy salmon over wilted kale.",
    "steps": ["Pat the salmon dry.", "Sear skin-side down.", "Wilt the kale."],
    "stepTimers": [0, 4, 2],
    "stepTips": ["Moisture prevents browning.", "Don't crowd the pan.", "Keep it bright green."],
    "ingredients": [{ "name": "Wild Salmon", "available": true }, { "name": "Lemon", "available": false }]
  }
]
```"#;

    #[test]
    fn parses_fenced_model_output() {
        let recipes = parse_recipes(SAMPLE).unwrap();
        assert_eq!(recipes.len(), 1);
        let r = &recipes[0];
        assert_eq!(r.difficulty, Difficulty::Medium);
        assert_eq!(r.match_score, 98);
        assert_eq!(r.step_timers, vec![0, 4, 2]);
        assert_eq!(r.step_tips.len(), r.steps.len());
        assert!(!r.ingredients[1].available);
    }

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fences("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  [2]  "), "[2]");
    }

    #[test]
    fn not_json_is_a_parse_error() {
        assert!(matches!(parse_recipes("not json"), Err(AiError::Parse(_))));
    }

    #[test]
    fn mismatched_parallel_arrays_reject_everything() {
        let text = r#"[
          {"title": "Ok", "steps": ["a"], "stepTimers": [1]},
          {"title": "Bad", "steps": ["a", "b"], "stepTimers": [1]}
        ]"#;
        assert!(matches!(parse_recipes(text), Err(AiError::Schema(_))));
    }

    #[test]
    fn missing_optional_fields_are_filled() {
        let recipes = parse_recipes(r#"[{"title": "Bowl", "steps": ["Mix", "Serve"], "time": 15}]"#).unwrap();
        let r = &recipes[0];
        assert_eq!(r.time, "15m");
        assert_eq!(r.step_timers, vec![0, 0]);
        assert_eq!(r.step_tips, vec![String::new(), String::new()]);
        assert_eq!(r.difficulty, Difficulty::Medium);
        assert_eq!(r.match_score, 0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(parse_recipes(r#"[{"title": "X", "steps": ["a"], "match": 140}]"#).is_err());
        assert!(parse_recipes(r#"[{"title": "X", "steps": ["a"], "difficulty": "Legendary"}]"#).is_err());
        assert!(parse_recipes(r#"[{"title": "X", "steps": ["a"], "stepTimers": [-3]}]"#).is_err());
        assert!(parse_recipes(r#"[{"title": "X", "steps": []}]"#).is_err());
    }

    #[test]
    fn object_instead_of_array_is_rejected() {
        assert!(parse_recipes(r#"{"title": "X", "steps": ["a"]}"#).is_err());
    }
}
