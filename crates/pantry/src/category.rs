//! Ingredient categories and keyword auto-classification.

use serde::{Deserialize, Serialize};

use larder_core::DomainError;

/// Shelf an ingredient is filed under.
///
/// Unknown category strings read from storage fall back to `Unsorted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Dairy,
    Veggies,
    Fruit,
    Meat,
    Seafood,
    Bakery,
    Grains,
    Frozen,
    Pantry,
    #[serde(other)]
    Unsorted,
}

/// Keyword table, checked in order; the first category with a keyword
/// contained in the lower-cased name wins.
const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Dairy, &["milk", "cheese", "yogurt", "cream", "butter", "egg"]),
    (Category::Meat, &["beef", "chicken", "pork", "steak", "lamb", "bacon"]),
    (Category::Seafood, &["fish", "salmon", "tuna", "shrimp", "crab", "clam"]),
    (Category::Bakery, &["bread", "toast", "bagel", "croissant", "muffin"]),
    (Category::Grains, &["rice", "pasta", "noodle", "oat", "quinoa"]),
    (Category::Fruit, &["apple", "banana", "orange", "grape", "berry", "lemon"]),
    (
        Category::Veggies,
        &["lettuce", "kale", "spinach", "carrot", "onion", "garlic", "potato", "tomato", "basil"],
    ),
    (Category::Frozen, &["ice cream", "pizza", "frozen"]),
    (Category::Pantry, &["oil", "sauce", "spice", "salt", "sugar", "flour", "can"]),
];

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Dairy,
        Category::Veggies,
        Category::Fruit,
        Category::Meat,
        Category::Seafood,
        Category::Bakery,
        Category::Grains,
        Category::Frozen,
        Category::Pantry,
        Category::Unsorted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dairy => "Dairy",
            Category::Veggies => "Veggies",
            Category::Fruit => "Fruit",
            Category::Meat => "Meat",
            Category::Seafood => "Seafood",
            Category::Bakery => "Bakery",
            Category::Grains => "Grains",
            Category::Frozen => "Frozen",
            Category::Pantry => "Pantry",
            Category::Unsorted => "Unsorted",
        }
    }

    /// Guess a category from an item name using the keyword table.
    pub fn classify(name: &str) -> Category {
        let lower = name.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Unsorted)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Unsorted
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}

impl core::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown category {wanted:?}")))
    }
}
