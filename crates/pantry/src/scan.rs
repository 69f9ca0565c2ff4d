//! Fridge scanner detections awaiting user confirmation.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::ingredient::NewIngredient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// An item the scanner believes it saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub quantity: u32,
    pub confidence: Confidence,
}

impl Detection {
    pub fn new(name: impl Into<String>, quantity: u32, confidence: Confidence) -> Self {
        Self {
            name: name.into(),
            quantity,
            confidence,
        }
    }

    /// Change the quantity by `delta`, never going below zero.
    pub fn adjust_quantity(&mut self, delta: i64) {
        let next = (self.quantity as i64).saturating_add(delta).max(0);
        self.quantity = u32::try_from(next).unwrap_or(u32::MAX);
    }

    /// Ingredients to add when the user confirms; zero-quantity rows are dropped.
    pub fn confirmed(detections: &[Detection]) -> Vec<NewIngredient> {
        detections
            .iter()
            .filter(|d| d.quantity > 0 && !d.name.trim().is_empty())
            .map(|d| NewIngredient::new(d.name.trim(), Category::classify(&d.name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_detections_are_not_added() {
        let mut kale = Detection::new("Tuscan Kale", 1, Confidence::Medium);
        kale.adjust_quantity(-3);
        assert_eq!(kale.quantity, 0);

        let eggs = Detection::new("Free Range Eggs", 6, Confidence::High);
        let added = Detection::confirmed(&[eggs, kale]);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "Free Range Eggs");
        assert_eq!(added[0].category, Category::Dairy);
    }
}
