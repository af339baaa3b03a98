//! Pure classifiers used by the profile calculator.
//!
//! Precedence is explicit in each function so the heuristics can be swapped
//! without touching the accumulation logic.

use crate::model::{ImprintKind, Memory};
use serde::{Deserialize, Serialize};

/// Opposite-concept pairs used to detect mutually challenging beliefs.
pub const OPPOSITE_CONCEPTS: [(&str, &str); 7] = [
    ("trust", "distrust"),
    ("hope", "despair"),
    ("love", "hate"),
    ("faith", "doubt"),
    ("freedom", "duty"),
    ("mercy", "vengeance"),
    ("belonging", "solitude"),
];

/// Tag marking memories where characters' paths converge.
pub const CONVERGENCE_TAG: &str = "convergence";

/// Coarse life stage of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Childhood,
    Training,
    Active,
    Convergence,
    Transformation,
}

impl LifeStatus {
    pub fn is_childhood(&self) -> bool {
        matches!(self, LifeStatus::Childhood)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifeStatus::Childhood => "childhood",
            LifeStatus::Training => "training",
            LifeStatus::Active => "active",
            LifeStatus::Convergence => "convergence",
            LifeStatus::Transformation => "transformation",
        }
    }
}

/// Thresholds for life-stage inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeStageRules {
    /// Below this age a character is always in childhood.
    pub training_age: i32,
    /// Below this age (and at or above `training_age`) the default is training.
    pub adult_age: i32,
    /// How many years back count as "recent".
    pub recent_years: i32,
    /// Trauma intensity at or above which a recent trauma means transformation.
    pub transformation_intensity: u8,
}

impl Default for LifeStageRules {
    fn default() -> Self {
        Self {
            training_age: 12,
            adult_age: 18,
            recent_years: 2,
            transformation_intensity: 70,
        }
    }
}

/// Infer the life stage at `year` from age and recent memories.
///
/// Order: age below training age, recent convergence tag, recent
/// high-intensity trauma, age below adulthood, otherwise active.
pub fn infer_status(age: i32, year: i32, memories: &[Memory], rules: &LifeStageRules) -> LifeStatus {
    if age < rules.training_age {
        return LifeStatus::Childhood;
    }

    let earliest = year - rules.recent_years + 1;
    let recent: Vec<&Memory> = memories
        .iter()
        .filter(|m| m.year >= earliest && m.year <= year)
        .collect();

    if recent.iter().any(|m| m.has_tag(CONVERGENCE_TAG)) {
        return LifeStatus::Convergence;
    }

    let transformed = recent.iter().any(|m| {
        m.imprints_of(ImprintKind::Trauma)
            .any(|i| i.intensity >= rules.transformation_intensity)
    });
    if transformed {
        return LifeStatus::Transformation;
    }

    if age < rules.adult_age {
        LifeStatus::Training
    } else {
        LifeStatus::Active
    }
}

/// Lowercased alphanumeric words of a text.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn mentions(words: &[String], concept: &str) -> bool {
    words.iter().any(|w| w.starts_with(concept))
}

/// Whether two belief statements express opposite concepts.
pub fn beliefs_oppose(a: &str, b: &str) -> bool {
    let a_words = words(a);
    let b_words = words(b);
    OPPOSITE_CONCEPTS.iter().any(|(x, y)| {
        (mentions(&a_words, x) && mentions(&b_words, y))
            || (mentions(&a_words, y) && mentions(&b_words, x))
    })
}
