//! Character seeds.

use super::CharacterId;
use serde::{Deserialize, Serialize};

/// The origin record of a character, fixed until explicitly edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    pub id: CharacterId,
    pub codename: String,
    pub birth_year: i32,
    #[serde(default)]
    pub initial_condition: String,
    #[serde(default)]
    pub temperament: String,
    #[serde(default)]
    pub latent_ability: String,
    /// The core psychological deficit the character carries.
    #[serde(default)]
    pub wound: String,
    #[serde(default)]
    pub physical_traits: Vec<String>,
    #[serde(default)]
    pub color: String,
}

impl Seed {
    pub fn new(id: impl Into<String>, codename: impl Into<String>, birth_year: i32) -> Self {
        Self {
            id: CharacterId::new(id),
            codename: codename.into(),
            birth_year,
            initial_condition: String::new(),
            temperament: String::new(),
            latent_ability: String::new(),
            wound: String::new(),
            physical_traits: Vec::new(),
            color: String::new(),
        }
    }

    pub fn with_initial_condition(mut self, condition: impl Into<String>) -> Self {
        self.initial_condition = condition.into();
        self
    }

    pub fn with_temperament(mut self, temperament: impl Into<String>) -> Self {
        self.temperament = temperament.into();
        self
    }

    pub fn with_latent_ability(mut self, ability: impl Into<String>) -> Self {
        self.latent_ability = ability.into();
        self
    }

    pub fn with_wound(mut self, wound: impl Into<String>) -> Self {
        self.wound = wound.into();
        self
    }

    pub fn with_physical_trait(mut self, physical_trait: impl Into<String>) -> Self {
        self.physical_traits.push(physical_trait.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Age in whole years at `year`. Negative before birth.
    pub fn age_at(&self, year: i32) -> i32 {
        year - self.birth_year
    }

    /// Apply an edit in place. Unset fields are left alone.
    pub fn apply(&mut self, edit: SeedEdit) {
        if let Some(codename) = edit.codename {
            self.codename = codename;
        }
        if let Some(birth_year) = edit.birth_year {
            self.birth_year = birth_year;
        }
        if let Some(condition) = edit.initial_condition {
            self.initial_condition = condition;
        }
        if let Some(temperament) = edit.temperament {
            self.temperament = temperament;
        }
        if let Some(ability) = edit.latent_ability {
            self.latent_ability = ability;
        }
        if let Some(wound) = edit.wound {
            self.wound = wound;
        }
        if let Some(traits) = edit.physical_traits {
            self.physical_traits = traits;
        }
        if let Some(color) = edit.color {
            self.color = color;
        }
    }
}

/// A partial update to a [`Seed`]. The identifier cannot be edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedEdit {
    pub codename: Option<String>,
    pub birth_year: Option<i32>,
    pub initial_condition: Option<String>,
    pub temperament: Option<String>,
    pub latent_ability: Option<String>,
    pub wound: Option<String>,
    pub physical_traits: Option<Vec<String>>,
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_at() {
        let seed = Seed::new("wren", "Wren", 3);
        assert_eq!(seed.age_at(3), 0);
        assert_eq!(seed.age_at(15), 12);
        assert_eq!(seed.age_at(1), -2);
    }

    #[test]
    fn test_apply_edit_only_touches_set_fields() {
        let mut seed = Seed::new("wren", "Wren", 3)
            .with_wound("abandoned at the gate")
            .with_color("#aa3300");

        seed.apply(SeedEdit {
            codename: Some("Little Wren".into()),
            ..Default::default()
        });

        assert_eq!(seed.codename, "Little Wren");
        assert_eq!(seed.wound, "abandoned at the gate");
        assert_eq!(seed.color, "#aa3300");
        assert_eq!(seed.id.as_str(), "wren");
    }

    #[test]
    fn test_seed_deserializes_with_sparse_fields() {
        let seed: Seed =
            serde_json::from_str(r#"{"id":"kai","codename":"Kai","birthYear":-4}"#).unwrap();
        assert_eq!(seed.birth_year, -4);
        assert!(seed.physical_traits.is_empty());
    }
}
