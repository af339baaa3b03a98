//! Flattened character view for consumers that don't want the full profile.

use super::classify::{self, LifeStageRules, LifeStatus};
use super::compute_with_rules;
use crate::model::{CharacterId, ImprintKind, Memory, Seed};
use serde::{Deserialize, Serialize};

/// Coarse 0-100 stats derived from imprint totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub insight: u8,
    pub emotion: u8,
    pub skill: u8,
    pub bonds: u8,
    pub trauma: u8,
    pub conviction: u8,
}

/// A character as it stands in a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterState {
    pub id: CharacterId,
    pub name: String,
    pub alias: Option<String>,
    pub age: i32,
    pub year: i32,
    pub status: LifeStatus,
    pub stats: CharacterStats,
    pub emotional_state: String,
    pub emotional_weight: u8,
    pub dominant_traits: Vec<String>,
    pub color: String,
}

fn stat_from(total: u32) -> u8 {
    (total / 4).min(100) as u8
}

pub fn to_character_view(seed: &Seed, memories: &[Memory], year: i32) -> CharacterState {
    to_character_view_with_rules(seed, memories, year, &LifeStageRules::default())
}

/// Build the view from memories up to and including `year`.
pub fn to_character_view_with_rules(
    seed: &Seed,
    memories: &[Memory],
    year: i32,
    rules: &LifeStageRules,
) -> CharacterState {
    let visible: Vec<Memory> = memories
        .iter()
        .filter(|m| m.character_id == seed.id && m.year <= year)
        .cloned()
        .collect();
    let profile = compute_with_rules(seed, &visible, rules);

    let mut totals = [0u32; 5];
    for imprint in visible.iter().flat_map(|m| m.imprints.iter()) {
        let slot = match imprint.kind {
            ImprintKind::Insight => 0,
            ImprintKind::Emotion => 1,
            ImprintKind::Skill => 2,
            ImprintKind::Relationship => 3,
            ImprintKind::Trauma => 4,
            _ => continue,
        };
        totals[slot] += u32::from(imprint.intensity);
    }

    let stats = CharacterStats {
        insight: stat_from(totals[0]),
        emotion: stat_from(totals[1]),
        skill: stat_from(totals[2]),
        bonds: stat_from(totals[3]),
        trauma: stat_from(totals[4]),
        conviction: profile.beliefs.iter().map(|b| b.conviction).max().unwrap_or(0),
    };

    let latest_feeling = visible.iter().rev().find_map(|m| {
        m.imprints_of(ImprintKind::Emotion)
            .last()
            .map(|i| (i.content.trim().to_string(), m.emotional_weight))
    });
    let (emotional_state, emotional_weight) =
        latest_feeling.unwrap_or_else(|| ("steady".to_string(), 0));

    let age = seed.age_at(year);
    CharacterState {
        id: seed.id.clone(),
        name: profile.display_name.clone(),
        alias: profile.alias.clone(),
        age,
        year,
        status: classify::infer_status(age, year, &visible, rules),
        stats,
        emotional_state,
        emotional_weight,
        dominant_traits: profile
            .dominant_traits(3)
            .into_iter()
            .map(|t| t.name.clone())
            .collect(),
        color: seed.color.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Imprint, Season};

    #[test]
    fn test_view_ignores_future_memories() {
        let seed = Seed::new("lio", "Lio", 0).with_color("teal");
        let id = seed.id.clone();
        let memories = vec![
            Memory::new(id.clone(), 3, Season::Spring, "fear", vec![
                Imprint::new(ImprintKind::Emotion, "afraid of the dark", 60),
            ])
            .unwrap()
            .with_weight(55),
            Memory::new(id, 9, Season::Spring, "joy", vec![
                Imprint::new(ImprintKind::Emotion, "elated", 80),
            ])
            .unwrap(),
        ];

        let view = to_character_view(&seed, &memories, 5);
        assert_eq!(view.age, 5);
        assert_eq!(view.emotional_state, "afraid of the dark");
        assert_eq!(view.emotional_weight, 55);
        assert_eq!(view.stats.emotion, 15);
        assert_eq!(view.status, LifeStatus::Childhood);
        assert_eq!(view.color, "teal");
    }

    #[test]
    fn test_view_defaults_to_steady() {
        let seed = Seed::new("lio", "Lio", 0);
        let view = to_character_view(&seed, &[], 20);
        assert_eq!(view.emotional_state, "steady");
        assert_eq!(view.status, LifeStatus::Active);
        assert_eq!(view.stats, CharacterStats::default());
    }
}
