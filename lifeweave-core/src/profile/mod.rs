//! Emergent profiles.
//!
//! A profile is a derived read-model over a character's ordered memories. It
//! is recomputed from scratch, so `compute(seed, memories)` is a pure
//! function of its inputs: no clocks, no randomness, no hash-order iteration.

pub mod classify;
mod view;

pub use classify::{LifeStageRules, LifeStatus};
pub use view::{to_character_view, to_character_view_with_rules, CharacterState, CharacterStats};

use crate::model::{CharacterId, Imprint, ImprintKind, Memory, Seed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound for trait strength and belief conviction.
pub const STRENGTH_CAP: u8 = 100;

/// Both beliefs must exceed this conviction to challenge each other.
pub const CHALLENGE_THRESHOLD: u8 = 60;

/// Skill intensity promoting an ability to practicing.
pub const PRACTICING_INTENSITY: u8 = 40;

/// Skill intensity promoting an ability to mastered.
pub const MASTERED_INTENSITY: u8 = 70;

const NAME_PREFIX: &str = "name:";
const ALIAS_PREFIX: &str = "alias:";

/// Derived character state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergentProfile {
    pub character_id: CharacterId,
    pub display_name: String,
    pub alias: Option<String>,
    pub traits: Vec<PersonalityTrait>,
    pub beliefs: Vec<Belief>,
    pub abilities: Vec<Ability>,
    pub speech_patterns: BTreeSet<String>,
    pub bonds: Vec<Bond>,
    pub scars: Vec<Scar>,
    pub inner_conflicts: Vec<InnerConflict>,
    pub appearance_notes: Vec<String>,
    pub status: LifeStatus,
    /// Year of the latest memory, if any.
    pub last_year: Option<i32>,
    pub memory_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTrait {
    pub name: String,
    pub strength: u8,
    pub origin: String,
    pub year_formed: i32,
    pub history: Vec<TraitDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitDelta {
    pub year: i32,
    pub delta: u8,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Belief {
    pub content: String,
    pub conviction: u8,
    pub year_formed: i32,
    pub challenged: bool,
    pub challenged_by: Vec<String>,
}

/// Rung of the one-way ability ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityLevel {
    Discovered,
    Practicing,
    Mastered,
}

impl AbilityLevel {
    pub fn for_intensity(intensity: u8) -> Self {
        if intensity >= MASTERED_INTENSITY {
            AbilityLevel::Mastered
        } else if intensity >= PRACTICING_INTENSITY {
            AbilityLevel::Practicing
        } else {
            AbilityLevel::Discovered
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            AbilityLevel::Discovered => 1,
            AbilityLevel::Practicing => 2,
            AbilityLevel::Mastered => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ability {
    pub name: String,
    pub level: AbilityLevel,
    pub latent: bool,
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub year: i32,
    pub level: AbilityLevel,
    pub note: String,
}

/// Accumulated relationship imprints toward someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bond {
    pub with: String,
    pub strength: u8,
    pub last_note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scar {
    pub content: String,
    pub intensity: u8,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSource {
    OpposingBeliefs,
    Wound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerConflict {
    pub description: String,
    pub source: ConflictSource,
    pub year: i32,
}

impl EmergentProfile {
    fn blank(seed: &Seed) -> Self {
        let mut abilities = Vec::new();
        let latent = seed.latent_ability.trim();
        if !latent.is_empty() {
            abilities.push(Ability {
                name: latent.to_string(),
                level: AbilityLevel::Discovered,
                latent: true,
                milestones: vec![Milestone {
                    year: seed.birth_year,
                    level: AbilityLevel::Discovered,
                    note: "latent from birth".to_string(),
                }],
            });
        }

        Self {
            character_id: seed.id.clone(),
            display_name: seed.codename.clone(),
            alias: None,
            traits: Vec::new(),
            beliefs: Vec::new(),
            abilities,
            speech_patterns: BTreeSet::new(),
            bonds: Vec::new(),
            scars: Vec::new(),
            inner_conflicts: Vec::new(),
            appearance_notes: Vec::new(),
            status: LifeStatus::Childhood,
            last_year: None,
            memory_count: 0,
        }
    }

    /// Strongest traits first; ties keep formation order.
    pub fn dominant_traits(&self, limit: usize) -> Vec<&PersonalityTrait> {
        let mut traits: Vec<_> = self.traits.iter().collect();
        traits.sort_by(|a, b| b.strength.cmp(&a.strength));
        traits.truncate(limit);
        traits
    }

    pub fn ability(&self, name: &str) -> Option<&Ability> {
        self.abilities
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn belief(&self, content: &str) -> Option<&Belief> {
        self.beliefs
            .iter()
            .find(|b| b.content.eq_ignore_ascii_case(content.trim()))
    }

    pub fn trait_named(&self, name: &str) -> Option<&PersonalityTrait> {
        self.traits
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    fn accumulate_trait(&mut self, imprint: &Imprint, memory: &Memory, gain: u8) {
        let name = imprint.content.trim();
        if name.is_empty() {
            return;
        }
        let source = if imprint.source.is_empty() {
            memory.content.clone()
        } else {
            imprint.source.clone()
        };

        let index = match self.traits.iter().position(|t| t.name.eq_ignore_ascii_case(name)) {
            Some(index) => index,
            None => {
                self.traits.push(PersonalityTrait {
                    name: name.to_string(),
                    strength: 0,
                    origin: source.clone(),
                    year_formed: memory.year,
                    history: Vec::new(),
                });
                self.traits.len() - 1
            }
        };

        let entry = &mut self.traits[index];
        let before = entry.strength;
        entry.strength = before.saturating_add(gain).min(STRENGTH_CAP);
        entry.history.push(TraitDelta {
            year: memory.year,
            delta: entry.strength - before,
            source,
        });
    }

    fn accumulate_belief(&mut self, imprint: &Imprint, year: i32) {
        let content = imprint.content.trim();
        if content.is_empty() {
            return;
        }
        match self
            .beliefs
            .iter_mut()
            .find(|b| b.content.eq_ignore_ascii_case(content))
        {
            Some(belief) => {
                belief.conviction = belief.conviction.saturating_add(imprint.intensity).min(STRENGTH_CAP);
            }
            None => self.beliefs.push(Belief {
                content: content.to_string(),
                conviction: imprint.intensity.min(STRENGTH_CAP),
                year_formed: year,
                challenged: false,
                challenged_by: Vec::new(),
            }),
        }
    }

    fn advance_ability(&mut self, imprint: &Imprint, year: i32) {
        let name = imprint.content.trim();
        if name.is_empty() {
            return;
        }
        let reached = AbilityLevel::for_intensity(imprint.intensity);
        match self
            .abilities
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(ability) => {
                if reached > ability.level {
                    ability.level = reached;
                    ability.milestones.push(Milestone {
                        year,
                        level: reached,
                        note: imprint.source.clone(),
                    });
                }
            }
            None => self.abilities.push(Ability {
                name: name.to_string(),
                level: reached,
                latent: false,
                milestones: vec![Milestone {
                    year,
                    level: reached,
                    note: imprint.source.clone(),
                }],
            }),
        }
    }

    fn accumulate_bond(&mut self, imprint: &Imprint) {
        let (with, note) = match imprint.content.split_once(':') {
            Some((with, note)) => (with.trim(), note.trim()),
            None => (imprint.content.trim(), ""),
        };
        if with.is_empty() {
            return;
        }
        match self.bonds.iter_mut().find(|b| b.with.eq_ignore_ascii_case(with)) {
            Some(bond) => {
                bond.strength = bond.strength.saturating_add(imprint.intensity / 2).min(STRENGTH_CAP);
                bond.last_note = note.to_string();
            }
            None => self.bonds.push(Bond {
                with: with.to_string(),
                strength: (imprint.intensity / 2).min(STRENGTH_CAP),
                last_note: note.to_string(),
            }),
        }
    }

    fn apply_name(&mut self, imprint: &Imprint) {
        let content = imprint.content.trim();
        if let Some(name) = strip_prefix_ignore_case(content, NAME_PREFIX) {
            if !name.is_empty() {
                self.display_name = name.to_string();
            }
        } else if let Some(alias) = strip_prefix_ignore_case(content, ALIAS_PREFIX) {
            if !alias.is_empty() {
                self.alias = Some(alias.to_string());
            }
        }
    }

    fn mark_challenged_beliefs(&mut self) {
        for belief in &mut self.beliefs {
            belief.challenged = false;
            belief.challenged_by.clear();
        }
        let count = self.beliefs.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let (a, b) = (&self.beliefs[i], &self.beliefs[j]);
                if a.conviction > CHALLENGE_THRESHOLD
                    && b.conviction > CHALLENGE_THRESHOLD
                    && classify::beliefs_oppose(&a.content, &b.content)
                {
                    let (a_content, b_content) = (a.content.clone(), b.content.clone());
                    let year = a.year_formed.max(b.year_formed);
                    self.beliefs[i].challenged = true;
                    self.beliefs[i].challenged_by.push(b_content.clone());
                    self.beliefs[j].challenged = true;
                    self.beliefs[j].challenged_by.push(a_content.clone());
                    self.inner_conflicts.push(InnerConflict {
                        description: format!("{a_content} vs {b_content}"),
                        source: ConflictSource::OpposingBeliefs,
                        year,
                    });
                }
            }
        }
    }

    fn detect_reopened_wound(&mut self, wound: &str) {
        let wound_words: Vec<String> = classify::words(wound)
            .into_iter()
            .filter(|w| w.len() >= 4)
            .collect();
        if wound_words.is_empty() {
            return;
        }
        let latest = self
            .scars
            .iter()
            .filter(|scar| classify::words(&scar.content).iter().any(|w| wound_words.contains(w)))
            .map(|scar| scar.year)
            .max();
        if let Some(year) = latest {
            self.inner_conflicts.push(InnerConflict {
                description: format!("wound reopened: {}", wound.trim()),
                source: ConflictSource::Wound,
                year,
            });
        }
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| text[prefix.len()..].trim())
}

/// Compute a profile with default life-stage rules.
pub fn compute(seed: &Seed, memories: &[Memory]) -> EmergentProfile {
    compute_with_rules(seed, memories, &LifeStageRules::default())
}

/// Compute a profile from the seed and the character's ordered memories.
///
/// Memories belonging to other characters are ignored.
pub fn compute_with_rules(seed: &Seed, memories: &[Memory], rules: &LifeStageRules) -> EmergentProfile {
    let mut profile = EmergentProfile::blank(seed);
    let own: Vec<Memory> = memories
        .iter()
        .filter(|m| m.character_id == seed.id)
        .cloned()
        .collect();

    for memory in &own {
        for imprint in &memory.imprints {
            match imprint.kind {
                ImprintKind::Insight => profile.accumulate_trait(imprint, memory, imprint.intensity / 2),
                ImprintKind::Emotion => profile.accumulate_trait(imprint, memory, imprint.intensity / 3),
                ImprintKind::Belief => profile.accumulate_belief(imprint, memory.year),
                ImprintKind::Skill => profile.advance_ability(imprint, memory.year),
                ImprintKind::Speech => {
                    let pattern = imprint.content.trim();
                    if !pattern.is_empty() {
                        profile.speech_patterns.insert(pattern.to_string());
                    }
                }
                ImprintKind::Name => profile.apply_name(imprint),
                ImprintKind::Relationship => profile.accumulate_bond(imprint),
                ImprintKind::Trauma => profile.scars.push(Scar {
                    content: imprint.content.trim().to_string(),
                    intensity: imprint.intensity,
                    year: memory.year,
                }),
            }
            if let Some(change) = &imprint.appearance_change {
                profile.appearance_notes.push(change.trim().to_string());
            }
        }
    }

    profile.memory_count = own.len();
    profile.last_year = own.last().map(|m| m.year);
    profile.mark_challenged_beliefs();
    profile.detect_reopened_wound(&seed.wound);

    let reference_year = profile.last_year.unwrap_or(seed.birth_year);
    profile.status = classify::infer_status(seed.age_at(reference_year), reference_year, &own, rules);
    profile
}
