//! Simulation sessions: the single owner of all simulation state.

use crate::author_arc::AuthorArc;
use crate::grammar::NarrativeGrammar;
use crate::health::StoryPreview;
use crate::model::{AnchorEvent, CharacterId, Memory, NarrativeEvent, Seed, SeedEdit};
use crate::npc::NpcPool;
use crate::profile::{self, CharacterState, EmergentProfile, LifeStageRules};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Errors from session management.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    #[error("Character already exists: {0}")]
    DuplicateCharacter(CharacterId),
}

/// Which machine guides a character's generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionMode {
    Grammar,
    Author,
}

/// All state of one simulated story.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSession {
    pub id: String,
    pub name: String,
    pub seeds: Vec<Seed>,
    #[serde(default)]
    pub memories: BTreeMap<CharacterId, Vec<Memory>>,
    #[serde(default)]
    pub events: Vec<NarrativeEvent>,
    #[serde(default)]
    pub profiles: BTreeMap<CharacterId, EmergentProfile>,
    #[serde(default)]
    pub grammar: NarrativeGrammar,
    #[serde(default)]
    pub author_arcs: BTreeMap<CharacterId, AuthorArc>,
    /// Chosen once per character, on its first run.
    #[serde(default)]
    pub direction_modes: BTreeMap<CharacterId, DirectionMode>,
    #[serde(default)]
    pub npc_pool: NpcPool,
    #[serde(default)]
    pub anchors: Vec<AnchorEvent>,
    #[serde(default)]
    pub previews: Vec<StoryPreview>,
    #[serde(default)]
    pub life_stages: LifeStageRules,
}

impl SimulationSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            seeds: Vec::new(),
            memories: BTreeMap::new(),
            events: Vec::new(),
            profiles: BTreeMap::new(),
            grammar: NarrativeGrammar::default(),
            author_arcs: BTreeMap::new(),
            direction_modes: BTreeMap::new(),
            npc_pool: NpcPool::default(),
            anchors: Vec::new(),
            previews: Vec::new(),
            life_stages: LifeStageRules::default(),
        }
    }

    /// Builder form of [`Self::add_seed`] that ignores duplicates.
    pub fn with_seed(mut self, seed: Seed) -> Self {
        let _ = self.add_seed(seed);
        self
    }

    pub fn with_npc_capacity(mut self, max_active: usize) -> Self {
        self.npc_pool.max_active = max_active;
        self
    }

    pub fn add_seed(&mut self, seed: Seed) -> Result<(), SessionError> {
        if self.seed(&seed.id).is_some() {
            return Err(SessionError::DuplicateCharacter(seed.id));
        }
        self.profiles
            .insert(seed.id.clone(), profile::compute_with_rules(&seed, &[], &self.life_stages));
        self.seeds.push(seed);
        Ok(())
    }

    pub fn seed(&self, id: &CharacterId) -> Option<&Seed> {
        self.seeds.iter().find(|s| &s.id == id)
    }

    pub fn character_ids(&self) -> Vec<CharacterId> {
        self.seeds.iter().map(|s| s.id.clone()).collect()
    }

    pub fn memories_of(&self, id: &CharacterId) -> &[Memory] {
        self.memories.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn events_of<'a>(&'a self, id: &'a CharacterId) -> impl Iterator<Item = &'a NarrativeEvent> + 'a {
        self.events.iter().filter(move |e| &e.character_id == id)
    }

    pub fn profile(&self, id: &CharacterId) -> Option<&EmergentProfile> {
        self.profiles.get(id)
    }

    pub fn direction_mode(&self, id: &CharacterId) -> Option<DirectionMode> {
        self.direction_modes.get(id).copied()
    }

    /// Recompute a profile from the full memory list.
    pub fn recompute_profile(&mut self, id: &CharacterId) -> Result<&EmergentProfile, SessionError> {
        let seed = self
            .seed(id)
            .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))?;
        let computed = profile::compute_with_rules(seed, self.memories_of(id), &self.life_stages);
        self.profiles.insert(id.clone(), computed);
        self.profiles
            .get(id)
            .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))
    }

    /// Edit a seed in place and recompute that character's profile.
    pub fn edit_seed(&mut self, id: &CharacterId, edit: SeedEdit) -> Result<&EmergentProfile, SessionError> {
        let seed = self
            .seeds
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))?;
        seed.apply(edit);
        self.recompute_profile(id)
    }

    /// Purge everything simulated. Seeds and anchors survive.
    pub fn hard_reset(&mut self) {
        self.memories.clear();
        self.events.clear();
        self.grammar = NarrativeGrammar::default();
        self.author_arcs.clear();
        self.direction_modes.clear();
        self.npc_pool = NpcPool::new(self.npc_pool.max_active);
        self.previews.clear();
        self.profiles = self
            .seeds
            .iter()
            .map(|s| (s.id.clone(), profile::compute_with_rules(s, &[], &self.life_stages)))
            .collect();
    }

    /// Schedule a mandatory world event, kept in year order.
    pub fn add_anchor(&mut self, anchor: AnchorEvent) {
        let at = self.anchors.partition_point(|a| a.year <= anchor.year);
        self.anchors.insert(at, anchor);
    }

    /// Anchors in `[start_year, end_year]` that apply to `id`.
    pub fn anchors_for(&self, id: &CharacterId, start_year: i32, end_year: i32) -> Vec<&AnchorEvent> {
        self.anchors
            .iter()
            .filter(|a| a.year >= start_year && a.year <= end_year && a.applies_to(id))
            .collect()
    }

    /// Flattened view of a character as of `year`.
    pub fn character_view(&self, id: &CharacterId, year: i32) -> Option<CharacterState> {
        let seed = self.seed(id)?;
        Some(profile::to_character_view_with_rules(
            seed,
            self.memories_of(id),
            year,
            &self.life_stages,
        ))
    }

    /// Load a saved session from a file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the session to a file as pretty JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Imprint, ImprintKind, Importance, Season};

    fn session() -> SimulationSession {
        SimulationSession::new("test")
            .with_seed(Seed::new("lio", "Lio", 0).with_latent_ability("tidecalling"))
            .with_seed(Seed::new("mara", "Mara", 2))
    }

    #[test]
    fn test_duplicate_seed_rejected() {
        let mut session = session();
        let err = session.add_seed(Seed::new("lio", "Other", 5));
        assert!(matches!(err, Err(SessionError::DuplicateCharacter(_))));
        assert_eq!(session.seeds.len(), 2);
        assert!(session.profile(&CharacterId::new("mara")).is_some());
    }

    #[test]
    fn test_edit_seed_recomputes_profile() {
        let mut session = session();
        let id = CharacterId::new("lio");
        let edit = SeedEdit {
            codename: Some("Lio Vantar".to_string()),
            latent_ability: Some("stormreading".to_string()),
            ..SeedEdit::default()
        };
        let profile = session.edit_seed(&id, edit).unwrap();
        assert_eq!(profile.display_name, "Lio Vantar");
        assert!(profile.ability("stormreading").is_some());
        assert!(profile.ability("tidecalling").is_none());

        let missing = session.edit_seed(&CharacterId::new("nobody"), SeedEdit::default());
        assert!(matches!(missing, Err(SessionError::UnknownCharacter(_))));
    }

    #[test]
    fn test_hard_reset_keeps_seeds_and_anchors() {
        let mut session = session();
        let id = CharacterId::new("lio");
        session.add_anchor(AnchorEvent::new(5, "The flood", ""));
        session.memories.insert(
            id.clone(),
            vec![Memory::new(id.clone(), 1, Season::Spring, "m", vec![
                Imprint::new(ImprintKind::Insight, "patience", 50),
            ])
            .unwrap()],
        );
        session
            .events
            .push(NarrativeEvent::new(id.clone(), 1, Season::Spring, "e", Importance::Minor));
        session.recompute_profile(&id).unwrap();
        assert_eq!(session.profile(&id).unwrap().memory_count, 1);

        session.hard_reset();
        assert!(session.memories_of(&id).is_empty());
        assert!(session.events.is_empty());
        assert_eq!(session.profile(&id).unwrap().memory_count, 0);
        assert_eq!(session.seeds.len(), 2);
        assert_eq!(session.anchors.len(), 1);
    }

    #[test]
    fn test_anchors_sorted_and_scoped() {
        let mut session = session();
        session.add_anchor(AnchorEvent::new(9, "War", ""));
        session.add_anchor(AnchorEvent::new(3, "Trial", "").for_character(CharacterId::new("mara")));
        session.add_anchor(AnchorEvent::new(3, "Flood", ""));
        let years: Vec<i32> = session.anchors.iter().map(|a| a.year).collect();
        assert_eq!(years, vec![3, 3, 9]);

        let lio = session.anchors_for(&CharacterId::new("lio"), 0, 5);
        assert_eq!(lio.len(), 1);
        assert_eq!(lio[0].title, "Flood");
        assert_eq!(session.anchors_for(&CharacterId::new("mara"), 3, 3).len(), 2);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = session();
        session.add_anchor(AnchorEvent::new(4, "Eclipse", "The sun goes dark"));
        session.save(&path).await.unwrap();

        let loaded = SimulationSession::load(&path).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.seeds, session.seeds);
        assert_eq!(loaded.anchors, session.anchors);
        assert_eq!(loaded.profiles, session.profiles);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = SimulationSession::load("/nonexistent/session.json").await;
        assert!(matches!(result, Err(SessionError::Io(_))));
    }
}
