//! The shared NPC pool.

use super::entity::{Appearance, Npc, NpcLifecycle};
use super::relationship::{NpcRelationship, RoleKind};
use crate::model::{CharacterId, NarrativeEvent};
use crate::sim::response::null_as_default;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default hard capacity of a pool.
pub const DEFAULT_MAX_ACTIVE: usize = 40;

/// Nudge applied to an existing relationship's sentiment per interaction.
const SENTIMENT_DRIFT: f32 = 0.1;

/// One NPC interaction reported by the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcInteraction {
    pub event_index: Option<usize>,
    #[serde(deserialize_with = "null_as_default")]
    pub npc_alias: String,
    pub npc_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub interaction: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_new: bool,
}

impl NpcInteraction {
    pub fn new(alias: impl Into<String>, role: impl Into<String>, interaction: impl Into<String>) -> Self {
        Self {
            npc_alias: alias.into(),
            role: role.into(),
            interaction: interaction.into(),
            is_new: true,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.npc_name = Some(name.into());
        self
    }

    pub fn for_event(mut self, index: usize) -> Self {
        self.event_index = Some(index);
        self
    }

    pub fn existing(mut self) -> Self {
        self.is_new = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcPool {
    pub npcs: Vec<Npc>,
    pub max_active: usize,
}

impl Default for NpcPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE)
    }
}

impl NpcPool {
    pub fn new(max_active: usize) -> Self {
        Self {
            npcs: Vec::new(),
            max_active,
        }
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.npcs.len() >= self.max_active
    }

    /// Exact name match first, then alias containment either way.
    pub fn resolve(&self, interaction: &NpcInteraction) -> Option<usize> {
        let by_name = interaction
            .npc_name
            .as_deref()
            .and_then(|name| self.npcs.iter().position(|n| n.matches_name(name)));
        by_name.or_else(|| {
            self.npcs
                .iter()
                .position(|n| n.matches_alias(&interaction.npc_alias))
        })
    }

    pub fn find(&self, query: &str) -> Option<&Npc> {
        self.npcs
            .iter()
            .find(|n| n.matches_name(query))
            .or_else(|| self.npcs.iter().find(|n| n.matches_alias(query)))
    }

    /// Resolve and apply a batch of interactions for one character.
    ///
    /// Returns the NPCs touched, in interaction order. Unmatched
    /// interactions create a new NPC even when flagged as not new; when the
    /// pool is full they are dropped.
    pub fn process_interactions(
        &mut self,
        interactions: &[NpcInteraction],
        character_id: &CharacterId,
        year: i32,
        events: &[NarrativeEvent],
    ) -> Vec<Npc> {
        let mut touched: Vec<usize> = Vec::new();

        for interaction in interactions {
            let index = match self.resolve(interaction) {
                Some(index) => index,
                None => {
                    if interaction.npc_alias.trim().is_empty()
                        && interaction.npc_name.as_deref().map_or(true, |n| n.trim().is_empty())
                    {
                        continue;
                    }
                    if self.is_full() {
                        warn!(
                            alias = %interaction.npc_alias,
                            max = self.max_active,
                            "npc pool full, dropping new npc"
                        );
                        continue;
                    }
                    if !interaction.is_new {
                        debug!(alias = %interaction.npc_alias, "unmatched npc claimed existing, creating");
                    }
                    let alias = if interaction.npc_alias.trim().is_empty() {
                        interaction.npc_name.clone().unwrap_or_default()
                    } else {
                        interaction.npc_alias.trim().to_string()
                    };
                    self.npcs.push(Npc::new(alias, year));
                    self.npcs.len() - 1
                }
            };

            let event_title = interaction
                .event_index
                .and_then(|i| events.get(i))
                .map(|e| e.title.clone());
            let npc = &mut self.npcs[index];
            npc.touch(Appearance {
                character_id: character_id.clone(),
                year,
                event_title,
                interaction: interaction.interaction.clone(),
            });

            if npc.name.is_none() {
                if let Some(name) = interaction.npc_name.as_deref().map(str::trim) {
                    if !name.is_empty() {
                        npc.name = Some(name.to_string());
                    }
                }
            }

            match npc
                .relationships
                .iter_mut()
                .find(|r| &r.character_id == character_id)
            {
                Some(rel) => {
                    let kind = RoleKind::classify(&interaction.role);
                    if kind.is_positive() {
                        rel.adjust_sentiment(SENTIMENT_DRIFT);
                    } else if kind.is_negative() {
                        rel.adjust_sentiment(-SENTIMENT_DRIFT);
                    }
                    if !interaction.role.trim().is_empty() {
                        rel.role = interaction.role.clone();
                    }
                    rel.description = interaction.interaction.clone();
                    rel.last_year = year;
                }
                None => npc.relationships.push(NpcRelationship::new(
                    character_id.clone(),
                    interaction.role.clone(),
                    interaction.interaction.clone(),
                    year,
                )),
            }

            if !touched.contains(&index) {
                touched.push(index);
            }
        }

        touched.into_iter().map(|i| self.npcs[i].clone()).collect()
    }

    /// Manually promote to `Core`. Returns false if no NPC matches.
    pub fn promote_to_core(&mut self, query: &str) -> bool {
        let index = self
            .npcs
            .iter()
            .position(|n| n.matches_name(query))
            .or_else(|| self.npcs.iter().position(|n| n.matches_alias(query)));
        match index {
            Some(index) => {
                self.npcs[index].lifecycle = NpcLifecycle::Core;
                true
            }
            None => false,
        }
    }

    /// Short text listing of the pool, most established first.
    pub fn summary(&self, limit: usize) -> String {
        let mut npcs: Vec<&Npc> = self.npcs.iter().collect();
        npcs.sort_by(|a, b| {
            b.lifecycle
                .cmp(&a.lifecycle)
                .then(b.total_appearances.cmp(&a.total_appearances))
        });
        npcs.iter()
            .take(limit)
            .map(|n| {
                let roles: Vec<String> = n
                    .relationships
                    .iter()
                    .map(|r| format!("{} to {}", r.role, r.character_id))
                    .collect();
                format!(
                    "- {} ({}, {} appearances){}",
                    n.display_name(),
                    n.lifecycle.name(),
                    n.total_appearances,
                    if roles.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", roles.join("; "))
                    }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Importance, Season};

    fn lio() -> CharacterId {
        CharacterId::new("lio")
    }

    #[test]
    fn test_creates_and_resolves_by_alias() {
        let mut pool = NpcPool::new(5);
        pool.process_interactions(&[NpcInteraction::new("the ferryman", "guide", "rowed her across")], &lio(), 1, &[]);
        let touched = pool.process_interactions(
            &[NpcInteraction::new("ferryman", "guide", "waved").existing()],
            &lio(),
            2,
            &[],
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(touched[0].total_appearances, 2);
        assert_eq!(touched[0].lifecycle, NpcLifecycle::Recurring);
        assert_eq!(touched[0].relationships[0].description, "waved");
    }

    #[test]
    fn test_name_match_precedes_alias() {
        let mut pool = NpcPool::new(5);
        pool.npcs.push(Npc::new("the smith", 0));
        pool.npcs.push(Npc::new("old woman", 0).with_name("Maren"));
        let found = pool.resolve(&NpcInteraction::new("the smith's mother", "", "").with_name("maren"));
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_unmatched_existing_claim_still_creates() {
        let mut pool = NpcPool::new(5);
        let touched = pool.process_interactions(
            &[NpcInteraction::new("a masked stranger", "watcher", "followed him").existing()],
            &lio(),
            3,
            &[],
        );
        assert_eq!(touched.len(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_capacity_respected() {
        let mut pool = NpcPool::new(2);
        let interactions: Vec<_> = ["baker", "weaver", "miller"]
            .iter()
            .map(|a| NpcInteraction::new(*a, "neighbour", "said hello"))
            .collect();
        pool.process_interactions(&interactions, &lio(), 1, &[]);
        assert_eq!(pool.len(), 2);

        // Existing NPCs still update when full.
        let touched = pool.process_interactions(&[NpcInteraction::new("baker", "friend", "shared bread")], &lio(), 2, &[]);
        assert_eq!(touched[0].total_appearances, 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_backfills_name_and_event_title() {
        let mut pool = NpcPool::new(5);
        let events = vec![NarrativeEvent::new(lio(), 4, Season::Winter, "The frozen river", Importance::Major)];
        pool.process_interactions(&[NpcInteraction::new("ferryman", "guide", "")], &lio(), 3, &[]);
        let touched = pool.process_interactions(
            &[NpcInteraction::new("ferryman", "guide", "pulled her out").with_name("Oren").for_event(0)],
            &lio(),
            4,
            &events,
        );
        assert_eq!(touched[0].name.as_deref(), Some("Oren"));
        assert_eq!(touched[0].appearances[1].event_title.as_deref(), Some("The frozen river"));
    }

    #[test]
    fn test_promote_to_core_is_sticky() {
        let mut pool = NpcPool::new(5);
        pool.process_interactions(&[NpcInteraction::new("ferryman", "guide", "")], &lio(), 1, &[]);
        assert!(pool.promote_to_core("ferryman"));
        assert!(!pool.promote_to_core("nobody"));
        for year in 2..8 {
            pool.process_interactions(&[NpcInteraction::new("ferryman", "guide", "")], &lio(), year, &[]);
        }
        assert_eq!(pool.npcs[0].lifecycle, NpcLifecycle::Core);
    }

    #[test]
    fn test_summary_orders_by_lifecycle() {
        let mut pool = NpcPool::new(5);
        pool.process_interactions(&[NpcInteraction::new("baker", "neighbour", "")], &lio(), 1, &[]);
        for year in 1..4 {
            pool.process_interactions(&[NpcInteraction::new("ferryman", "mentor", "")], &lio(), year, &[]);
        }
        let summary = pool.summary(10);
        assert!(summary.starts_with("- ferryman (recurring, 3 appearances): mentor to lio"));
        assert!(summary.contains("baker"));
    }
}
