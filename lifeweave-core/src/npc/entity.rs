//! NPC entities and their lifecycle.

use super::relationship::NpcRelationship;
use crate::model::CharacterId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpcId(Uuid);

impl NpcId {
    /// Create a new unique NPC ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NpcId {
    fn default() -> Self {
        Self::new()
    }
}

/// How established an NPC is in the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcLifecycle {
    /// Named in passing, never appeared.
    Mention,
    Encounter,
    Recurring,
    Significant,
    /// Promoted by hand. Never changed automatically.
    Core,
}

impl NpcLifecycle {
    /// Lifecycle implied by a total appearance count.
    pub fn for_appearances(total: u32) -> Self {
        match total {
            0 => NpcLifecycle::Mention,
            1 => NpcLifecycle::Encounter,
            2 | 3 => NpcLifecycle::Recurring,
            _ => NpcLifecycle::Significant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NpcLifecycle::Mention => "mention",
            NpcLifecycle::Encounter => "encounter",
            NpcLifecycle::Recurring => "recurring",
            NpcLifecycle::Significant => "significant",
            NpcLifecycle::Core => "core",
        }
    }
}

/// One appearance of an NPC in a character's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub character_id: CharacterId,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
    pub interaction: String,
}

/// A non-player character tracked across the cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    pub id: NpcId,
    /// How characters refer to them ("the ferryman").
    pub alias: String,
    /// Proper name, once known.
    pub name: Option<String>,
    pub lifecycle: NpcLifecycle,
    pub relationships: Vec<NpcRelationship>,
    pub appearances: Vec<Appearance>,
    pub total_appearances: u32,
    pub first_seen_year: i32,
}

impl Npc {
    pub fn new(alias: impl Into<String>, first_seen_year: i32) -> Self {
        Self {
            id: NpcId::new(),
            alias: alias.into(),
            name: None,
            lifecycle: NpcLifecycle::Mention,
            relationships: Vec::new(),
            appearances: Vec::new(),
            total_appearances: 0,
            first_seen_year,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if known, else alias.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.alias)
    }

    /// Exact, case-insensitive match on the proper name.
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.trim();
        !query.is_empty()
            && self
                .name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(query))
    }

    /// Alias contains the query or the query contains the alias.
    pub fn matches_alias(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        let alias = self.alias.trim().to_lowercase();
        if query.is_empty() || alias.is_empty() {
            return false;
        }
        alias.contains(&query) || query.contains(&alias)
    }

    /// Record an appearance and re-derive the lifecycle.
    pub fn touch(&mut self, appearance: Appearance) {
        self.appearances.push(appearance);
        self.total_appearances += 1;
        self.refresh_lifecycle();
    }

    /// Only ever raises the lifecycle; `Core` is left alone.
    pub fn refresh_lifecycle(&mut self) {
        if self.lifecycle == NpcLifecycle::Core {
            return;
        }
        let implied = NpcLifecycle::for_appearances(self.total_appearances);
        if implied > self.lifecycle {
            self.lifecycle = implied;
        }
    }

    pub fn relationship_with(&self, character_id: &CharacterId) -> Option<&NpcRelationship> {
        self.relationships.iter().find(|r| &r.character_id == character_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appearance(year: i32) -> Appearance {
        Appearance {
            character_id: CharacterId::new("a"),
            year,
            event_title: None,
            interaction: "talked".to_string(),
        }
    }

    #[test]
    fn test_npc_creation() {
        let npc = Npc::new("the ferryman", 3);
        assert_eq!(npc.lifecycle, NpcLifecycle::Mention);
        assert_eq!(npc.display_name(), "the ferryman");
        assert_eq!(npc.first_seen_year, 3);
    }

    #[test]
    fn test_matching() {
        let npc = Npc::new("old ferryman", 0).with_name("Oren");
        assert!(npc.matches_name("oren"));
        assert!(!npc.matches_name("Ore"));
        assert!(npc.matches_alias("ferryman"));
        assert!(npc.matches_alias("the old ferryman of the north bank"));
        assert!(!npc.matches_alias("baker"));
        assert!(!npc.matches_alias("  "));
    }

    #[test]
    fn test_lifecycle_thresholds() {
        let mut npc = Npc::new("x", 0);
        let expected = [
            NpcLifecycle::Encounter,
            NpcLifecycle::Recurring,
            NpcLifecycle::Recurring,
            NpcLifecycle::Significant,
            NpcLifecycle::Significant,
        ];
        for (year, lifecycle) in expected.into_iter().enumerate() {
            npc.touch(appearance(year as i32));
            assert_eq!(npc.lifecycle, lifecycle);
        }
    }

    #[test]
    fn test_core_is_terminal() {
        let mut npc = Npc::new("x", 0);
        npc.lifecycle = NpcLifecycle::Core;
        npc.touch(appearance(1));
        assert_eq!(npc.lifecycle, NpcLifecycle::Core);
    }
}
