//! Narrative events and anchor events.

use super::{CharacterId, Season};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tags that mark an event as a "nothing happened" placeholder.
pub const PLACEHOLDER_TAGS: [&str; 2] = ["uneventful", "placeholder"];

/// Unique identifier for a narrative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// How much an event matters to the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Minor,
    Major,
    TurningPoint,
}

impl Importance {
    /// Parse loosely; unknown values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "minor" => Some(Importance::Minor),
            "major" => Some(Importance::Major),
            "turning_point" | "turningpoint" => Some(Importance::TurningPoint),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Importance::Minor => "minor",
            Importance::Major => "major",
            Importance::TurningPoint => "turning_point",
        }
    }
}

/// One simulated plot beat. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeEvent {
    pub id: EventId,
    pub character_id: CharacterId,
    pub year: i32,
    pub season: Season,
    pub title: String,
    pub summary: String,
    pub importance: Importance,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_characters: Vec<CharacterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_shift: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats_change: BTreeMap<String, i32>,
}

impl NarrativeEvent {
    pub fn new(
        character_id: CharacterId,
        year: i32,
        season: Season,
        title: impl Into<String>,
        importance: Importance,
    ) -> Self {
        Self {
            id: EventId::new(),
            character_id,
            year,
            season,
            title: title.into(),
            summary: String::new(),
            importance,
            tags: Vec::new(),
            related_characters: Vec::new(),
            emotional_shift: None,
            stats_change: BTreeMap::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_related(mut self, character_id: CharacterId) -> Self {
        self.related_characters.push(character_id);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// A "nothing happened" filler beat.
    pub fn is_placeholder(&self) -> bool {
        PLACEHOLDER_TAGS.iter().any(|tag| self.has_tag(tag))
    }

    /// Whether the event involves other characters of the cast.
    pub fn is_cross_character(&self) -> bool {
        !self.related_characters.is_empty()
    }
}

/// A mandatory world-level event scheduled for a specific year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEvent {
    pub year: i32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Characters that must react; empty means everyone.
    #[serde(default)]
    pub characters: Vec<CharacterId>,
}

impl AnchorEvent {
    pub fn new(year: i32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            year,
            title: title.into(),
            description: description.into(),
            characters: Vec::new(),
        }
    }

    pub fn for_character(mut self, character_id: CharacterId) -> Self {
        self.characters.push(character_id);
        self
    }

    pub fn applies_to(&self, character_id: &CharacterId) -> bool {
        self.characters.is_empty() || self.characters.contains(character_id)
    }
}
