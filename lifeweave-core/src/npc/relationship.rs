//! Relationships between NPCs and cast characters.

use crate::model::CharacterId;
use serde::{Deserialize, Serialize};

const SUPPORTIVE: [&str; 9] = [
    "mentor", "friend", "ally", "guardian", "protector", "teacher", "family", "healer", "lover",
];
const HOSTILE: [&str; 7] = [
    "enemy", "antagonist", "bully", "tormentor", "abuser", "captor", "hunter",
];
const TRANSACTIONAL: [&str; 6] = ["merchant", "trader", "employer", "client", "patron", "informant"];
const COMPETITIVE: [&str; 4] = ["rival", "competitor", "challenger", "opponent"];

/// Broad reading of an NPC's role toward a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Supportive,
    Hostile,
    Transactional,
    Competitive,
    Neutral,
}

impl RoleKind {
    /// Classify role text. Hostile wins over supportive when both appear.
    pub fn classify(role: &str) -> Self {
        let role = role.to_lowercase();
        let hits = |table: &[&str]| table.iter().any(|k| role.contains(k));
        if hits(&HOSTILE) {
            RoleKind::Hostile
        } else if hits(&SUPPORTIVE) {
            RoleKind::Supportive
        } else if hits(&COMPETITIVE) {
            RoleKind::Competitive
        } else if hits(&TRANSACTIONAL) {
            RoleKind::Transactional
        } else {
            RoleKind::Neutral
        }
    }

    /// Initial sentiment (-1.0 to 1.0).
    pub fn sentiment(&self) -> f32 {
        match self {
            RoleKind::Supportive => 0.6,
            RoleKind::Hostile => -0.6,
            RoleKind::Transactional => 0.2,
            RoleKind::Competitive => -0.2,
            RoleKind::Neutral => 0.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.sentiment() > 0.0
    }

    pub fn is_negative(&self) -> bool {
        self.sentiment() < 0.0
    }
}

/// How one NPC relates to one cast character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcRelationship {
    pub character_id: CharacterId,
    pub role: String,
    /// Current state of the relationship. Overwritten on each interaction.
    pub description: String,
    /// -1.0 to 1.0, negative = hostile.
    pub sentiment: f32,
    pub since_year: i32,
    pub last_year: i32,
}

impl NpcRelationship {
    pub fn new(
        character_id: CharacterId,
        role: impl Into<String>,
        description: impl Into<String>,
        year: i32,
    ) -> Self {
        let role = role.into();
        Self {
            sentiment: RoleKind::classify(&role).sentiment(),
            character_id,
            role,
            description: description.into(),
            since_year: year,
            last_year: year,
        }
    }

    pub fn adjust_sentiment(&mut self, delta: f32) {
        self.sentiment = (self.sentiment + delta).clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_classification() {
        assert_eq!(RoleKind::classify("Her mentor at the forge"), RoleKind::Supportive);
        assert_eq!(RoleKind::classify("village bully"), RoleKind::Hostile);
        assert_eq!(RoleKind::classify("travelling merchant"), RoleKind::Transactional);
        assert_eq!(RoleKind::classify("rival apprentice"), RoleKind::Competitive);
        assert_eq!(RoleKind::classify("stranger"), RoleKind::Neutral);
        assert_eq!(RoleKind::classify("friend turned enemy"), RoleKind::Hostile);
    }

    #[test]
    fn test_new_relationship_sentiment() {
        let rel = NpcRelationship::new(CharacterId::new("a"), "guardian", "watches over her", 2);
        assert!(rel.sentiment > 0.5);
        assert!(RoleKind::Supportive.is_positive());
        assert!(RoleKind::Competitive.is_negative());
    }

    #[test]
    fn test_sentiment_clamped() {
        let mut rel = NpcRelationship::new(CharacterId::new("a"), "enemy", "", 0);
        rel.adjust_sentiment(-5.0);
        assert_eq!(rel.sentiment, -1.0);
    }
}
