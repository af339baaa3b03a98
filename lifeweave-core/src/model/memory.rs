//! Memories and the imprints they leave.

use super::{CharacterId, Season};
use serde::{Deserialize, Serialize};

/// Kind of semantic change an imprint carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprintKind {
    Insight,
    Emotion,
    Skill,
    Speech,
    Name,
    Relationship,
    Trauma,
    Belief,
}

impl ImprintKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "insight" => Some(ImprintKind::Insight),
            "emotion" => Some(ImprintKind::Emotion),
            "skill" => Some(ImprintKind::Skill),
            "speech" => Some(ImprintKind::Speech),
            "name" => Some(ImprintKind::Name),
            "relationship" => Some(ImprintKind::Relationship),
            "trauma" => Some(ImprintKind::Trauma),
            "belief" => Some(ImprintKind::Belief),
            _ => None,
        }
    }
}

/// A typed atomic unit of personality, skill or belief change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Imprint {
    pub kind: ImprintKind,
    pub content: String,
    /// 0 to 100.
    pub intensity: u8,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance_change: Option<String>,
}

impl Imprint {
    pub fn new(kind: ImprintKind, content: impl Into<String>, intensity: u8) -> Self {
        Self {
            kind,
            content: content.into(),
            intensity: intensity.min(100),
            source: String::new(),
            appearance_change: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_appearance_change(mut self, change: impl Into<String>) -> Self {
        self.appearance_change = Some(change.into());
        self
    }
}

/// One lived experience. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub character_id: CharacterId,
    pub year: i32,
    pub season: Season,
    pub content: String,
    /// Never empty.
    pub imprints: Vec<Imprint>,
    /// 0 to 100.
    pub emotional_weight: u8,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Memory {
    /// Build a memory. Returns `None` when `imprints` is empty.
    pub fn new(
        character_id: CharacterId,
        year: i32,
        season: Season,
        content: impl Into<String>,
        imprints: Vec<Imprint>,
    ) -> Option<Self> {
        if imprints.is_empty() {
            return None;
        }
        Some(Self {
            character_id,
            year,
            season,
            content: content.into(),
            imprints,
            emotional_weight: 0,
            tags: Vec::new(),
        })
    }

    pub fn with_weight(mut self, weight: u8) -> Self {
        self.emotional_weight = weight.min(100);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Chronological sort key.
    pub fn moment(&self) -> (i32, Season) {
        (self.year, self.season)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn imprints_of(&self, kind: ImprintKind) -> impl Iterator<Item = &Imprint> {
        self.imprints.iter().filter(move |i| i.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_requires_an_imprint() {
        let id = CharacterId::new("ash");
        assert!(Memory::new(id.clone(), 1, Season::Spring, "nothing", vec![]).is_none());

        let memory = Memory::new(
            id,
            1,
            Season::Winter,
            "first snow",
            vec![Imprint::new(ImprintKind::Emotion, "wonder", 40)],
        )
        .unwrap()
        .with_weight(250);
        assert_eq!(memory.emotional_weight, 100);
        assert_eq!(memory.moment(), (1, Season::Winter));
    }

    #[test]
    fn test_imprint_intensity_is_capped() {
        assert_eq!(Imprint::new(ImprintKind::Skill, "archery", 180).intensity, 100);
    }

    #[test]
    fn test_imprint_kind_parse() {
        assert_eq!(ImprintKind::parse("Trauma"), Some(ImprintKind::Trauma));
        assert_eq!(ImprintKind::parse("vibe"), None);
    }
}
