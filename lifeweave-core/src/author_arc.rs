//! AI-authored narrative arcs.
//!
//! Unlike the mechanical grammar, an author arc carries advisory intent: a
//! designed sequence of life phases that the generation service itself moves
//! through by returning phase-transition instructions.

use crate::model::CharacterId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AuthorArcError {
    #[error("arc design is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("arc design contains no phases")]
    Empty,
}

/// One designed life phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorPhase {
    pub name: String,
    #[serde(default)]
    pub age_start: i32,
    #[serde(default)]
    pub age_end: i32,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub key_moments: Vec<String>,
    #[serde(default)]
    pub emotional_arc: String,
    #[serde(default)]
    pub end_condition: String,
}

impl AuthorPhase {
    pub fn new(name: impl Into<String>, age_start: i32, age_end: i32) -> Self {
        Self {
            name: name.into(),
            age_start,
            age_end: age_end.max(age_start),
            intent: String::new(),
            key_moments: Vec::new(),
            emotional_arc: String::new(),
            end_condition: String::new(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = intent.into();
        self
    }
}

/// A logged phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcRevision {
    pub year: i32,
    pub from_phase: usize,
    pub to_phase: usize,
    pub reason: String,
}

/// Target of a phase transition: a phase name or a zero-based index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseRef {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    #[serde(default)]
    pub to_phase: Option<PhaseRef>,
    #[serde(default)]
    pub reason: String,
}

/// Narrative direction returned alongside a year's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorDirection {
    pub arc_position: String,
    pub narrative_intent: String,
    pub world_pressure: String,
    pub avoid: String,
    pub desired_effect: String,
    pub phase_transition: Option<PhaseTransition>,
}

#[derive(Deserialize)]
struct ArcDesign {
    #[serde(default)]
    phases: Vec<AuthorPhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorArc {
    pub character_id: CharacterId,
    pub phases: Vec<AuthorPhase>,
    pub current_phase_index: usize,
    #[serde(default)]
    pub revisions: Vec<ArcRevision>,
}

impl AuthorArc {
    pub fn new(character_id: CharacterId, phases: Vec<AuthorPhase>) -> Result<Self, AuthorArcError> {
        if phases.is_empty() {
            return Err(AuthorArcError::Empty);
        }
        Ok(Self {
            character_id,
            phases,
            current_phase_index: 0,
            revisions: Vec::new(),
        })
    }

    /// Build from the design object `{"phases": [...]}`.
    pub fn from_design(
        character_id: CharacterId,
        design: serde_json::Value,
    ) -> Result<Self, AuthorArcError> {
        let design: ArcDesign = serde_json::from_value(design)?;
        Self::new(character_id, design.phases)
    }

    pub fn current_phase(&self) -> Option<&AuthorPhase> {
        self.phases.get(self.current_phase_index)
    }

    fn resolve(&self, target: Option<&PhaseRef>) -> Option<usize> {
        match target {
            None => Some(self.current_phase_index + 1),
            Some(PhaseRef::Index(index)) => Some(*index),
            Some(PhaseRef::Name(name)) => {
                let wanted = name.trim();
                if let Ok(index) = wanted.parse::<usize>() {
                    return Some(index);
                }
                self.phases
                    .iter()
                    .position(|p| p.name.trim().eq_ignore_ascii_case(wanted))
            }
        }
    }

    /// Apply a returned direction. Only forward transitions are accepted;
    /// the accepted one is logged and returned.
    pub fn apply_direction(&mut self, direction: &AuthorDirection, year: i32) -> Option<ArcRevision> {
        let transition = direction.phase_transition.as_ref()?;
        let Some(target) = self.resolve(transition.to_phase.as_ref()) else {
            warn!(
                character = %self.character_id,
                target = ?transition.to_phase,
                "unknown author arc phase"
            );
            return None;
        };

        if target <= self.current_phase_index || target >= self.phases.len() {
            warn!(
                character = %self.character_id,
                from = self.current_phase_index,
                to = target,
                "rejected author arc transition"
            );
            return None;
        }

        let revision = ArcRevision {
            year,
            from_phase: self.current_phase_index,
            to_phase: target,
            reason: transition.reason.clone(),
        };
        self.current_phase_index = target;
        self.revisions.push(revision.clone());
        Some(revision)
    }

    /// Prompt text describing where the character stands in the arc.
    pub fn directive(&self, age: i32) -> String {
        let Some(phase) = self.current_phase() else {
            return String::new();
        };
        let mut text = format!(
            "Narrative phase {}/{}: {} (ages {}-{}, now {})",
            self.current_phase_index + 1,
            self.phases.len(),
            phase.name,
            phase.age_start,
            phase.age_end,
            age
        );
        if !phase.intent.is_empty() {
            text.push_str(&format!("\nIntent: {}", phase.intent));
        }
        if !phase.key_moments.is_empty() {
            text.push_str(&format!("\nKey moments: {}", phase.key_moments.join("; ")));
        }
        if !phase.emotional_arc.is_empty() {
            text.push_str(&format!("\nEmotional arc: {}", phase.emotional_arc));
        }
        if !phase.end_condition.is_empty() {
            text.push_str(&format!("\nPhase ends when: {}", phase.end_condition));
        }
        if age > phase.age_end {
            text.push_str("\nThis phase has run past its planned ages; consider transitioning.");
        }
        if let Some(next) = self.phases.get(self.current_phase_index + 1) {
            text.push_str(&format!("\nNext phase: {}", next.name));
        }
        text
    }
}
