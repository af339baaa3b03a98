use super::arc::{BeatType, CharacterArc, MasterArc};
use super::classify::detect_beats;
use crate::model::{CharacterId, Importance, NarrativeEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// How the next events should move tension relative to the phase target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionGuidance {
    RaiseSharply,
    RaiseSlightly,
    Hold,
    EaseSlightly,
    Deescalate,
}

impl TensionGuidance {
    /// Band `target - current`.
    pub fn for_gap(gap: f32) -> Self {
        if gap > 20.0 {
            TensionGuidance::RaiseSharply
        } else if gap > 5.0 {
            TensionGuidance::RaiseSlightly
        } else if gap < -20.0 {
            TensionGuidance::Deescalate
        } else if gap < -5.0 {
            TensionGuidance::EaseSlightly
        } else {
            TensionGuidance::Hold
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TensionGuidance::RaiseSharply => "raise tension sharply",
            TensionGuidance::RaiseSlightly => "raise tension slightly",
            TensionGuidance::Hold => "hold tension steady",
            TensionGuidance::EaseSlightly => "ease tension slightly",
            TensionGuidance::Deescalate => "de-escalate",
        }
    }
}

/// Mechanical guidance for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub character_id: CharacterId,
    pub year: i32,
    pub phase_name: String,
    pub tension: f32,
    pub tension_target: f32,
    pub guidance: TensionGuidance,
    pub pending_beats: Vec<BeatType>,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Phase: {} (tension {:.0}/{:.0}, {})",
            self.phase_name,
            self.tension,
            self.tension_target,
            self.guidance.message()
        )?;
        if !self.pending_beats.is_empty() {
            let names: Vec<&str> = self.pending_beats.iter().map(|b| b.name()).collect();
            write!(f, ". Beats still needed: {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Result of feeding one event through the grammar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub detected_beats: Vec<BeatType>,
    pub fulfilled_beats: Vec<BeatType>,
    pub tension_delta: f32,
    pub phase_advanced: bool,
}

fn importance_scale(importance: Importance) -> f32 {
    match importance {
        Importance::TurningPoint => 1.5,
        Importance::Major => 1.0,
        Importance::Minor => 0.5,
    }
}

/// Per-character arcs plus the master arc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeGrammar {
    pub arcs: BTreeMap<CharacterId, CharacterArc>,
    pub master: MasterArc,
}

impl NarrativeGrammar {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            arcs: BTreeMap::new(),
            master: MasterArc::spanning(start_year, end_year),
        }
    }

    /// Lay out the master acts if none exist yet.
    pub fn ensure_master(&mut self, start_year: i32, end_year: i32) {
        if self.master.acts.is_empty() {
            self.master = MasterArc::spanning(start_year, end_year);
        }
    }

    /// Give `character_id` the standard arc unless it already has one.
    pub fn ensure_arc(&mut self, character_id: &CharacterId, start_year: i32, end_year: i32) {
        self.arcs
            .entry(character_id.clone())
            .or_insert_with(|| CharacterArc::standard(character_id.clone(), start_year, end_year));
    }

    pub fn insert_arc(&mut self, arc: CharacterArc) {
        self.arcs.insert(arc.character_id.clone(), arc);
        self.recompute_master();
    }

    pub fn arc(&self, character_id: &CharacterId) -> Option<&CharacterArc> {
        self.arcs.get(character_id)
    }

    pub fn current_directive(&self, character_id: &CharacterId, year: i32) -> Option<Directive> {
        let arc = self.arcs.get(character_id)?;
        let phase = arc.active_phase()?;
        Some(Directive {
            character_id: character_id.clone(),
            year,
            phase_name: phase.name.clone(),
            tension: arc.tension,
            tension_target: phase.tension_target,
            guidance: TensionGuidance::for_gap(phase.tension_target - arc.tension),
            pending_beats: phase.pending_required(),
        })
    }

    /// Feed one event. Events for characters without an arc only
    /// contribute to the master recompute.
    pub fn evaluate(&mut self, event: &NarrativeEvent) -> Evaluation {
        let detected = detect_beats(event);
        let mut evaluation = Evaluation {
            detected_beats: detected.clone(),
            ..Evaluation::default()
        };

        if let Some(arc) = self.arcs.get_mut(&event.character_id) {
            let raw: f32 = detected.iter().map(|b| b.tension_weight()).sum();
            let delta = raw * importance_scale(event.importance);
            let before = arc.tension;
            arc.tension = (arc.tension + delta).clamp(0.0, 100.0);
            evaluation.tension_delta = arc.tension - before;

            if let Some(phase) = arc.phases.get_mut(arc.current_phase) {
                for beat_type in &detected {
                    // Required slots first so an optional twin doesn't swallow the beat.
                    let slot = phase
                        .beats
                        .iter_mut()
                        .filter(|b| b.beat_type == *beat_type && !b.fulfilled)
                        .max_by_key(|b| b.required);
                    if let Some(beat) = slot {
                        if beat.fulfill(event.id, event.year) {
                            evaluation.fulfilled_beats.push(*beat_type);
                        }
                    }
                }

                let can_advance = phase.required_complete() && event.year >= phase.end_year;
                if can_advance && arc.current_phase + 1 < arc.phases.len() {
                    arc.current_phase += 1;
                    evaluation.phase_advanced = true;
                    debug!(
                        character = %event.character_id,
                        phase = arc.current_phase,
                        "arc phase advanced"
                    );
                }
            }
            arc.recompute_fulfillment();
        }

        self.recompute_master();
        evaluation
    }

    /// Manually move to the next phase. Returns false at the last phase.
    pub fn force_advance(&mut self, character_id: &CharacterId) -> bool {
        match self.arcs.get_mut(character_id) {
            Some(arc) if arc.current_phase + 1 < arc.phases.len() => {
                arc.current_phase += 1;
                true
            }
            _ => false,
        }
    }

    fn recompute_master(&mut self) {
        self.master.tension = if self.arcs.is_empty() {
            0.0
        } else {
            self.arcs.values().map(|a| a.tension).sum::<f32>() / self.arcs.len() as f32
        };
    }
}
