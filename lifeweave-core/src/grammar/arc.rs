//! Arc structure: phases, beats, character arcs and the master arc.

use crate::model::{CharacterId, EventId};
use serde::{Deserialize, Serialize};

/// Structural story unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Inciting,
    Complication,
    Reversal,
    Crisis,
    Climax,
    Resolution,
}

impl BeatType {
    pub const ALL: [BeatType; 6] = [
        BeatType::Inciting,
        BeatType::Complication,
        BeatType::Reversal,
        BeatType::Crisis,
        BeatType::Climax,
        BeatType::Resolution,
    ];

    /// Tension contribution of a detected beat.
    pub fn tension_weight(&self) -> f32 {
        match self {
            BeatType::Inciting => 10.0,
            BeatType::Complication => 8.0,
            BeatType::Reversal => 12.0,
            BeatType::Crisis => 15.0,
            BeatType::Climax => 20.0,
            BeatType::Resolution => -15.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BeatType::Inciting => "inciting",
            BeatType::Complication => "complication",
            BeatType::Reversal => "reversal",
            BeatType::Crisis => "crisis",
            BeatType::Climax => "climax",
            BeatType::Resolution => "resolution",
        }
    }
}

/// A beat slot within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beat {
    pub beat_type: BeatType,
    pub required: bool,
    pub fulfilled: bool,
    pub fulfilled_by: Option<EventId>,
    pub fulfilled_year: Option<i32>,
}

impl Beat {
    pub fn required(beat_type: BeatType) -> Self {
        Self {
            beat_type,
            required: true,
            fulfilled: false,
            fulfilled_by: None,
            fulfilled_year: None,
        }
    }

    pub fn optional(beat_type: BeatType) -> Self {
        Self {
            required: false,
            ..Self::required(beat_type)
        }
    }

    /// Mark fulfilled. A fulfilled beat stays fulfilled.
    pub(crate) fn fulfill(&mut self, event: EventId, year: i32) -> bool {
        if self.fulfilled {
            return false;
        }
        self.fulfilled = true;
        self.fulfilled_by = Some(event);
        self.fulfilled_year = Some(year);
        true
    }
}

/// One phase of a mechanical arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcPhase {
    pub name: String,
    pub start_year: i32,
    pub end_year: i32,
    pub tension_target: f32,
    pub beats: Vec<Beat>,
}

impl ArcPhase {
    pub fn new(name: impl Into<String>, start_year: i32, end_year: i32, tension_target: f32) -> Self {
        Self {
            name: name.into(),
            start_year,
            end_year: end_year.max(start_year),
            tension_target: tension_target.clamp(0.0, 100.0),
            beats: Vec::new(),
        }
    }

    pub fn with_beat(mut self, beat: Beat) -> Self {
        self.beats.push(beat);
        self
    }

    pub fn required_complete(&self) -> bool {
        self.beats.iter().filter(|b| b.required).all(|b| b.fulfilled)
    }

    pub fn pending_required(&self) -> Vec<BeatType> {
        self.beats
            .iter()
            .filter(|b| b.required && !b.fulfilled)
            .map(|b| b.beat_type)
            .collect()
    }

    pub fn contains_year(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }
}

/// The mechanical beat tracker of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterArc {
    pub character_id: CharacterId,
    pub phases: Vec<ArcPhase>,
    /// Only moves forward.
    pub current_phase: usize,
    /// 0 to 100.
    pub tension: f32,
    /// Percentage of required beats fulfilled across all phases.
    pub fulfillment: f32,
}

impl CharacterArc {
    pub fn new(character_id: CharacterId, phases: Vec<ArcPhase>) -> Self {
        Self {
            character_id,
            phases,
            current_phase: 0,
            tension: 0.0,
            fulfillment: 0.0,
        }
    }

    /// Four-phase template spread across `[start_year, end_year]`.
    pub fn standard(character_id: CharacterId, start_year: i32, end_year: i32) -> Self {
        let end_year = end_year.max(start_year);
        let span = end_year - start_year + 1;
        let boundary = |quarter: i32| start_year + span * quarter / 4;
        let range = |quarter: i32| {
            let start = boundary(quarter);
            let end = (boundary(quarter + 1) - 1).max(start);
            (start.min(end_year), end.min(end_year))
        };

        let (s0, e0) = range(0);
        let (s1, e1) = range(1);
        let (s2, e2) = range(2);
        let (s3, _) = range(3);

        let phases = vec![
            ArcPhase::new("Setup", s0, e0, 30.0)
                .with_beat(Beat::required(BeatType::Inciting))
                .with_beat(Beat::optional(BeatType::Complication)),
            ArcPhase::new("Rising Action", s1, e1, 55.0)
                .with_beat(Beat::required(BeatType::Complication))
                .with_beat(Beat::required(BeatType::Reversal))
                .with_beat(Beat::optional(BeatType::Crisis)),
            ArcPhase::new("Crisis", s2, e2, 80.0)
                .with_beat(Beat::required(BeatType::Crisis))
                .with_beat(Beat::required(BeatType::Climax)),
            ArcPhase::new("Resolution", s3, end_year, 35.0)
                .with_beat(Beat::required(BeatType::Resolution))
                .with_beat(Beat::optional(BeatType::Reversal)),
        ];
        Self::new(character_id, phases)
    }

    pub fn active_phase(&self) -> Option<&ArcPhase> {
        self.phases.get(self.current_phase)
    }

    pub(crate) fn recompute_fulfillment(&mut self) {
        let (done, total) = self
            .phases
            .iter()
            .flat_map(|p| p.beats.iter())
            .filter(|b| b.required)
            .fold((0u32, 0u32), |(done, total), b| {
                (done + u32::from(b.fulfilled), total + 1)
            });
        self.fulfillment = if total == 0 {
            100.0
        } else {
            done as f32 * 100.0 / total as f32
        };
    }

    pub fn is_complete(&self) -> bool {
        self.phases.iter().all(|p| p.required_complete())
    }
}

/// A span of the overall story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Act {
    pub name: String,
    pub start_year: i32,
    pub end_year: i32,
}

/// Aggregate over every character arc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterArc {
    pub acts: Vec<Act>,
    /// Mean of all character tensions.
    pub tension: f32,
}

impl MasterArc {
    /// Three acts splitting `[start_year, end_year]` roughly 1:2:1.
    pub fn spanning(start_year: i32, end_year: i32) -> Self {
        let end_year = end_year.max(start_year);
        let span = end_year - start_year + 1;
        let first_end = (start_year + span / 4 - 1).max(start_year).min(end_year);
        let second_end = (start_year + span * 3 / 4 - 1).max(first_end).min(end_year);
        let acts = vec![
            Act {
                name: "Act I".to_string(),
                start_year,
                end_year: first_end,
            },
            Act {
                name: "Act II".to_string(),
                start_year: (first_end + 1).min(end_year),
                end_year: second_end,
            },
            Act {
                name: "Act III".to_string(),
                start_year: (second_end + 1).min(end_year),
                end_year,
            },
        ];
        Self { acts, tension: 0.0 }
    }

    pub fn act_at(&self, year: i32) -> Option<&Act> {
        self.acts
            .iter()
            .find(|a| year >= a.start_year && year <= a.end_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_arc_covers_range_in_order() {
        let arc = CharacterArc::standard(CharacterId::new("a"), 0, 19);
        let bounds: Vec<_> = arc.phases.iter().map(|p| (p.start_year, p.end_year)).collect();
        assert_eq!(bounds, vec![(0, 4), (5, 9), (10, 14), (15, 19)]);
        assert_eq!(arc.current_phase, 0);
        assert_eq!(arc.tension, 0.0);
    }

    #[test]
    fn test_standard_arc_tolerates_tiny_ranges() {
        let arc = CharacterArc::standard(CharacterId::new("a"), 5, 6);
        for phase in &arc.phases {
            assert!(phase.start_year <= phase.end_year);
            assert!(phase.start_year >= 5 && phase.end_year <= 6);
        }
    }

    #[test]
    fn test_fulfillment_counts_required_beats_only() {
        let mut arc = CharacterArc::standard(CharacterId::new("a"), 0, 19);
        arc.phases[0].beats[0].fulfill(EventId::new(), 1);
        arc.phases[0].beats[1].fulfill(EventId::new(), 1);
        arc.recompute_fulfillment();
        // 1 of 6 required beats.
        assert!((arc.fulfillment - 100.0 / 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_beat_cannot_be_refulfilled() {
        let mut beat = Beat::required(BeatType::Crisis);
        let first = EventId::new();
        assert!(beat.fulfill(first, 3));
        assert!(!beat.fulfill(EventId::new(), 4));
        assert_eq!(beat.fulfilled_by, Some(first));
        assert_eq!(beat.fulfilled_year, Some(3));
    }

    #[test]
    fn test_master_arc_acts() {
        let master = MasterArc::spanning(0, 19);
        assert_eq!(master.acts.len(), 3);
        assert_eq!(master.act_at(2).unwrap().name, "Act I");
        assert_eq!(master.act_at(10).unwrap().name, "Act II");
        assert_eq!(master.act_at(19).unwrap().name, "Act III");
    }
}
