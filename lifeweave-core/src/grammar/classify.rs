//! Beat-type detection.
//!
//! Three layers in fixed precedence: explicit tags, then importance affinity
//! (only when no tag matched), then a keyword scan over title and summary.
//! Anything left over is a complication.

use super::arc::BeatType;
use crate::model::{Importance, NarrativeEvent};

const TAG_TABLE: [(&str, BeatType); 16] = [
    ("inciting", BeatType::Inciting),
    ("call_to_action", BeatType::Inciting),
    ("beginning", BeatType::Inciting),
    ("complication", BeatType::Complication),
    ("obstacle", BeatType::Complication),
    ("conflict", BeatType::Complication),
    ("reversal", BeatType::Reversal),
    ("twist", BeatType::Reversal),
    ("betrayal", BeatType::Reversal),
    ("crisis", BeatType::Crisis),
    ("loss", BeatType::Crisis),
    ("climax", BeatType::Climax),
    ("confrontation", BeatType::Climax),
    ("resolution", BeatType::Resolution),
    ("reconciliation", BeatType::Resolution),
    ("peace", BeatType::Resolution),
];

const KEYWORDS: [(&str, BeatType); 18] = [
    ("discover", BeatType::Inciting),
    ("first time", BeatType::Inciting),
    ("begins", BeatType::Inciting),
    ("struggle", BeatType::Complication),
    ("rival", BeatType::Complication),
    ("obstacle", BeatType::Complication),
    ("betray", BeatType::Reversal),
    ("reveal", BeatType::Reversal),
    ("unexpected", BeatType::Reversal),
    ("death", BeatType::Crisis),
    ("dies", BeatType::Crisis),
    ("collapse", BeatType::Crisis),
    ("battle", BeatType::Climax),
    ("confront", BeatType::Climax),
    ("final", BeatType::Climax),
    ("reconcile", BeatType::Resolution),
    ("forgive", BeatType::Resolution),
    ("peace", BeatType::Resolution),
];

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase().replace(['-', ' '], "_")
}

/// Beat types named by the event's tags, in table order without duplicates.
pub fn beats_from_tags(tags: &[String]) -> Vec<BeatType> {
    let normalized: Vec<String> = tags.iter().map(|t| normalize_tag(t)).collect();
    let mut found = Vec::new();
    for (tag, beat) in TAG_TABLE {
        if normalized.iter().any(|t| t == tag) && !found.contains(&beat) {
            found.push(beat);
        }
    }
    found
}

pub fn beat_from_importance(importance: Importance) -> Option<BeatType> {
    match importance {
        Importance::TurningPoint => Some(BeatType::Reversal),
        Importance::Major => Some(BeatType::Complication),
        Importance::Minor => None,
    }
}

pub fn beats_from_keywords(text: &str) -> Vec<BeatType> {
    let lowered = text.to_lowercase();
    let mut found = Vec::new();
    for (keyword, beat) in KEYWORDS {
        if lowered.contains(keyword) && !found.contains(&beat) {
            found.push(beat);
        }
    }
    found
}

/// Detect the beat types an event expresses. Never empty.
pub fn detect_beats(event: &NarrativeEvent) -> Vec<BeatType> {
    let tagged = beats_from_tags(&event.tags);
    if !tagged.is_empty() {
        return tagged;
    }
    if let Some(beat) = beat_from_importance(event.importance) {
        return vec![beat];
    }
    let text = format!("{} {}", event.title, event.summary);
    let keyed = beats_from_keywords(&text);
    if !keyed.is_empty() {
        return keyed;
    }
    vec![BeatType::Complication]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharacterId, Season};

    fn event(title: &str, importance: Importance) -> NarrativeEvent {
        NarrativeEvent::new(CharacterId::new("a"), 1, Season::Spring, title, importance)
    }

    #[test]
    fn test_tags_take_precedence() {
        let e = event("The battle", Importance::TurningPoint).with_tag("Betrayal");
        assert_eq!(detect_beats(&e), vec![BeatType::Reversal]);
    }

    #[test]
    fn test_importance_used_when_no_tag_matches() {
        let e = event("A forgiving letter", Importance::Major).with_tag("letters");
        assert_eq!(detect_beats(&e), vec![BeatType::Complication]);
    }

    #[test]
    fn test_keywords_for_minor_events() {
        let e = event("They reconcile", Importance::Minor).with_summary("A final battle ends");
        assert_eq!(
            detect_beats(&e),
            vec![BeatType::Climax, BeatType::Resolution]
        );
    }

    #[test]
    fn test_default_is_complication() {
        let e = event("Bread and rain", Importance::Minor);
        assert_eq!(detect_beats(&e), vec![BeatType::Complication]);
    }

    #[test]
    fn test_tag_normalization() {
        assert_eq!(
            beats_from_tags(&["Call To Action".to_string(), "call-to-action".to_string()]),
            vec![BeatType::Inciting]
        );
    }
}
