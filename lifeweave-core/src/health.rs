//! Storyline health monitoring.
//!
//! Previews review a window of recent events for consistency. The generation
//! service does the reading when it can; a local heuristic stands in when it
//! can't. Previews are folded into an integrated report whose health can
//! auto-pause a run.

use crate::model::{CharacterId, Importance, NarrativeEvent};
use crate::sim::generator::{GenerationKind, GenerationService};
use crate::sim::response::parse_object;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Years between previews under [`PreviewFrequency::SemiAuto`].
pub const SEMI_AUTO_INTERVAL: i32 = 5;

/// How many years of events a preview reviews.
pub const DEFAULT_WINDOW: i32 = 5;

/// Cap on events listed in a preview prompt.
const MAX_PROMPT_EVENTS: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewFrequency {
    #[default]
    Off,
    /// Only when asked for explicitly.
    Manual,
    /// Every five years.
    SemiAuto,
    /// Whenever a turning point happens.
    Auto,
}

impl PreviewFrequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "off" => Some(PreviewFrequency::Off),
            "manual" => Some(PreviewFrequency::Manual),
            "semi_auto" | "semiauto" => Some(PreviewFrequency::SemiAuto),
            "auto" => Some(PreviewFrequency::Auto),
            _ => None,
        }
    }
}

/// Ordered from healthiest to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryHealth {
    Excellent,
    Good,
    Concerning,
    Critical,
}

impl StoryHealth {
    pub fn from_score(score: f32) -> Self {
        if score >= 80.0 {
            StoryHealth::Excellent
        } else if score >= 60.0 {
            StoryHealth::Good
        } else if score >= 40.0 {
            StoryHealth::Concerning
        } else {
            StoryHealth::Critical
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "excellent" => Some(StoryHealth::Excellent),
            "good" => Some(StoryHealth::Good),
            "concerning" => Some(StoryHealth::Concerning),
            "critical" => Some(StoryHealth::Critical),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoryHealth::Excellent => "excellent",
            StoryHealth::Good => "good",
            StoryHealth::Concerning => "concerning",
            StoryHealth::Critical => "critical",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            StoryHealth::Excellent => "Continue the simulation.",
            StoryHealth::Good => "Continue; review the flagged issues when convenient.",
            StoryHealth::Concerning => "Review the open issues before simulating further.",
            StoryHealth::Critical => "Pause and revise seeds or direction before continuing.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPreview {
    pub year: i32,
    /// 0 to 100.
    pub consistency_score: u8,
    pub issues: Vec<String>,
    pub highlights: Vec<String>,
    pub health: StoryHealth,
    /// False when produced by the local heuristic.
    pub from_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratedReport {
    pub story_health: StoryHealth,
    pub recommendation: String,
    pub average_score: f32,
    pub preview_count: usize,
    pub open_issues: Vec<String>,
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPreview {
    #[serde(deserialize_with = "lenient_score")]
    consistency_score: Option<f64>,
    issues: Vec<String>,
    highlights: Vec<String>,
    health: Option<String>,
}

/// Whether a preview is due at `year` given that year's events.
pub fn should_preview(frequency: PreviewFrequency, year: i32, events: &[NarrativeEvent]) -> bool {
    match frequency {
        PreviewFrequency::Off | PreviewFrequency::Manual => false,
        PreviewFrequency::SemiAuto => year.rem_euclid(SEMI_AUTO_INTERVAL) == 0,
        PreviewFrequency::Auto => events
            .iter()
            .any(|e| e.year == year && e.importance == Importance::TurningPoint),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthMonitor {
    /// Years reviewed per preview, counting back from the preview year.
    pub window: i32,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl HealthMonitor {
    pub fn new(window: i32) -> Self {
        Self {
            window: window.max(1),
        }
    }

    fn in_window<'a>(&self, year: i32, events: &'a [NarrativeEvent]) -> Vec<&'a NarrativeEvent> {
        let earliest = year - self.window + 1;
        events
            .iter()
            .filter(|e| e.year >= earliest && e.year <= year)
            .collect()
    }

    /// Ask the generation service for a preview; fall back to [`Self::analyze`].
    pub async fn preview(
        &self,
        generator: &dyn GenerationService,
        year: i32,
        cast: &[CharacterId],
        events: &[NarrativeEvent],
    ) -> StoryPreview {
        let prompt = self.build_prompt(year, events);
        let text = match generator.generate(&prompt, GenerationKind::Structured).await {
            Ok(text) => text,
            Err(error) => {
                warn!(year, %error, "preview call failed, using heuristic");
                return self.analyze(year, cast, events);
            }
        };

        let raw = parse_object(&text)
            .ok()
            .and_then(|(value, _)| serde_json::from_value::<RawPreview>(value).ok());
        let Some(raw) = raw else {
            warn!(year, "preview response malformed, using heuristic");
            return self.analyze(year, cast, events);
        };

        let Some(score) = raw.consistency_score else {
            warn!(year, "preview response has no score, using heuristic");
            return self.analyze(year, cast, events);
        };
        let score = score.clamp(0.0, 100.0).round() as u8;
        let health = raw
            .health
            .as_deref()
            .and_then(StoryHealth::parse)
            .unwrap_or_else(|| StoryHealth::from_score(f32::from(score)));
        debug!(year, score, health = health.name(), "preview received");

        StoryPreview {
            year,
            consistency_score: score,
            issues: raw.issues,
            highlights: raw.highlights,
            health,
            from_service: true,
        }
    }

    fn build_prompt(&self, year: i32, events: &[NarrativeEvent]) -> String {
        let mut prompt = String::from(include_str!("sim/prompts/preview.txt"));
        prompt.push_str(&format!(
            "\n## Events, years {} to {}\n",
            year - self.window + 1,
            year
        ));
        let window = self.in_window(year, events);
        let skip = window.len().saturating_sub(MAX_PROMPT_EVENTS);
        for event in window.into_iter().skip(skip) {
            prompt.push_str(&format!(
                "- [{}] year {} {}: {} ({}) {}\n",
                event.character_id,
                event.year,
                event.season.name(),
                event.title,
                event.importance.name(),
                event.summary
            ));
        }
        prompt
    }

    /// Deterministic local preview.
    ///
    /// Penalises an empty window, a high share of placeholder events,
    /// characters with nothing meaningful in the window, and repeated titles.
    pub fn analyze(&self, year: i32, cast: &[CharacterId], events: &[NarrativeEvent]) -> StoryPreview {
        let window = self.in_window(year, events);
        let mut score: f32 = 100.0;
        let mut issues = Vec::new();

        if window.is_empty() {
            score = 40.0;
            issues.push("no events in the review window".to_string());
        } else {
            let placeholders = window.iter().filter(|e| e.is_placeholder()).count();
            let share = placeholders as f32 / window.len() as f32;
            score -= share * 40.0;
            if share > 0.5 {
                issues.push("most recent years are uneventful".to_string());
            }
        }

        let active: BTreeSet<&CharacterId> = window
            .iter()
            .filter(|e| !e.is_placeholder())
            .map(|e| &e.character_id)
            .collect();
        for id in cast {
            if !window.is_empty() && !active.contains(id) {
                score -= 10.0;
                issues.push(format!("{id} has stalled"));
            }
        }

        let mut titles: BTreeMap<(&CharacterId, String), usize> = BTreeMap::new();
        for event in window.iter().filter(|e| !e.is_placeholder()) {
            *titles
                .entry((&event.character_id, event.title.trim().to_lowercase()))
                .or_default() += 1;
        }
        for ((id, title), count) in titles {
            if count > 1 {
                score -= 5.0 * (count - 1) as f32;
                issues.push(format!("{id} repeats \"{title}\""));
            }
        }

        let highlights = window
            .iter()
            .filter(|e| e.importance == Importance::TurningPoint)
            .map(|e| e.title.clone())
            .collect();

        let score = score.clamp(0.0, 100.0);
        StoryPreview {
            year,
            consistency_score: score.round() as u8,
            issues,
            highlights,
            health: StoryHealth::from_score(score),
            from_service: false,
        }
    }

    /// Fold previews into one report. Health is the worse of the mean-score
    /// band and the latest preview's own verdict.
    pub fn integrate(previews: &[StoryPreview]) -> IntegratedReport {
        let Some(latest) = previews.last() else {
            return IntegratedReport {
                story_health: StoryHealth::Good,
                recommendation: "No previews yet.".to_string(),
                average_score: 0.0,
                preview_count: 0,
                open_issues: Vec::new(),
            };
        };

        let average = previews
            .iter()
            .map(|p| f32::from(p.consistency_score))
            .sum::<f32>()
            / previews.len() as f32;
        let story_health = StoryHealth::from_score(average).max(latest.health);

        IntegratedReport {
            story_health,
            recommendation: story_health.recommendation().to_string(),
            average_score: average,
            preview_count: previews.len(),
            open_issues: latest.issues.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Season;
    use crate::sim::generator::GenerationError;
    use async_trait::async_trait;

    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl GenerationService for Canned {
        async fn generate(&self, _prompt: &str, kind: GenerationKind) -> Result<String, GenerationError> {
            assert_eq!(kind, GenerationKind::Structured);
            self.0
                .map(str::to_string)
                .map_err(|_| GenerationError::Failed("down".into()))
        }
    }

    fn event(id: &str, year: i32, title: &str, importance: Importance) -> NarrativeEvent {
        NarrativeEvent::new(CharacterId::new(id), year, Season::Spring, title, importance)
    }

    fn preview(score: u8, health: StoryHealth) -> StoryPreview {
        StoryPreview {
            year: 0,
            consistency_score: score,
            issues: vec![],
            highlights: vec![],
            health,
            from_service: true,
        }
    }

    #[test]
    fn test_should_preview_policies() {
        let events = vec![event("a", 3, "Break", Importance::TurningPoint)];
        assert!(!should_preview(PreviewFrequency::Off, 5, &events));
        assert!(!should_preview(PreviewFrequency::Manual, 5, &events));
        assert!(should_preview(PreviewFrequency::SemiAuto, 5, &[]));
        assert!(should_preview(PreviewFrequency::SemiAuto, 0, &[]));
        assert!(!should_preview(PreviewFrequency::SemiAuto, 7, &[]));
        assert!(should_preview(PreviewFrequency::SemiAuto, -5, &[]));
        assert!(should_preview(PreviewFrequency::Auto, 3, &events));
        assert!(!should_preview(PreviewFrequency::Auto, 4, &events));
    }

    #[test]
    fn test_integrate_takes_worse_verdict() {
        let report = HealthMonitor::integrate(&[preview(90, StoryHealth::Excellent), preview(85, StoryHealth::Critical)]);
        assert_eq!(report.story_health, StoryHealth::Critical);
        assert_eq!(report.preview_count, 2);

        let report = HealthMonitor::integrate(&[preview(30, StoryHealth::Excellent), preview(50, StoryHealth::Good)]);
        assert_eq!(report.average_score, 40.0);
        assert_eq!(report.story_health, StoryHealth::Concerning);

        assert_eq!(HealthMonitor::integrate(&[]).preview_count, 0);
    }

    #[test]
    fn test_analyze_flags_stalls_and_repeats() {
        let cast = vec![CharacterId::new("a"), CharacterId::new("b")];
        let events = vec![
            event("a", 8, "The duel", Importance::TurningPoint),
            event("a", 9, "The duel", Importance::Major),
            event("b", 9, "A quiet year", Importance::Minor).with_tag("uneventful"),
        ];
        let preview = HealthMonitor::default().analyze(9, &cast, &events);
        assert!(!preview.from_service);
        assert!(preview.issues.iter().any(|i| i == "b has stalled"));
        assert!(preview.issues.iter().any(|i| i.contains("repeats")));
        assert_eq!(preview.highlights, vec!["The duel"]);
        // 100 - 40/3 - 10 - 5
        assert_eq!(preview.consistency_score, 72);
        assert_eq!(preview.health, StoryHealth::Good);
    }

    #[test]
    fn test_analyze_empty_window_is_concerning() {
        let preview = HealthMonitor::default().analyze(20, &[CharacterId::new("a")], &[]);
        assert_eq!(preview.health, StoryHealth::Concerning);
    }

    #[tokio::test]
    async fn test_preview_uses_service_verdict() {
        let service = Canned(Ok(r#"```json
{"consistencyScore": "35", "issues": ["timeline gap"], "highlights": []}
```"#));
        let preview = HealthMonitor::default()
            .preview(&service, 5, &[], &[event("a", 5, "x", Importance::Major)])
            .await;
        assert!(preview.from_service);
        assert_eq!(preview.consistency_score, 35);
        assert_eq!(preview.health, StoryHealth::Critical);
        assert_eq!(preview.issues, vec!["timeline gap"]);
    }

    #[tokio::test]
    async fn test_preview_falls_back_to_heuristic() {
        let events = vec![event("a", 5, "x", Importance::Major)];
        let monitor = HealthMonitor::default();
        let down = monitor.preview(&Canned(Err(())), 5, &[], &events).await;
        assert!(!down.from_service);
        let garbage = monitor.preview(&Canned(Ok("no idea")), 5, &[], &events).await;
        assert!(!garbage.from_service);
        assert_eq!(garbage.consistency_score, 100);
    }
}
