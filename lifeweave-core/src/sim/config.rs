use crate::health::PreviewFrequency;
use crate::model::CharacterId;
use crate::profile::LifeStageRules;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many events to ask for per character per year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDensity {
    Sparse,
    #[default]
    Normal,
    Dense,
}

impl EventDensity {
    pub fn events_per_year(&self) -> usize {
        match self {
            EventDensity::Sparse => 1,
            EventDensity::Normal => 2,
            EventDensity::Dense => 4,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sparse" | "low" => Some(EventDensity::Sparse),
            "normal" | "medium" => Some(EventDensity::Normal),
            "dense" | "high" => Some(EventDensity::Dense),
            _ => None,
        }
    }
}

/// Configuration of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub start_year: i32,
    /// Inclusive.
    pub end_year: i32,
    pub density: EventDensity,
    /// Subset of the cast to simulate. `None` means everyone.
    pub characters: Option<Vec<CharacterId>>,
    /// One combined request per year instead of one per character.
    pub batched: bool,
    /// Drop placeholder events from results.
    pub meaningful_only: bool,
    pub use_author_arcs: bool,
    pub preview_frequency: PreviewFrequency,
    pub auto_pause_on_critical: bool,
    /// How many recent memories go into each request.
    pub memory_window: usize,
    pub inter_year_delay: Duration,
    pub pause_poll_interval: Duration,
    pub training_age: i32,
    pub adult_age: i32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_year: 0,
            end_year: 20,
            density: EventDensity::Normal,
            characters: None,
            batched: false,
            meaningful_only: false,
            use_author_arcs: false,
            preview_frequency: PreviewFrequency::Off,
            auto_pause_on_critical: false,
            memory_window: 8,
            inter_year_delay: Duration::from_secs(2),
            pause_poll_interval: Duration::from_millis(250),
            training_age: 12,
            adult_age: 18,
        }
    }
}

impl RunConfig {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            ..Self::default()
        }
    }

    pub fn with_density(mut self, density: EventDensity) -> Self {
        self.density = density;
        self
    }

    pub fn with_characters(mut self, characters: Vec<CharacterId>) -> Self {
        self.characters = Some(characters);
        self
    }

    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    pub fn meaningful_only(mut self, meaningful_only: bool) -> Self {
        self.meaningful_only = meaningful_only;
        self
    }

    pub fn with_author_arcs(mut self, use_author_arcs: bool) -> Self {
        self.use_author_arcs = use_author_arcs;
        self
    }

    pub fn with_preview_frequency(mut self, frequency: PreviewFrequency) -> Self {
        self.preview_frequency = frequency;
        self
    }

    pub fn auto_pause_on_critical(mut self, enabled: bool) -> Self {
        self.auto_pause_on_critical = enabled;
        self
    }

    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }

    pub fn with_inter_year_delay(mut self, delay: Duration) -> Self {
        self.inter_year_delay = delay;
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub fn with_life_stages(mut self, training_age: i32, adult_age: i32) -> Self {
        self.training_age = training_age;
        self.adult_age = adult_age.max(training_age);
        self
    }

    pub fn life_stage_rules(&self) -> LifeStageRules {
        LifeStageRules {
            training_age: self.training_age,
            adult_age: self.adult_age,
            ..LifeStageRules::default()
        }
    }

    /// Number of simulated years, zero for an inverted range.
    pub fn span(&self) -> usize {
        usize::try_from(self.end_year - self.start_year + 1).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.memory_window, 8);
        assert_eq!(config.inter_year_delay, Duration::from_secs(2));
        assert_eq!(config.pause_poll_interval, Duration::from_millis(250));
        assert_eq!(config.life_stage_rules(), LifeStageRules::default());
    }

    #[test]
    fn test_density() {
        assert_eq!(EventDensity::parse("DENSE"), Some(EventDensity::Dense));
        assert_eq!(EventDensity::Sparse.events_per_year(), 1);
        assert_eq!(EventDensity::Dense.events_per_year(), 4);
        assert_eq!(EventDensity::parse("wild"), None);
    }

    #[test]
    fn test_span() {
        assert_eq!(RunConfig::new(0, 2).span(), 3);
        assert_eq!(RunConfig::new(5, 4).span(), 0);
    }
}
