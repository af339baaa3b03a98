//! Testing utilities for the simulation engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedGenerator` for deterministic runs without API calls
//! - `MockResponse` for building well-formed year responses
//! - `TestHarness` for running scenarios against a session
//! - Assertion helpers for verifying simulation state

use crate::grammar::BeatType;
use crate::model::{CharacterId, Seed};
use crate::npc::NpcLifecycle;
use crate::session::SimulationSession;
use crate::sim::{
    GenerationError, GenerationKind, GenerationService, ProgressEvent, ProgressReporter, RunConfig, RunOutcome,
    SimulationControl, SimulationEngine,
};
use crate::sim::engine::EngineError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// What a scripted call returns.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// A recoverable failure for this call only.
    Failure(String),
    /// A missing-credentials failure that aborts the run.
    Fatal,
}

impl MockReply {
    fn into_result(self) -> Result<String, GenerationError> {
        match self {
            MockReply::Text(text) => Ok(text),
            MockReply::Failure(message) => Err(GenerationError::Failed(message)),
            MockReply::Fatal => Err(GenerationError::Service(claude::Error::NoApiKey)),
        }
    }
}

impl From<MockResponse> for MockReply {
    fn from(response: MockResponse) -> Self {
        MockReply::Text(response.to_json())
    }
}

type Responder = dyn Fn(usize, &str, GenerationKind) -> MockReply + Send + Sync;

/// A generation service driven by a closure.
///
/// The closure sees the call index, the prompt and the kind. Every call is
/// recorded for later inspection.
pub struct ScriptedGenerator {
    responder: Box<Responder>,
    calls: Mutex<Vec<(String, GenerationKind)>>,
}

impl ScriptedGenerator {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &str, GenerationKind) -> MockReply + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always return the same reply.
    pub fn replying(reply: impl Into<MockReply>) -> Self {
        let reply = reply.into();
        Self::new(move |_, _, _| reply.clone())
    }

    /// Return `replies` in order, then quiet years.
    pub fn queued(replies: Vec<MockReply>) -> Self {
        Self::new(move |index, _, _| {
            replies
                .get(index)
                .cloned()
                .unwrap_or_else(|| MockResponse::quiet().into())
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Prompts seen so far, with their kinds.
    pub fn calls(&self) -> Vec<(String, GenerationKind)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_of(&self, kind: GenerationKind) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &str, kind: GenerationKind) -> Result<String, GenerationError> {
        let index = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push((prompt.to_string(), kind));
            calls.len() - 1
        };
        (self.responder)(index, prompt, kind).into_result()
    }
}

/// Builder for a single-character year response.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    events: Vec<Value>,
    memories: Vec<Value>,
    npcs: Vec<Value>,
    direction: Option<Value>,
    status: Option<String>,
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response with one uneventful minor event.
    pub fn quiet() -> Self {
        Self::new().tagged_event("Ordinary days", "minor", &["uneventful"])
    }

    pub fn event(self, title: &str, importance: &str) -> Self {
        self.tagged_event(title, importance, &[])
    }

    pub fn tagged_event(mut self, title: &str, importance: &str, tags: &[&str]) -> Self {
        self.events.push(json!({
            "title": title,
            "summary": format!("{title}."),
            "importance": importance,
            "tags": tags,
        }));
        self
    }

    /// An event in a specific year, for childhood blocks.
    pub fn event_in(mut self, year: i32, title: &str, importance: &str) -> Self {
        self.events.push(json!({
            "year": year,
            "title": title,
            "summary": format!("{title}."),
            "importance": importance,
        }));
        self
    }

    /// An event shared with another cast member.
    pub fn shared_event(mut self, title: &str, with: &str) -> Self {
        self.events.push(json!({
            "title": title,
            "summary": format!("{title}."),
            "importance": "major",
            "relatedCharacters": [with],
        }));
        self
    }

    pub fn memory(mut self, event_index: usize, kind: &str, content: &str, intensity: u8) -> Self {
        self.memories.push(json!({
            "eventIndex": event_index,
            "content": content,
            "emotionalWeight": intensity,
            "imprints": [{"type": kind, "content": content, "intensity": intensity}],
        }));
        self
    }

    pub fn npc(mut self, event_index: usize, alias: &str, role: &str, interaction: &str) -> Self {
        self.npcs.push(json!({
            "eventIndex": event_index,
            "npcAlias": alias,
            "role": role,
            "interaction": interaction,
            "isNew": true,
        }));
        self
    }

    /// A re-mention of someone the story already knows.
    pub fn known_npc(mut self, event_index: usize, alias: &str, interaction: &str) -> Self {
        self.npcs.push(json!({
            "eventIndex": event_index,
            "npcAlias": alias,
            "role": "",
            "interaction": interaction,
            "isNew": false,
        }));
        self
    }

    /// Author direction requesting a move to `to_phase` (name or index).
    pub fn direction(mut self, intent: &str, to_phase: Option<Value>) -> Self {
        let mut direction = json!({
            "arcPosition": "",
            "narrativeIntent": intent,
        });
        if let Some(to_phase) = to_phase {
            direction["phaseTransition"] = json!({"toPhase": to_phase, "reason": "story demands it"});
        }
        self.direction = Some(direction);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "events": self.events,
            "memories": self.memories,
            "npcInteractions": self.npcs,
        });
        if let Some(status) = &self.status {
            value["yearEndStatus"] = json!(status);
        }
        if let Some(direction) = &self.direction {
            value["authorDirection"] = direction.clone();
        }
        value
    }

    /// Fenced the way the service usually answers.
    pub fn to_json(&self) -> String {
        format!("```json\n{}\n```", self.to_value())
    }
}

/// First year a year-step prompt asks for.
pub fn requested_year(prompt: &str) -> Option<i32> {
    let rest = prompt
        .split_once("Simulate years ")
        .or_else(|| prompt.split_once("Simulate year "))?
        .1;
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().ok()
}

/// A batched response keyed by character id.
pub fn batched_json(characters: &[(&str, MockResponse)]) -> String {
    let map: serde_json::Map<String, Value> = characters
        .iter()
        .map(|(id, response)| (id.to_string(), response.to_value()))
        .collect();
    json!({ "characters": map }).to_string()
}

/// An arc design with the given `(name, age_start, age_end)` phases.
pub fn arc_design_json(phases: &[(&str, i32, i32)]) -> String {
    let phases: Vec<Value> = phases
        .iter()
        .map(|(name, start, end)| {
            json!({
                "name": name,
                "ageStart": start,
                "ageEnd": end,
                "intent": format!("Live through {name}"),
            })
        })
        .collect();
    json!({ "phases": phases }).to_string()
}

/// A preview response.
pub fn preview_json(score: u8, health: &str) -> String {
    json!({
        "consistencyScore": score,
        "issues": ["threads left hanging"],
        "highlights": [],
        "health": health,
    })
    .to_string()
}

/// A run config with no pacing delays.
pub fn fast_config(start_year: i32, end_year: i32) -> RunConfig {
    RunConfig::new(start_year, end_year)
        .with_inter_year_delay(Duration::ZERO)
        .with_pause_poll_interval(Duration::from_millis(1))
}

pub fn sample_seed(id: &str, birth_year: i32) -> Seed {
    let mut codename = id.to_string();
    if let Some(first) = codename.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Seed::new(id, codename, birth_year)
        .with_temperament("watchful")
        .with_latent_ability("tidecalling")
}

/// Test harness for running simulation scenarios.
pub struct TestHarness {
    pub session: SimulationSession,
    pub generator: Arc<ScriptedGenerator>,
    pub engine: SimulationEngine,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    reporter: ProgressReporter,
}

impl TestHarness {
    pub fn new(session: SimulationSession, generator: ScriptedGenerator) -> Self {
        let generator = Arc::new(generator);
        let engine = SimulationEngine::new(generator.clone());
        let (reporter, events) = ProgressReporter::channel();
        Self {
            session,
            generator,
            engine,
            events,
            reporter,
        }
    }

    /// A session holding one sample character per id, all born in `birth_year`.
    pub fn with_cast(ids: &[&str], birth_year: i32, generator: ScriptedGenerator) -> Self {
        let session = ids.iter().fold(SimulationSession::new("Test Story"), |s, id| {
            s.with_seed(sample_seed(id, birth_year))
        });
        Self::new(session, generator)
    }

    /// Drive the engine with externally held control flags.
    pub fn with_control(mut self, control: SimulationControl) -> Self {
        self.engine = SimulationEngine::new(self.generator.clone()).with_control(control);
        self
    }

    pub async fn run(&mut self, config: &RunConfig) -> Result<RunOutcome, EngineError> {
        self.engine.run(&mut self.session, config, &mut self.reporter).await
    }

    /// Progress events emitted since the last drain.
    pub fn drain_progress(&mut self) -> Vec<ProgressEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub fn event_count(&self, id: &str) -> usize {
        self.session.events_of(&CharacterId::new(id)).count()
    }

    pub fn memory_count(&self, id: &str) -> usize {
        self.session.memories_of(&CharacterId::new(id)).len()
    }

    pub fn phase_index(&self, id: &str) -> Option<usize> {
        self.session
            .grammar
            .arc(&CharacterId::new(id))
            .map(|arc| arc.current_phase)
    }

    pub fn npc_lifecycle(&self, query: &str) -> Option<NpcLifecycle> {
        self.session.npc_pool.find(query).map(|npc| npc.lifecycle)
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the NPC pool knows `query` at the given lifecycle stage.
#[track_caller]
pub fn assert_npc_lifecycle(harness: &TestHarness, query: &str, expected: NpcLifecycle) {
    let actual = harness.npc_lifecycle(query);
    assert_eq!(
        actual,
        Some(expected),
        "Expected NPC '{query}' at {expected:?}, got {actual:?}"
    );
}

/// Assert that a beat has been fulfilled anywhere in a character's arc.
#[track_caller]
pub fn assert_beat_fulfilled(harness: &TestHarness, id: &str, beat: BeatType) {
    let arc = harness
        .session
        .grammar
        .arc(&CharacterId::new(id))
        .unwrap_or_else(|| panic!("Expected an arc for '{id}'"));
    let fulfilled = arc
        .phases
        .iter()
        .flat_map(|p| p.beats.iter())
        .any(|b| b.beat_type == beat && b.fulfilled);
    assert!(fulfilled, "Expected beat {beat:?} to be fulfilled for '{id}'");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_replies_then_quiet() {
        let generator = ScriptedGenerator::queued(vec![
            MockResponse::new().event("First", "major").into(),
            MockReply::Failure("boom".into()),
        ]);
        let first = generator.generate("a", GenerationKind::Bulk).await.unwrap();
        assert!(first.contains("First"));
        assert!(generator.generate("b", GenerationKind::Bulk).await.is_err());
        let third = generator.generate("c", GenerationKind::Structured).await.unwrap();
        assert!(third.contains("uneventful"));

        assert_eq!(generator.call_count(), 3);
        assert_eq!(generator.calls_of(GenerationKind::Structured), 1);
        assert_eq!(generator.calls()[1].0, "b");
    }

    #[tokio::test]
    async fn test_fatal_reply() {
        let generator = ScriptedGenerator::replying(MockReply::Fatal);
        let error = generator.generate("x", GenerationKind::Bulk).await.unwrap_err();
        assert!(error.is_fatal());
    }

    #[test]
    fn test_mock_response_shape() {
        let value = MockResponse::new()
            .event("The fire", "turning_point")
            .memory(0, "trauma", "smoke", 80)
            .npc(0, "the miller", "neighbour", "pulled him out")
            .direction("raise the stakes", Some(json!(1)))
            .to_value();
        assert_eq!(value["events"][0]["importance"], "turning_point");
        assert_eq!(value["memories"][0]["imprints"][0]["type"], "trauma");
        assert_eq!(value["npcInteractions"][0]["npcAlias"], "the miller");
        assert_eq!(value["authorDirection"]["phaseTransition"]["toPhase"], 1);
    }

    #[test]
    fn test_requested_year() {
        assert_eq!(requested_year("...\nSimulate year 7, about 2 events.\n"), Some(7));
        assert_eq!(requested_year("Simulate years 3 to 5, about 1 events"), Some(3));
        assert_eq!(requested_year("Design an arc"), None);
    }

    #[test]
    fn test_sample_seed_codename() {
        let seed = sample_seed("lio", 3);
        assert_eq!(seed.codename, "Lio");
        assert_eq!(seed.birth_year, 3);
    }
}
