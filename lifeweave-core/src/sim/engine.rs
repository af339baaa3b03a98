//! The year-loop orchestrator.

use super::config::RunConfig;
use super::control::SimulationControl;
use super::generator::{GenerationError, GenerationKind, GenerationService};
use super::progress::{ProgressEvent, ProgressKind, ProgressReporter};
use super::prompt::{self, CharacterBrief, Guidance, StepSpan};
use super::response::{self, ParseTier, ResponseContext, StepOutput};
use crate::author_arc::AuthorArc;
use crate::grammar::NarrativeGrammar;
use crate::health::{self, HealthMonitor};
use crate::model::{CharacterId, Memory, NarrativeEvent};
use crate::npc::NpcPool;
use crate::profile::{self, classify, EmergentProfile, LifeStageRules};
use crate::session::{DirectionMode, SimulationSession};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Years collapsed into one childhood block.
pub const CHILDHOOD_BLOCK_YEARS: i32 = 3;

/// Fatal errors. Raised before the session is touched, or before the
/// failing step is applied.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid year range: {start} to {end}")]
    InvalidRange { start: i32, end: i32 },

    #[error("no characters to simulate")]
    EmptyCast,

    #[error("unknown character: {0}")]
    UnknownCharacter(CharacterId),

    #[error("generation service unusable: {0}")]
    Fatal(#[source] GenerationError),

    /// A single call outside the year loop failed.
    #[error(transparent)]
    Generation(GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// What a run produced. Always internally consistent, even when aborted.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Events generated during this run.
    pub events: Vec<NarrativeEvent>,
    /// Memories recorded during this run.
    pub memories: Vec<Memory>,
    pub profiles: BTreeMap<CharacterId, EmergentProfile>,
    pub arcs: NarrativeGrammar,
    pub author_arcs: BTreeMap<CharacterId, AuthorArc>,
    pub npc_pool: NpcPool,
    /// Last year fully applied, if any.
    pub last_year: Option<i32>,
}

/// Drives a [`SimulationSession`] forward year by year.
pub struct SimulationEngine {
    generator: Arc<dyn GenerationService>,
    control: SimulationControl,
    monitor: HealthMonitor,
}

/// Session state written before the first step, restored when the run
/// fails fatally before any step is applied.
struct SetupSnapshot {
    life_stages: LifeStageRules,
    grammar: NarrativeGrammar,
    profiles: BTreeMap<CharacterId, EmergentProfile>,
    author_arcs: BTreeMap<CharacterId, AuthorArc>,
    direction_modes: BTreeMap<CharacterId, DirectionMode>,
}

impl SetupSnapshot {
    fn take(session: &SimulationSession) -> Self {
        Self {
            life_stages: session.life_stages,
            grammar: session.grammar.clone(),
            profiles: session.profiles.clone(),
            author_arcs: session.author_arcs.clone(),
            direction_modes: session.direction_modes.clone(),
        }
    }

    fn restore(self, session: &mut SimulationSession) {
        session.life_stages = self.life_stages;
        session.grammar = self.grammar;
        session.profiles = self.profiles;
        session.author_arcs = self.author_arcs;
        session.direction_modes = self.direction_modes;
    }
}

impl SimulationEngine {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self {
            generator,
            control: SimulationControl::new(),
            monitor: HealthMonitor::default(),
        }
    }

    /// Use externally owned control flags, e.g. from a `ControlRegistry`.
    pub fn with_control(mut self, control: SimulationControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_monitor(mut self, monitor: HealthMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn control(&self) -> SimulationControl {
        self.control.clone()
    }

    /// Expand a finished event into prose.
    pub async fn narrate(
        &self,
        session: &SimulationSession,
        event: &NarrativeEvent,
    ) -> Result<String, EngineError> {
        let id = &event.character_id;
        let (Some(seed), Some(profile)) = (session.seed(id), session.profile(id)) else {
            return Err(EngineError::UnknownCharacter(id.clone()));
        };
        let text = prompt::prose_prompt(event, profile, seed);
        debug!(character = %id, event = %event.title, "prose expansion call");
        self.generator
            .generate(&text, GenerationKind::Prose)
            .await
            .map_err(EngineError::Generation)
    }

    fn validate(session: &SimulationSession, config: &RunConfig) -> Result<Vec<CharacterId>, EngineError> {
        if config.end_year < config.start_year {
            return Err(EngineError::InvalidRange {
                start: config.start_year,
                end: config.end_year,
            });
        }
        if session.seeds.is_empty() {
            return Err(EngineError::EmptyCast);
        }
        let active = match &config.characters {
            Some(selection) => {
                if let Some(missing) = selection.iter().find(|id| session.seed(id).is_none()) {
                    return Err(EngineError::UnknownCharacter(missing.clone()));
                }
                // Seed order, deduplicated.
                session
                    .character_ids()
                    .into_iter()
                    .filter(|id| selection.contains(id))
                    .collect::<Vec<_>>()
            }
            None => session.character_ids(),
        };
        if active.is_empty() {
            return Err(EngineError::EmptyCast);
        }
        Ok(active)
    }

    /// Run the simulation over `config`'s year range.
    ///
    /// Returns the partial result with [`RunStatus::Aborted`] when the abort
    /// flag is observed. Per-character generation failures are reported on
    /// the progress stream and never fail the run.
    pub async fn run(
        &self,
        session: &mut SimulationSession,
        config: &RunConfig,
        reporter: &mut ProgressReporter,
    ) -> Result<RunOutcome, EngineError> {
        let active = Self::validate(session, config)?;
        info!(
            session = %session.id,
            start = config.start_year,
            end = config.end_year,
            characters = active.len(),
            batched = config.batched,
            "simulation starting"
        );

        let mut setup = Some(SetupSnapshot::take(session));
        session.life_stages = config.life_stage_rules();
        session.grammar.ensure_master(config.start_year, config.end_year);
        for id in &active {
            session.grammar.ensure_arc(id, config.start_year, config.end_year);
            if !session.profiles.contains_key(id) {
                session.recompute_profile(id).ok();
            }
        }
        if let Err(error) = self.choose_direction_modes(session, config, &active, reporter).await {
            if let Some(snapshot) = setup.take() {
                snapshot.restore(session);
            }
            return Err(error);
        }

        let mut events = Vec::new();
        let mut memories = Vec::new();
        let mut status = RunStatus::Completed;
        let mut last_year = None;
        let total_years = config.span().max(1) as f32;
        let mut year = config.start_year;

        while year <= config.end_year {
            if self.control.is_aborted() {
                status = RunStatus::Aborted;
                break;
            }
            if self.control.is_paused()
                && !self.control.wait_while_paused(config.pause_poll_interval).await
            {
                status = RunStatus::Aborted;
                break;
            }

            let span = self.step_span(session, config, &active, year);
            reporter.emit(
                ProgressEvent::new(
                    ProgressKind::YearStart,
                    if span.is_block() {
                        format!("Years {} to {}", span.start_year, span.end_year)
                    } else {
                        format!("Year {}", span.start_year)
                    },
                )
                .with_year(year),
            );

            let mut results = self.generate_step(session, config, &active, span, reporter).await;

            if self.control.is_aborted() {
                info!(year, "abort observed, discarding in-flight step");
                status = RunStatus::Aborted;
                break;
            }
            if let Some(at) = results
                .iter()
                .position(|(_, r)| matches!(r, Err(e) if e.is_fatal()))
            {
                if let (_, Err(error)) = results.swap_remove(at) {
                    if let Some(snapshot) = setup.take() {
                        snapshot.restore(session);
                    }
                    return Err(EngineError::Fatal(error));
                }
            }
            setup = None;

            let step_events = self.apply_step(session, config, span, results, reporter, &mut memories);
            for event in step_events.iter().filter(|e| e.is_cross_character()) {
                let related: Vec<&str> = event.related_characters.iter().map(|c| c.as_str()).collect();
                reporter.emit(
                    ProgressEvent::new(
                        ProgressKind::CrossEvent,
                        format!("{}: {} (with {})", event.character_id, event.title, related.join(", ")),
                    )
                    .with_year(event.year),
                );
            }
            events.extend(step_events);
            last_year = Some(span.end_year);

            let done = (span.end_year - config.start_year + 1) as f32;
            reporter.advance_to(done / total_years * 100.0);
            self.review_health(session, config, &active, span, reporter).await;

            year = span.end_year + 1;
            if year <= config.end_year
                && !config.inter_year_delay.is_zero()
                && !self
                    .control
                    .sleep_unless_aborted(config.inter_year_delay, config.pause_poll_interval)
                    .await
            {
                status = RunStatus::Aborted;
                break;
            }
        }

        let message = match status {
            RunStatus::Completed => "Simulation complete".to_string(),
            RunStatus::Aborted => "Simulation aborted".to_string(),
        };
        reporter.emit(ProgressEvent::new(ProgressKind::Done, message));
        info!(?status, events = events.len(), memories = memories.len(), "simulation finished");

        Ok(RunOutcome {
            status,
            events,
            memories,
            profiles: active
                .iter()
                .filter_map(|id| session.profile(id).map(|p| (id.clone(), p.clone())))
                .collect(),
            arcs: session.grammar.clone(),
            author_arcs: session.author_arcs.clone(),
            npc_pool: session.npc_pool.clone(),
            last_year,
        })
    }

    /// Decide grammar or author direction for characters that have none yet.
    /// A fatal design failure leaves every mode undecided.
    async fn choose_direction_modes(
        &self,
        session: &mut SimulationSession,
        config: &RunConfig,
        active: &[CharacterId],
        reporter: &mut ProgressReporter,
    ) -> Result<(), EngineError> {
        let undecided: Vec<CharacterId> = active
            .iter()
            .filter(|id| session.direction_mode(id).is_none())
            .cloned()
            .collect();
        if undecided.is_empty() {
            return Ok(());
        }
        if !config.use_author_arcs {
            for id in undecided {
                session.direction_modes.insert(id, DirectionMode::Grammar);
            }
            return Ok(());
        }

        let prompts: Vec<(CharacterId, String)> = undecided
            .iter()
            .filter_map(|id| {
                let seed = session.seed(id)?;
                Some((id.clone(), prompt::arc_design_prompt(seed, config.start_year, config.end_year)))
            })
            .collect();
        let calls = prompts.iter().map(|(id, text)| async move {
            (id.clone(), self.generator.generate(text, GenerationKind::Structured).await)
        });
        let mut designs = join_all(calls).await;
        if let Some(at) = designs
            .iter()
            .position(|(_, r)| matches!(r, Err(e) if e.is_fatal()))
        {
            if let (_, Err(error)) = designs.swap_remove(at) {
                return Err(EngineError::Fatal(error));
            }
        }

        for (id, result) in designs {
            let arc = result
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    response::parse_object(&text)
                        .map_err(|e| e.to_string())
                        .and_then(|(value, _)| AuthorArc::from_design(id.clone(), value).map_err(|e| e.to_string()))
                });
            match arc {
                Ok(arc) => {
                    let name = session.profile(&id).map(|p| p.display_name.clone()).unwrap_or_default();
                    reporter.emit(
                        ProgressEvent::new(
                            ProgressKind::ArcDesigned,
                            format!("Designed {} phases", arc.phases.len()),
                        )
                        .with_character(id.clone(), name),
                    );
                    session.author_arcs.insert(id.clone(), arc);
                    session.direction_modes.insert(id, DirectionMode::Author);
                }
                Err(error) => {
                    warn!(character = %id, %error, "arc design failed, using grammar direction");
                    session.direction_modes.insert(id, DirectionMode::Grammar);
                }
            }
        }
        Ok(())
    }

    /// One year, or a childhood block when every active character stays a
    /// child throughout and enough years remain.
    fn step_span(&self, session: &SimulationSession, config: &RunConfig, active: &[CharacterId], year: i32) -> StepSpan {
        let block_end = year + CHILDHOOD_BLOCK_YEARS - 1;
        let rules = &session.life_stages;
        let all_children = active.iter().all(|id| {
            session.seed(id).is_some_and(|seed| {
                let now = classify::infer_status(seed.age_at(year), year, session.memories_of(id), rules);
                now.is_childhood() && seed.age_at(block_end) < rules.training_age
            })
        });
        let end_year = if all_children && block_end <= config.end_year {
            block_end
        } else {
            year
        };
        StepSpan {
            start_year: year,
            end_year,
            events_per_year: config.density.events_per_year(),
        }
    }

    fn brief<'a>(
        session: &'a SimulationSession,
        config: &RunConfig,
        id: &'a CharacterId,
        span: StepSpan,
    ) -> Option<CharacterBrief<'a>> {
        let seed = session.seed(id)?;
        let profile = session.profile(id)?;
        let memories = session.memories_of(id);
        let recent = &memories[memories.len().saturating_sub(config.memory_window)..];
        let guidance = match session.direction_mode(id) {
            Some(DirectionMode::Author) => match session.author_arcs.get(id) {
                Some(arc) => Guidance::Author(arc.directive(seed.age_at(span.start_year))),
                None => Guidance::None,
            },
            _ => session
                .grammar
                .current_directive(id, span.start_year)
                .map(Guidance::Grammar)
                .unwrap_or(Guidance::None),
        };
        Some(CharacterBrief {
            seed,
            profile,
            recent,
            anchors: session.anchors_for(id, span.start_year, span.end_year),
            guidance,
        })
    }

    /// Issue the step's generation calls. Session state is only read.
    async fn generate_step(
        &self,
        session: &SimulationSession,
        config: &RunConfig,
        active: &[CharacterId],
        span: StepSpan,
        reporter: &mut ProgressReporter,
    ) -> Vec<(CharacterId, Result<String, GenerationError>)> {
        let npc_summary = session.npc_pool.summary(20);
        let briefs: Vec<CharacterBrief<'_>> = active
            .iter()
            .filter_map(|id| Self::brief(session, config, id, span))
            .collect();

        if config.batched {
            reporter.emit(
                ProgressEvent::new(
                    ProgressKind::Generating,
                    format!("Generating {} characters", briefs.len()),
                )
                .with_year(span.start_year),
            );
            let text = prompt::batched_prompt(&briefs, span, &npc_summary);
            debug!(year = span.start_year, "batched generation call");
            let result = self.generator.generate(&text, GenerationKind::Bulk).await;
            return match result {
                Ok(text) => briefs
                    .iter()
                    .map(|b| (b.seed.id.clone(), Ok(text.clone())))
                    .collect(),
                Err(error) => {
                    // The first slot keeps the original error so fatality survives.
                    let message = error.to_string();
                    let mut original = Some(error);
                    briefs
                        .iter()
                        .map(|b| {
                            let err = original
                                .take()
                                .unwrap_or_else(|| GenerationError::Failed(message.clone()));
                            (b.seed.id.clone(), Err(err))
                        })
                        .collect()
                }
            };
        }

        let mut requests = Vec::with_capacity(briefs.len());
        for brief in &briefs {
            reporter.emit(
                ProgressEvent::new(ProgressKind::Generating, format!("Generating {}", brief.profile.display_name))
                    .with_year(span.start_year)
                    .with_character(brief.seed.id.clone(), brief.profile.display_name.clone()),
            );
            requests.push((brief.seed.id.clone(), prompt::character_prompt(brief, span, &npc_summary)));
        }

        let calls = requests.iter().map(|(id, text)| async move {
            debug!(character = %id, year = span.start_year, "generation call");
            (id.clone(), self.generator.generate(text, GenerationKind::Bulk).await)
        });
        join_all(calls).await
    }

    /// Merge one step's results into the session, character by character.
    fn apply_step(
        &self,
        session: &mut SimulationSession,
        config: &RunConfig,
        span: StepSpan,
        results: Vec<(CharacterId, Result<String, GenerationError>)>,
        reporter: &mut ProgressReporter,
        run_memories: &mut Vec<Memory>,
    ) -> Vec<NarrativeEvent> {
        let contexts: Vec<ResponseContext> = results
            .iter()
            .map(|(id, _)| {
                ResponseContext::new(id.clone(), span.start_year)
                    .spanning(span.end_year)
                    .meaningful_only(config.meaningful_only)
            })
            .collect();

        let outputs: Vec<Result<StepOutput, GenerationError>> = if config.batched {
            match results.into_iter().next() {
                Some((_, Ok(text))) => response::parse_batched(&text, &contexts).into_iter().map(Ok).collect(),
                Some((_, Err(error))) => {
                    let message = error.to_string();
                    std::iter::once(Err(error))
                        .chain(contexts.iter().skip(1).map(|_| Err(GenerationError::Failed(message.clone()))))
                        .collect()
                }
                None => Vec::new(),
            }
        } else {
            results
                .into_iter()
                .zip(&contexts)
                .map(|((_, result), ctx)| result.map(|text| response::parse_step(&text, ctx)))
                .collect()
        };

        let mut step_events = Vec::new();
        for (ctx, output) in contexts.iter().zip(outputs) {
            let id = &ctx.character_id;
            let name = session.profile(id).map(|p| p.display_name.clone()).unwrap_or_default();
            match output {
                Err(error) => {
                    warn!(character = %id, year = span.start_year, %error, "generation failed");
                    reporter.emit(
                        ProgressEvent::new(ProgressKind::Error, format!("Generation failed: {error}"))
                            .with_year(span.start_year)
                            .with_character(id.clone(), name),
                    );
                }
                Ok(output) => {
                    if output.tier == ParseTier::Fallback {
                        debug!(character = %id, year = span.start_year, "fallback output applied");
                    }
                    let applied = self.apply_output(session, output, span, reporter, &name, run_memories);
                    reporter.emit(
                        ProgressEvent::new(
                            ProgressKind::Completed,
                            format!("{} events, {} memories", applied.0.len(), applied.1),
                        )
                        .with_year(span.start_year)
                        .with_character(id.clone(), name),
                    );
                    step_events.extend(applied.0);
                }
            }
        }
        step_events
    }

    /// Memories, profile, grammar, NPCs, then author direction.
    fn apply_output(
        &self,
        session: &mut SimulationSession,
        mut output: StepOutput,
        span: StepSpan,
        reporter: &mut ProgressReporter,
        name: &str,
        run_memories: &mut Vec<Memory>,
    ) -> (Vec<NarrativeEvent>, usize) {
        let id = output.character_id.clone();

        output.memories.sort_by_key(|m| m.moment());
        let memory_count = output.memories.len();
        run_memories.extend(output.memories.iter().cloned());
        session
            .memories
            .entry(id.clone())
            .or_default()
            .extend(output.memories);

        if let Some(seed) = session.seed(&id) {
            let computed = profile::compute_with_rules(seed, session.memories_of(&id), &session.life_stages);
            session.profiles.insert(id.clone(), computed);
        }

        let mut order: Vec<usize> = (0..output.events.len()).collect();
        order.sort_by_key(|&i| (output.events[i].year, output.events[i].season));
        for &i in order.iter().filter(|&&i| !output.events[i].is_placeholder()) {
            let evaluation = session.grammar.evaluate(&output.events[i]);
            if evaluation.phase_advanced {
                debug!(character = %id, year = output.events[i].year, "grammar phase advanced");
            }
        }

        let mut seen_npcs = HashSet::new();
        for interaction in &output.npc_interactions {
            let year = interaction
                .event_index
                .and_then(|i| output.events.get(i))
                .map(|e| e.year)
                .unwrap_or(span.start_year);
            let touched = session.npc_pool.process_interactions(
                std::slice::from_ref(interaction),
                &id,
                year,
                &output.events,
            );
            seen_npcs.extend(touched.into_iter().map(|n| n.id));
        }
        if !seen_npcs.is_empty() {
            debug!(character = %id, npcs = seen_npcs.len(), "npc interactions applied");
        }

        if session.direction_mode(&id) == Some(DirectionMode::Author) {
            if let Some(direction) = &output.author_direction {
                reporter.emit(
                    ProgressEvent::new(ProgressKind::AuthorDirection, direction.narrative_intent.clone())
                        .with_year(span.end_year)
                        .with_character(id.clone(), name),
                );
                if let Some(arc) = session.author_arcs.get_mut(&id) {
                    if let Some(revision) = arc.apply_direction(direction, span.end_year) {
                        info!(
                            character = %id,
                            from = revision.from_phase,
                            to = revision.to_phase,
                            "author arc phase transition"
                        );
                    }
                }
            }
        }

        let events: Vec<NarrativeEvent> = order.into_iter().map(|i| output.events[i].clone()).collect();
        session.events.extend(events.iter().cloned());
        (events, memory_count)
    }

    /// Preview when the policy calls for it within the step, then integrate
    /// and auto-pause on a critical verdict.
    async fn review_health(
        &self,
        session: &mut SimulationSession,
        config: &RunConfig,
        active: &[CharacterId],
        span: StepSpan,
        reporter: &mut ProgressReporter,
    ) {
        let due = (span.start_year..=span.end_year)
            .rev()
            .find(|&y| health::should_preview(config.preview_frequency, y, &session.events));
        let Some(year) = due else {
            return;
        };

        let preview = self
            .monitor
            .preview(self.generator.as_ref(), year, active, &session.events)
            .await;
        reporter.emit(
            ProgressEvent::new(
                ProgressKind::StorylinePreview,
                format!("Consistency {} ({})", preview.consistency_score, preview.health.name()),
            )
            .with_year(year),
        );
        session.previews.push(preview);

        let report = HealthMonitor::integrate(&session.previews);
        reporter.emit(
            ProgressEvent::new(
                ProgressKind::IntegratedStoryline,
                format!("Story health {}: {}", report.story_health.name(), report.recommendation),
            )
            .with_year(year),
        );

        if config.auto_pause_on_critical && report.story_health == health::StoryHealth::Critical {
            warn!(year, "story health critical, pausing");
            self.control.pause();
            reporter.emit(ProgressEvent::new(ProgressKind::AutoPaused, report.recommendation).with_year(year));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, sample_seed, MockResponse, ScriptedGenerator};

    fn engine() -> SimulationEngine {
        SimulationEngine::new(Arc::new(ScriptedGenerator::replying(MockResponse::quiet())))
    }

    #[test]
    fn test_selection_keeps_seed_order() {
        let session = SimulationSession::new("s")
            .with_seed(sample_seed("lio", 0))
            .with_seed(sample_seed("mara", 0))
            .with_seed(sample_seed("tobin", 0));
        let config = fast_config(0, 5).with_characters(vec![
            CharacterId::new("tobin"),
            CharacterId::new("lio"),
            CharacterId::new("tobin"),
        ]);
        let active = SimulationEngine::validate(&session, &config).unwrap();
        assert_eq!(active, vec![CharacterId::new("lio"), CharacterId::new("tobin")]);
    }

    #[test]
    fn test_step_span_blocks_only_for_children() {
        let session = SimulationSession::new("s").with_seed(sample_seed("lio", 0));
        let config = fast_config(0, 20);
        let active = session.character_ids();
        let engine = engine();

        let early = engine.step_span(&session, &config, &active, 0);
        assert_eq!((early.start_year, early.end_year), (0, 2));
        // Age 12 at the block's end is already training age.
        let late = engine.step_span(&session, &config, &active, 10);
        assert_eq!((late.start_year, late.end_year), (10, 10));
        let near_end = engine.step_span(&session, &fast_config(0, 4), &active, 3);
        assert_eq!(near_end.end_year, 3);
    }

    #[tokio::test]
    async fn test_narrate_uses_prose_kind() {
        let generator = Arc::new(ScriptedGenerator::replying(crate::testing::MockReply::Text(
            "The ice groaned.".into(),
        )));
        let engine = SimulationEngine::new(generator.clone());
        let session = SimulationSession::new("s").with_seed(sample_seed("lio", 0));
        let event = NarrativeEvent::new(
            CharacterId::new("lio"),
            4,
            crate::model::Season::Winter,
            "The ice breaks",
            crate::model::Importance::Major,
        );

        let prose = engine.narrate(&session, &event).await.unwrap();
        assert_eq!(prose, "The ice groaned.");
        assert_eq!(generator.calls_of(GenerationKind::Prose), 1);

        let stranger = NarrativeEvent::new(
            CharacterId::new("nobody"),
            4,
            crate::model::Season::Winter,
            "?",
            crate::model::Importance::Minor,
        );
        assert!(matches!(
            engine.narrate(&session, &stranger).await,
            Err(EngineError::UnknownCharacter(_))
        ));
    }

    #[tokio::test]
    async fn test_outcome_holds_only_this_runs_history() {
        let mut session = SimulationSession::new("s").with_seed(sample_seed("lio", -30));
        let engine = engine();
        let mut reporter = ProgressReporter::silent();

        engine.run(&mut session, &fast_config(0, 1), &mut reporter).await.unwrap();
        let second = engine.run(&mut session, &fast_config(2, 3), &mut reporter).await.unwrap();

        assert_eq!(session.events.len(), 4);
        assert_eq!(second.events.len(), 2);
        assert!(second.events.iter().all(|e| e.year >= 2));
        assert_eq!(second.last_year, Some(3));
    }
}
