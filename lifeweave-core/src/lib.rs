//! Narrative simulation engine.
//!
//! This crate provides:
//! - A year-by-year simulation loop over an LLM generation service
//! - Emergent character profiles derived purely from seeds and memories
//! - Story structure guidance (narrative grammar and author-designed arcs)
//! - A shared NPC pool with lifecycle tracking
//! - Storyline health previews with auto-pause
//!
//! # Quick Start
//!
//! ```ignore
//! use lifeweave_core::{ClaudeGenerator, ProgressReporter, RunConfig, Seed, SimulationEngine, SimulationSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SimulationSession::new("The Drowned Coast")
//!         .with_seed(Seed::new("lio", "Lio", 0).with_wound("left at the docks"));
//!
//!     let engine = SimulationEngine::new(Arc::new(ClaudeGenerator::from_env()?));
//!     let outcome = engine
//!         .run(&mut session, &RunConfig::new(0, 20), &mut ProgressReporter::silent())
//!         .await?;
//!     println!("{} events", outcome.events.len());
//!
//!     session.save("drowned_coast.json").await?;
//!     Ok(())
//! }
//! ```

pub mod author_arc;
pub mod grammar;
pub mod health;
pub mod model;
pub mod npc;
pub mod profile;
pub mod session;
pub mod sim;
pub mod testing;

// Primary public API
pub use author_arc::{AuthorArc, AuthorDirection, AuthorPhase};
pub use grammar::NarrativeGrammar;
pub use health::{HealthMonitor, PreviewFrequency, StoryHealth, StoryPreview};
pub use model::{AnchorEvent, CharacterId, Imprint, ImprintKind, Importance, Memory, NarrativeEvent, Season, Seed, SeedEdit};
pub use npc::{Npc, NpcLifecycle, NpcPool};
pub use profile::{compute, EmergentProfile};
pub use session::{DirectionMode, SimulationSession, SessionError};
pub use sim::{
    ClaudeGenerator, ControlRegistry, EngineError, EventDensity, GenerationKind, GenerationService, ProgressEvent,
    ProgressKind, ProgressReporter, RunConfig, RunOutcome, RunStatus, SimulationControl, SimulationEngine,
};
pub use testing::{MockReply, MockResponse, ScriptedGenerator, TestHarness};
