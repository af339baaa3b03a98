//! The simulation loop and everything it talks to.

pub mod config;
pub mod control;
pub mod engine;
pub mod generator;
pub mod progress;
pub mod prompt;
pub mod response;

pub use config::{EventDensity, RunConfig};
pub use control::{ControlRegistry, SimulationControl};
pub use engine::{EngineError, RunOutcome, RunStatus, SimulationEngine};
pub use generator::{ClaudeGenerator, GenerationError, GenerationKind, GenerationService, GeneratorConfig};
pub use progress::{ProgressEvent, ProgressKind, ProgressReporter};
pub use response::{parse_batched, parse_step, ParseTier, StepOutput};
