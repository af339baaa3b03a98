//! Mechanical story grammar: phases, beats and tension.
//!
//! Each character gets a [`CharacterArc`] whose active phase lists the beats
//! still owed. Events are classified into beats, move tension, and fulfil
//! beats of the active phase only. A phase advances automatically once its
//! required beats are all fulfilled and its year range is ending.

mod arc;
pub mod classify;
mod machine;

pub use arc::{Act, ArcPhase, Beat, BeatType, CharacterArc, MasterArc};
pub use machine::{Directive, Evaluation, NarrativeGrammar, TensionGuidance};
