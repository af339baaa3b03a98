//! Progress stream for the presentation layer.

use crate::model::CharacterId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    YearStart,
    Generating,
    Completed,
    CrossEvent,
    ArcDesigned,
    AuthorDirection,
    StorylinePreview,
    IntegratedStoryline,
    AutoPaused,
    Error,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<CharacterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub message: String,
    /// 0 to 100, never decreasing within a run.
    pub progress: f32,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            character_id: None,
            character_name: None,
            year: None,
            message: message.into(),
            progress: 0.0,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_character(mut self, id: CharacterId, name: impl Into<String>) -> Self {
        self.character_id = Some(id);
        self.character_name = Some(name.into());
        self
    }
}

/// Emits progress events with a monotonically non-decreasing percentage.
///
/// A reporter without a channel silently discards events.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
    high_water: f32,
}

impl ProgressReporter {
    /// A reporter and the receiving end of its stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
                high_water: 0.0,
            },
            receiver,
        )
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f32 {
        self.high_water
    }

    /// Raise the percentage. Lower values are ignored.
    pub fn advance_to(&mut self, progress: f32) {
        let progress = progress.clamp(0.0, 100.0);
        if progress > self.high_water {
            self.high_water = progress;
        }
    }

    pub fn emit(&mut self, mut event: ProgressEvent) {
        event.progress = self.high_water;
        if let Some(sender) = &self.sender {
            // Receiver gone means nobody is listening; the run carries on.
            if sender.send(event).is_err() {
                self.sender = None;
            }
        }
    }

    pub fn report(&mut self, kind: ProgressKind, message: impl Into<String>) {
        self.emit(ProgressEvent::new(kind, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let (mut reporter, mut rx) = ProgressReporter::channel();
        reporter.advance_to(40.0);
        reporter.report(ProgressKind::YearStart, "a");
        reporter.advance_to(10.0);
        reporter.report(ProgressKind::Completed, "b");
        reporter.advance_to(250.0);
        reporter.report(ProgressKind::Done, "c");

        let seen: Vec<f32> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|e| e.unwrap().progress)
            .collect();
        assert_eq!(seen, vec![40.0, 40.0, 100.0]);
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (mut reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.report(ProgressKind::Error, "nobody home");
        reporter.report(ProgressKind::Done, "still fine");
        assert!(reporter.sender.is_none());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ProgressKind::IntegratedStoryline).unwrap();
        assert_eq!(json, "\"integrated_storyline\"");
    }
}
