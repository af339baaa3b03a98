//! Out-of-band pause, resume and abort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Shared flags of one running simulation. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulationControl {
    paused: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
}

impl SimulationControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Park while paused, polling every `interval`. Returns `false` if an
    /// abort was observed.
    pub async fn wait_while_paused(&self, interval: Duration) -> bool {
        while self.is_paused() {
            if self.is_aborted() {
                return false;
            }
            tokio::time::sleep(interval).await;
        }
        !self.is_aborted()
    }

    /// Sleep for `duration` in `interval` slices. Returns `false` as soon as
    /// an abort is observed.
    pub async fn sleep_unless_aborted(&self, duration: Duration, interval: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        let slice = interval.max(Duration::from_millis(1));
        loop {
            if self.is_aborted() {
                return false;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep(slice.min(deadline - now)).await;
        }
    }
}

/// Controls addressed by session id.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    controls: Mutex<HashMap<String, SimulationControl>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut HashMap<String, SimulationControl>) -> R) -> R {
        let mut map = self.controls.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map)
    }

    /// Control for `session_id`, created on first use.
    pub fn register(&self, session_id: impl Into<String>) -> SimulationControl {
        self.with_map(|map| map.entry(session_id.into()).or_default().clone())
    }

    pub fn get(&self, session_id: &str) -> Option<SimulationControl> {
        self.with_map(|map| map.get(session_id).cloned())
    }

    pub fn remove(&self, session_id: &str) -> Option<SimulationControl> {
        self.with_map(|map| map.remove(session_id))
    }

    /// Returns `false` when no such session is registered.
    pub fn pause(&self, session_id: &str) -> bool {
        self.get(session_id).map(|c| c.pause()).is_some()
    }

    pub fn resume(&self, session_id: &str) -> bool {
        self.get(session_id).map(|c| c.resume()).is_some()
    }

    pub fn abort(&self, session_id: &str) -> bool {
        self.get(session_id).map(|c| c.abort()).is_some()
    }

    pub fn is_paused(&self, session_id: &str) -> bool {
        self.get(session_id).is_some_and(|c| c.is_paused())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_addresses_sessions() {
        let registry = ControlRegistry::new();
        let control = registry.register("s1");
        assert!(registry.pause("s1"));
        assert!(control.is_paused());
        assert!(registry.is_paused("s1"));
        assert!(registry.resume("s1"));
        assert!(!control.is_paused());
        assert!(!registry.abort("missing"));
        assert!(registry.abort("s1"));
        assert!(control.is_aborted());
        assert!(registry.remove("s1").is_some());
        assert!(registry.get("s1").is_none());
    }

    #[tokio::test]
    async fn test_wait_returns_on_resume() {
        let control = SimulationControl::new();
        control.pause();
        let remote = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.resume();
        });
        assert!(control.wait_while_paused(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_delay_cut_short_by_abort() {
        let control = SimulationControl::new();
        let remote = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.abort();
        });
        let started = std::time::Instant::now();
        assert!(!control.sleep_unless_aborted(Duration::from_secs(30), Duration::from_millis(5)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(SimulationControl::new()
            .sleep_unless_aborted(Duration::from_millis(10), Duration::from_millis(5))
            .await);
    }

    #[tokio::test]
    async fn test_wait_observes_abort() {
        let control = SimulationControl::new();
        control.pause();
        let remote = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.abort();
        });
        assert!(!control.wait_while_paused(Duration::from_millis(5)).await);
        assert!(control.is_paused());
    }
}
