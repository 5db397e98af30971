//! Transient emoji overlay shown on a card.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

struct OverlayState {
    current: Option<String>,
    generation: u64,
    clear_task: Option<JoinHandle<()>>,
}

struct OverlayInner {
    window: Duration,
    state: Mutex<OverlayState>,
}

impl OverlayInner {
    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for OverlayInner {
    fn drop(&mut self) {
        if let Some(task) = self.lock().clear_task.take() {
            task.abort();
        }
    }
}

/// Shows the newest reaction for a fixed window. A newer reaction replaces
/// the shown one and restarts the window; nothing is queued.
#[derive(Clone)]
pub struct ReactionOverlay {
    inner: Arc<OverlayInner>,
}

impl ReactionOverlay {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                window,
                state: Mutex::new(OverlayState {
                    current: None,
                    generation: 0,
                    clear_task: None,
                }),
            }),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn show(&self, emoji: impl Into<String>) {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.current = Some(emoji.into());
        if let Some(previous) = state.clear_task.take() {
            previous.abort();
        }
        state.clear_task = Some(tokio::spawn(clear_after(
            Arc::downgrade(&self.inner),
            state.generation,
            self.inner.window,
        )));
    }

    pub fn current(&self) -> Option<String> {
        self.inner.lock().current.clone()
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.current = None;
        if let Some(task) = state.clear_task.take() {
            task.abort();
        }
    }
}

async fn clear_after(inner: Weak<OverlayInner>, generation: u64, window: Duration) {
    tokio::time::sleep(window).await;
    if let Some(inner) = inner.upgrade() {
        let mut state = inner.lock();
        if state.generation == generation {
            state.current = None;
            state.clear_task = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reaction_clears_after_window() {
        let overlay = ReactionOverlay::new(Duration::from_secs(3));
        overlay.show("💖");
        assert_eq!(overlay.current().as_deref(), Some("💖"));

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(overlay.current().as_deref(), Some("💖"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(overlay.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn newest_reaction_replaces_and_restarts_window() {
        let overlay = ReactionOverlay::new(Duration::from_secs(2));
        overlay.show("🙏");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        overlay.show("🔥");

        // The first window would have ended here.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(overlay.current().as_deref(), Some("🔥"));

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(overlay.current(), None);
    }
}
