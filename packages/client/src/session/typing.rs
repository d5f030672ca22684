//! Typing indicator with an idle timeout.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

type Sink = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct TypingState {
    active: bool,
    /// Bumped on every keystroke and on submit; a stale idle timer sees a
    /// different value and does nothing
    generation: u64,
}

struct TypingInner {
    idle: Duration,
    state: Mutex<TypingState>,
    sink: Sink,
}

impl TypingInner {
    fn state(&self) -> std::sync::MutexGuard<'_, TypingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Turns raw input activity into `isTyping` signals.
///
/// `true` goes out once per typing episode; `false` follows after `idle`
/// without input, or immediately on [`TypingIndicator::submit`].
#[derive(Clone)]
pub struct TypingIndicator {
    inner: Arc<TypingInner>,
}

impl TypingIndicator {
    pub fn new(idle: Duration, sink: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(TypingInner {
                idle,
                state: Mutex::new(TypingState::default()),
                sink: Box::new(sink),
            }),
        }
    }

    /// Current input text changed. Must be called inside a tokio runtime.
    pub fn input(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let generation = {
            let mut state = self.inner.state();
            state.generation += 1;
            if !state.active {
                state.active = true;
                (self.inner.sink)(true);
            }
            state.generation
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.idle).await;
            let mut state = inner.state();
            if state.active && state.generation == generation {
                state.active = false;
                (inner.sink)(false);
            }
        });
    }

    /// The message was sent
    pub fn submit(&self) {
        let mut state = self.inner.state();
        state.generation += 1;
        if state.active {
            state.active = false;
            (self.inner.sink)(false);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.state().active
    }
}
