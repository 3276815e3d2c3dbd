//! Debounced values.
//!
//! [`Debounced`] keeps a settled value that only follows its input once the
//! input stayed unchanged for `delay`. Each change cancels the pending timer
//! and arms a new one, so bursts of edits (typing in the tender search box)
//! surface only their last value.
//!
//! [`Debouncer`] applies the same cancel-and-rearm rule to a one-shot callback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::lock;

struct DebounceState<T> {
    input: T,
    delay: Duration,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl<T> DebounceState<T> {
    fn dispose(&mut self) {
        self.disposed = true;
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Shared<T> {
    state: Mutex<DebounceState<T>>,
    settled: watch::Sender<T>,
}

impl<T> Shared<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn settle(&self, generation: u64) {
        let mut state = lock(&self.state);
        if state.disposed || state.generation != generation {
            return;
        }
        state.timer = None;
        let value = state.input.clone();
        self.settled.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

/// Value cell publishing only inputs that remained stable for `delay`.
///
/// Must be updated from within a Tokio runtime; each pending wait is a
/// spawned timer task.
pub struct Debounced<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Debounced<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a cell whose settled value starts out as `initial`.
    pub fn new(initial: T, delay: Duration) -> Self {
        let (settled, _receiver) = watch::channel(initial.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DebounceState {
                    input: initial,
                    delay,
                    generation: 0,
                    timer: None,
                    disposed: false,
                }),
                settled,
            }),
        }
    }

    /// Records a new input. An unchanged input keeps the current wait running.
    pub fn set(&self, value: T) {
        let mut state = lock(&self.shared.state);
        if state.disposed || state.input == value {
            return;
        }
        state.input = value;
        self.arm(&mut state);
    }

    /// Changes the settling delay and restarts the wait for the current input.
    pub fn set_delay(&self, delay: Duration) {
        let mut state = lock(&self.shared.state);
        if state.disposed || state.delay == delay {
            return;
        }
        state.delay = delay;
        self.arm(&mut state);
    }

    /// The most recent input that stayed unchanged for the full delay.
    pub fn value(&self) -> T {
        self.shared.settled.borrow().clone()
    }

    /// Receiver notified each time the settled value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.settled.subscribe()
    }

    pub fn delay(&self) -> Duration {
        lock(&self.shared.state).delay
    }

    /// Whether an input is still waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        lock(&self.shared.state).timer.is_some()
    }

    /// Cancels the pending timer. A value still waiting is never published.
    pub fn dispose(&self) {
        lock(&self.shared.state).dispose();
    }

    fn arm(&self, state: &mut DebounceState<T>) {
        state.generation = state.generation.wrapping_add(1);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let generation = state.generation;
        // Deadline is taken now, not when the task is first polled.
        let deadline = Instant::now() + state.delay;
        let shared = Arc::clone(&self.shared);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shared.settle(generation);
        }));
    }
}

impl<T> Drop for Debounced<T> {
    fn drop(&mut self) {
        lock(&self.shared.state).dispose();
    }
}

/// Runs the most recently scheduled callback once its delay elapses.
#[derive(Default)]
pub struct Debouncer {
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self { timer: None }
    }

    /// Schedules `callback` after `delay`, dropping any callback still waiting.
    pub fn debounce<F>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let deadline = Instant::now() + delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
