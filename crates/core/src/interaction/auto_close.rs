//! Auto-close sessions.
//!
//! A session watches an open element (a tender card's action menu, a toast)
//! and invokes `on_close` when either its timeout elapses or a pointer event
//! lands outside the region described by its [`Containment`].
//!
//! # Lifecycle
//!
//! ```text
//!            configure(open)                 timeout / outside click
//!   Idle ───────────────────────▶ Armed ─────────────────────────────▶ Idle
//!    ▲                              │        (on_close invoked once)
//!    └──── configure(closed) ───────┤
//!    └──── dispose() / drop ────────┘
//! ```
//!
//! The host calls [`AutoCloseSession::configure`] whenever its inputs change.
//! Identical configurations are ignored; any change tears the current watcher
//! down before a new one is armed, so a session never owns more than one timer
//! and one pointer listener.
//!
//! Each armed period carries a generation number. The timer and the click
//! listener race inside a single watcher task, and the winner has to match the
//! current generation before `on_close` runs. `on_close` therefore fires at
//! most once per armed period, even when both become ready in the same tick.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::element::Containment;
use super::lock;
use super::pointer::{PointerEvent, PointerEventSource};

/// Timeout used by notification cards unless the host overrides it.
pub const DEFAULT_AUTO_CLOSE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Callback invoked when a session closes. Panics are not caught.
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Inputs the host re-applies on every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCloseConfig {
    pub is_open: bool,
    pub timeout: Duration,
}

impl AutoCloseConfig {
    pub fn open(timeout: Duration) -> Self {
        Self {
            is_open: true,
            timeout,
        }
    }

    pub fn closed(timeout: Duration) -> Self {
        Self {
            is_open: false,
            timeout,
        }
    }
}

impl Default for AutoCloseConfig {
    fn default() -> Self {
        Self::closed(DEFAULT_AUTO_CLOSE_TIMEOUT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Armed,
}

/// What ended an armed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Timeout,
    OutsideClick,
    /// The listener fell behind and pointer events were dropped. Any of them
    /// may have been an outside click, so the session closes.
    PointerLag,
}

struct SessionInner {
    config: Option<AutoCloseConfig>,
    on_close: CloseCallback,
    generation: u64,
    armed: bool,
    watcher: Option<JoinHandle<()>>,
    disposed: bool,
}

impl SessionInner {
    fn teardown(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.armed = false;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

struct SessionShared {
    inner: Mutex<SessionInner>,
}

impl SessionShared {
    fn fire(&self, generation: u64, reason: CloseReason) {
        let on_close = {
            let mut inner = lock(&self.inner);
            if inner.disposed || !inner.armed || inner.generation != generation {
                return;
            }
            inner.armed = false;
            inner.generation = inner.generation.wrapping_add(1);
            // The watcher is the task running this call; just detach it.
            inner.watcher = None;
            Arc::clone(&inner.on_close)
        };
        log::debug!("Auto-close session closing: {:?}", reason);
        on_close();
    }
}

/// Closes an element after a timeout or an outside click.
///
/// Must be configured from within a Tokio runtime. Dropping the session is
/// equivalent to [`AutoCloseSession::dispose`].
pub struct AutoCloseSession {
    shared: Arc<SessionShared>,
    containment: Containment,
    pointer_source: Arc<dyn PointerEventSource>,
}

impl AutoCloseSession {
    pub fn new(
        on_close: CloseCallback,
        containment: Containment,
        pointer_source: Arc<dyn PointerEventSource>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    config: None,
                    on_close,
                    generation: 0,
                    armed: false,
                    watcher: None,
                    disposed: false,
                }),
            }),
            containment,
            pointer_source,
        }
    }

    /// Applies the host's current inputs.
    ///
    /// A configuration equal to the last applied one is a no-op. Otherwise the
    /// current watcher is cancelled and, when `is_open` is set, a new timer
    /// and pointer listener are armed.
    pub fn configure(&self, config: AutoCloseConfig) {
        let mut inner = lock(&self.shared.inner);
        if inner.disposed || inner.config == Some(config) {
            return;
        }
        inner.config = Some(config);
        self.rearm(&mut inner);
    }

    /// Replaces the close callback. An open session restarts its wait.
    pub fn set_on_close(&self, on_close: CloseCallback) {
        let mut inner = lock(&self.shared.inner);
        if inner.disposed || Arc::ptr_eq(&inner.on_close, &on_close) {
            return;
        }
        inner.on_close = on_close;
        self.rearm(&mut inner);
    }

    pub fn state(&self) -> SessionState {
        if lock(&self.shared.inner).armed {
            SessionState::Armed
        } else {
            SessionState::Idle
        }
    }

    /// Last configuration applied by the host, if any.
    pub fn config(&self) -> Option<AutoCloseConfig> {
        lock(&self.shared.inner).config
    }

    /// Host teardown. Cancels the timer and the listener; `on_close` will not
    /// be invoked afterwards.
    pub fn dispose(&self) {
        let mut inner = lock(&self.shared.inner);
        inner.disposed = true;
        inner.teardown();
    }

    fn rearm(&self, inner: &mut SessionInner) {
        inner.teardown();

        let Some(config) = inner.config.filter(|c| c.is_open) else {
            return;
        };

        let generation = inner.generation;
        let deadline = Instant::now() + config.timeout;
        // Subscribe before returning so clicks published right after
        // `configure` are already observed.
        let pointer_events = self.pointer_source.subscribe();
        let containment = self.containment.clone();
        let shared = Arc::clone(&self.shared);

        inner.armed = true;
        inner.watcher = Some(tokio::spawn(async move {
            let reason = wait_for_close(deadline, pointer_events, &containment).await;
            shared.fire(generation, reason);
        }));
    }
}

impl Drop for AutoCloseSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for AutoCloseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoCloseSession")
            .field("state", &self.state())
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

async fn wait_for_close(
    deadline: Instant,
    mut pointer_events: broadcast::Receiver<PointerEvent>,
    containment: &Containment,
) -> CloseReason {
    let timer = tokio::time::sleep_until(deadline);
    tokio::pin!(timer);
    let mut listening = true;

    loop {
        tokio::select! {
            biased;

            _ = &mut timer => return CloseReason::Timeout,
            event = pointer_events.recv(), if listening => match event {
                Ok(event) => {
                    if !containment.contains(&event.target) {
                        return CloseReason::OutsideClick;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Auto-close listener lagged, skipped {} pointer events", skipped);
                    return CloseReason::PointerLag;
                }
                Err(RecvError::Closed) => {
                    // Source is gone; only the timer can close the session now.
                    listening = false;
                }
            },
        }
    }
}
