//! Interaction primitives.
//!
//! Timer-driven building blocks used by the tender board UI:
//!
//! - **Debounce** (`debounce.rs`) - a value cell that only publishes inputs
//!   that stayed unchanged for a minimum delay.
//! - **Auto-close** (`auto_close.rs`) - a session that closes an element after
//!   a timeout or when the user clicks outside of it.
//! - **Pointer events** (`pointer.rs`) - the injected click source the
//!   auto-close session listens to.
//! - **Elements** (`element.rs`) - click targets and the selector-based
//!   containment check.
//!
//! Everything here runs on the Tokio timer. Tests drive it with a paused clock
//! (`tokio::time::pause` / `advance`) instead of real time.

mod auto_close;
mod debounce;
mod element;
mod pointer;

pub use auto_close::{
    AutoCloseConfig, AutoCloseSession, CloseCallback, CloseReason, SessionState,
    DEFAULT_AUTO_CLOSE_TIMEOUT,
};
pub use debounce::{Debounced, Debouncer};
pub use element::{Containment, Element, ElementPath, Selector, SelectorError};
pub use pointer::{PointerBus, PointerEvent, PointerEventSource};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// The state guarded in this module stays consistent across a panicking
/// callback because callbacks always run outside the lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
