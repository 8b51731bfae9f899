//! Internal lifecycle bookkeeping for the initializer cell.
//!
//! This module provides the state machine shared by every handle to an
//! [`Initializer`](crate::Initializer). The bookkeeping is three fields kept
//! behind one mutex by the caller:
//!
//! - `state`: the externally observable [`InitState`] tag.
//! - `epoch`: a generation counter identifying the current initialization
//!   cycle. `reset()` bumps it, so an attempt that was detached by a reset can
//!   no longer settle bookkeeping that belongs to a later cycle.
//! - `outcome`: the receiving half of the current cycle's outcome channel.
//!   Late joiners clone it instead of starting a second producer run.
//!
//! The attempt task holds the epoch it was started under and calls
//! [`Lifecycle::settle`] with it; a mismatch means the cycle was reset out
//! from under the attempt and the settle is a no-op.

use core::fmt;

use tokio::sync::watch;

use crate::error::InitializationError;

/// The value published on a cycle's outcome channel.
///
/// `None` while the attempt is still running; `Some` exactly once when it
/// settles. Every joiner of the cycle clones the same settled result.
pub(crate) type Outcome<T, E> = Option<Result<T, InitializationError<E>>>;

/// Externally observable lifecycle of an [`Initializer`](crate::Initializer).
///
/// Returned by [`Initializer::state`](crate::Initializer::state) for
/// diagnostic or decision use by callers (e.g. "should I reset before
/// observing?").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitState {
   /// No attempt is running and no value is cached. The next
   /// `initialize()`/`observe()` call starts a fresh attempt.
   NotInitialized,
   /// An attempt is in flight. Callers arriving now join it.
   Pending,
   /// A value is cached and served to every observer until `reset()`.
   Initialized,
}

impl InitState {
   /// Short lowercase name, used in log events and `Display`.
   #[must_use]
   pub const fn name(self) -> &'static str {
      match self {
         Self::NotInitialized => "not-initialized",
         Self::Pending => "pending",
         Self::Initialized => "initialized",
      }
   }
}

impl fmt::Display for InitState {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.name())
   }
}

/// Mutable bookkeeping for one initializer, guarded by the cell's mutex.
pub(crate) struct Lifecycle<T, E> {
   state: InitState,
   epoch: u64,
   outcome: Option<watch::Receiver<Outcome<T, E>>>,
}

impl<T, E> Lifecycle<T, E> {
   /// Fresh bookkeeping: `NotInitialized`, epoch zero, no outcome handle.
   pub(crate) const fn new() -> Self {
      Self {
         state: InitState::NotInitialized,
         epoch: 0,
         outcome: None,
      }
   }

   /// Current state tag.
   #[inline]
   pub(crate) fn state(&self) -> InitState {
      self.state
   }

   /// The current cycle's outcome handle, if a cycle is in flight or settled
   /// successfully. `None` exactly when the state is `NotInitialized`.
   #[inline]
   pub(crate) fn outcome(&self) -> Option<&watch::Receiver<Outcome<T, E>>> {
      debug_assert_eq!(
         self.outcome.is_none(),
         self.state == InitState::NotInitialized,
      );
      self.outcome.as_ref()
   }

   /// Starts a new cycle: transition to `Pending`, store the cycle's outcome
   /// handle, and hand back the epoch the attempt must settle with.
   ///
   /// Caller must have checked that no cycle is in flight (`outcome()` is
   /// `None`).
   pub(crate) fn begin(&mut self, rx: watch::Receiver<Outcome<T, E>>) -> u64 {
      debug_assert_eq!(self.state, InitState::NotInitialized);
      debug_assert!(self.outcome.is_none());
      self.epoch = self.epoch.wrapping_add(1);
      self.state = InitState::Pending;
      self.outcome = Some(rx);
      self.epoch
   }

   /// Settles the cycle identified by `epoch`.
   ///
   /// On success the state becomes `Initialized` and the outcome handle is
   /// retained so future observers read the cached value. On failure the
   /// state returns to `NotInitialized` and the handle is discarded so the
   /// next call starts a fresh attempt.
   ///
   /// Returns `false` without touching anything if `epoch` is stale, i.e.
   /// `reset()` detached this attempt while it was running.
   pub(crate) fn settle(&mut self, epoch: u64, success: bool) -> bool {
      if epoch != self.epoch || self.state != InitState::Pending {
         return false;
      }
      if success {
         self.state = InitState::Initialized;
      } else {
         self.state = InitState::NotInitialized;
         self.outcome = None;
      }
      true
   }

   /// Unconditionally returns to `NotInitialized`, discarding any cached or
   /// in-flight outcome handle and invalidating the current epoch.
   pub(crate) fn reset(&mut self) {
      self.epoch = self.epoch.wrapping_add(1);
      self.state = InitState::NotInitialized;
      self.outcome = None;
   }
}
