//! Single-flight initializer cell.
//!
//! This module provides the [`Initializer<T, E>`] type, an async cell that
//! wraps one fallible producer and coordinates every caller that wants its
//! value. It ensures that at most one producer run (including its internal
//! retries) is in flight at a time, that every concurrent caller observes the
//! identical outcome of that run, and that a failed or explicitly reset cell
//! retries from scratch on the next call.
//!
//! The implementation keeps the state tag, cycle epoch, and outcome handle
//! behind a mutex for the admission decision (join or start), and runs the
//! attempt itself as a detached task publishing into a watch channel, so the
//! lock is never held across a suspension point.

use core::fmt;
use core::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::InitializationError;
use crate::state::{InitState, Lifecycle, Outcome};

/// Total sequential producer attempts per initialization cycle.
///
/// Failed attempts are retried immediately, with no backoff and no
/// per-attempt timeout; a producer that hangs, hangs the whole cycle. The
/// final attempt's error becomes the cycle's error.
pub const RETRY_BOUND: usize = 3;

/// Type-erased producer stored by the cell.
type Producer<T, E> = dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// A single-flight, retrying, resettable async initializer.
///
/// The cell is constructed once around a zero-argument async producer and
/// then shared: it is cheaply clonable, and every clone coordinates through
/// the same bookkeeping. Calling [`initialize`](Self::initialize) (or its
/// alias [`observe`](Self::observe)) either starts a fresh producer run or
/// joins the one already in flight; all joiners of one run receive the
/// identical resolved value or identical error.
///
/// On success the value is cached and served to every later observer. On
/// failure (after [`RETRY_BOUND`] attempts) the cell resets itself so the
/// next call starts over. [`reset`](Self::reset) forces the same thing
/// explicitly, for when an external fact the cell cached has gone stale.
///
/// # Examples
///
/// ```
/// use single_flight::Initializer;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cell = Initializer::new(|| async {
///    // Imagine a filesystem probe or a download here.
///    Ok::<_, String>("ready".to_string())
/// });
///
/// // However many tasks call this, the producer runs once.
/// assert_eq!(cell.observe().await.unwrap(), "ready");
/// assert_eq!(cell.observe().await.unwrap(), "ready");
/// # }
/// ```
pub struct Initializer<T, E> {
   producer: Arc<Producer<T, E>>,
   lifecycle: Arc<Mutex<Lifecycle<T, E>>>,
}

impl<T, E> Initializer<T, E>
where
   T: Clone + Send + Sync + 'static,
   E: Clone + Send + Sync + 'static,
{
   /// Creates a new cell around `producer`.
   ///
   /// The producer is invoked lazily, on the first
   /// [`initialize`](Self::initialize)/[`observe`](Self::observe) call of
   /// each cycle, and re-invoked up to [`RETRY_BOUND`] times within a cycle
   /// if it fails.
   #[must_use]
   pub fn new<F, Fut>(producer: F) -> Self
   where
      F: Fn() -> Fut + Send + Sync + 'static,
      Fut: Future<Output = Result<T, E>> + Send + 'static,
   {
      Self {
         producer: Arc::new(move || -> BoxFuture<'static, Result<T, E>> {
            Box::pin(producer())
         }),
         lifecycle: Arc::new(Mutex::new(Lifecycle::new())),
      }
   }

   /// Returns the cached value, or runs the producer to obtain it.
   ///
   /// - If the cell is `NotInitialized`, starts a new attempt (the producer
   ///   plus immediate retries, [`RETRY_BOUND`] total tries) and awaits it.
   /// - If the cell is `Pending`, joins the attempt already in flight; no
   ///   second producer run is started.
   /// - If the cell is `Initialized`, resolves immediately with the cached
   ///   value.
   ///
   /// Every caller awaiting one attempt receives the identical outcome. On
   /// failure the producer's final error is returned unmodified inside
   /// [`InitializationError`], and the cell returns to `NotInitialized` so
   /// the next call is a fresh attempt rather than a retry continuation.
   ///
   /// Starting an attempt spawns a task, so the call that finds the cell
   /// `NotInitialized` must be made from within a tokio runtime. The attempt
   /// runs to completion even if every awaiting caller goes away.
   ///
   /// # Panics
   ///
   /// Panics if the attempt task dies without settling, which only happens
   /// when the producer itself panics or the runtime shuts down mid-attempt.
   pub async fn initialize(&self) -> Result<T, InitializationError<E>> {
      let mut rx = self.join_or_start();
      let outcome = match rx.wait_for(|slot| slot.is_some()).await {
         Ok(settled) => settled
            .clone()
            .unwrap_or_else(|| unreachable!("wait_for returned an unsettled outcome")),
         Err(_) => panic!("initialization attempt dropped without settling"),
      };
      outcome
   }

   /// Alias for [`initialize`](Self::initialize).
   ///
   /// Lets callers trigger-or-join without caring which role they play.
   #[inline]
   pub async fn observe(&self) -> Result<T, InitializationError<E>> {
      self.initialize().await
   }

   /// Joins the current cycle's outcome channel, starting a new cycle first
   /// if none is in flight or cached. The lock is released before awaiting.
   fn join_or_start(&self) -> watch::Receiver<Outcome<T, E>> {
      let mut lifecycle = self.lifecycle.lock();
      if let Some(rx) = lifecycle.outcome() {
         // Pending or Initialized: attach to the existing attempt/value.
         return rx.clone();
      }

      let (tx, rx) = watch::channel(None);
      let epoch = lifecycle.begin(rx.clone());
      debug!(epoch, "starting initialization cycle");

      let producer = Arc::clone(&self.producer);
      let bookkeeping = Arc::clone(&self.lifecycle);
      tokio::spawn(async move {
         let result = run_attempt(&*producer).await;
         let applied = bookkeeping.lock().settle(epoch, result.is_ok());
         if applied {
            debug!(epoch, success = result.is_ok(), "initialization cycle settled");
         } else {
            // The cell was reset while we ran; the outcome still reaches
            // callers that joined before the reset, but the bookkeeping now
            // belongs to a later cycle.
            debug!(epoch, "initialization cycle detached by reset");
         }
         // After a failure the stored handle is gone, so joiners' own
         // receiver clones are the only listeners left; a send error just
         // means nobody is listening anymore.
         let _ = tx.send(Some(result.map_err(InitializationError)));
      });

      rx
   }
}

impl<T, E> Initializer<T, E> {
   /// Current state of the cell. Pure read, no side effect.
   #[inline]
   pub fn state(&self) -> InitState {
      self.lifecycle.lock().state()
   }

   /// `true` once a value is cached, until the next [`reset`](Self::reset).
   #[inline]
   pub fn is_initialized(&self) -> bool {
      self.state() == InitState::Initialized
   }

   /// Unconditionally forces the cell back to `NotInitialized`, discarding
   /// any cached value or in-flight attempt handle.
   ///
   /// An attempt that is mid-flight is not cancelled; it runs to completion
   /// against a detached handle. Its outcome remains observable to callers
   /// that joined before the reset and invisible to callers that arrive
   /// after, who start a brand-new attempt instead.
   ///
   /// Calling this when nothing has ever run is a no-op.
   pub fn reset(&self) {
      let mut lifecycle = self.lifecycle.lock();
      let before = lifecycle.state();
      lifecycle.reset();
      debug!(%before, "initializer reset");
   }
}

/// Runs one initialization cycle: the producer plus immediate sequential
/// retries, up to [`RETRY_BOUND`] total attempts.
async fn run_attempt<T, E>(producer: &Producer<T, E>) -> Result<T, E> {
   let mut attempt = 1;
   loop {
      match producer().await {
         Ok(value) => {
            if attempt > 1 {
               debug!(attempt, "producer succeeded after retrying");
            }
            return Ok(value);
         }
         Err(_) if attempt < RETRY_BOUND => {
            warn!(
               attempt,
               limit = RETRY_BOUND,
               "producer attempt failed; retrying immediately"
            );
            attempt += 1;
         }
         Err(err) => {
            warn!(
               attempt,
               limit = RETRY_BOUND,
               "producer attempt failed; retries exhausted"
            );
            return Err(err);
         }
      }
   }
}

// --- Trait Implementations ---

impl<T, E> Clone for Initializer<T, E> {
   /// Clones the handle. Clones share the same producer and bookkeeping, so
   /// an attempt started through one clone is joined through any other.
   #[inline]
   fn clone(&self) -> Self {
      Self {
         producer: Arc::clone(&self.producer),
         lifecycle: Arc::clone(&self.lifecycle),
      }
   }
}

impl<T, E> fmt::Debug for Initializer<T, E> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Initializer")
         .field("state", &self.state())
         .finish_non_exhaustive()
   }
}

impl<T, E> fmt::Display for Initializer<T, E> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      fmt::Display::fmt(&self.state(), f)
   }
}
