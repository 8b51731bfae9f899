//! The single error kind surfaced by the initializer.

use thiserror::Error;

/// Failure of an initialization attempt, carrying whatever the producer
/// raised on its final retry, unmodified.
///
/// The initializer never classifies or swallows producer errors; it only
/// resets its bookkeeping so a later call can retry cleanly. `Display`
/// forwards to the underlying error, so the payload is what callers see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InitializationError<E>(pub E);

impl<E> InitializationError<E> {
   /// Consumes the wrapper and returns the producer's error.
   #[inline]
   pub fn into_inner(self) -> E {
      self.0
   }

   /// Borrows the producer's error.
   #[inline]
   pub fn inner(&self) -> &E {
      &self.0
   }
}

impl<E> From<E> for InitializationError<E> {
   #[inline]
   fn from(err: E) -> Self {
      Self(err)
   }
}
