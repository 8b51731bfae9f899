//! A single-flight, retrying, resettable async initializer cell.
//!
//! This crate provides one primitive, [`Initializer<T, E>`]: it wraps an
//! arbitrary zero-argument async producer and guarantees that
//!
//! - the producer runs at most once concurrently — callers arriving while an
//!   attempt is in flight join it instead of starting another;
//! - every caller joined to one attempt observes the identical resolved
//!   value or identical error;
//! - a failed attempt (after a bounded number of immediate retries) resets
//!   the cell, so a later call retries from scratch;
//! - an explicit [`reset`](Initializer::reset) forces re-initialization when
//!   an external fact the cell cached has gone stale.
//!
//! The canonical use is gating access to a dependency that must be set up
//! once per process — a companion binary checked (and if missing, installed)
//! on disk, a warmed cache, a handshake — where many tasks race to be the
//! first user.
//!
//! # Features
//!
//! - **Single-flight**: one producer run serves all simultaneous requesters.
//! - **Bounded retries**: each cycle attempts the producer up to
//!   [`RETRY_BOUND`] times, immediately and sequentially, before surfacing
//!   the final error to every waiter.
//! - **Resettable**: unlike a `OnceCell`, the cell can be forced back to its
//!   uninitialized state at any time; an in-flight attempt is detached, not
//!   cancelled.
//! - **Transparent errors**: producer errors reach callers unmodified inside
//!   [`InitializationError`]; the cell never classifies or swallows them.
//!
//! # Examples
//!
//! ```
//! use single_flight::{InitState, Initializer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tool = Initializer::new(|| async {
//!    // Probe for the companion tool, download it if missing...
//!    Ok::<_, String>("/opt/tool/bin/tool".to_string())
//! });
//!
//! // Any number of tasks can observe; the probe runs once.
//! let path = tool.observe().await.unwrap();
//! assert_eq!(path, "/opt/tool/bin/tool");
//! assert_eq!(tool.state(), InitState::Initialized);
//!
//! // The tool was uninstalled out from under us; force a re-check.
//! tool.reset();
//! assert_eq!(tool.state(), InitState::NotInitialized);
//! # }
//! ```

/// The single error kind surfaced by the initializer.
mod error;

/// The public initializer cell.
mod initializer;

/// Internal lifecycle state management.
mod state;

pub use error::InitializationError;
pub use initializer::{Initializer, RETRY_BOUND};
pub use state::InitState;
