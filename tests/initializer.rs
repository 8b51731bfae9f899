use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use single_flight::{InitState, InitializationError, Initializer, RETRY_BOUND};
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("probe failed: {0}")]
struct ProbeError(&'static str);

/// Producer that counts invocations, dwells on the (paused) clock, and
/// always succeeds with `value`.
fn slow_ok(calls: &Arc<AtomicUsize>, value: u32) -> Initializer<u32, ProbeError> {
   let calls = Arc::clone(calls);
   Initializer::new(move || {
      let calls = Arc::clone(&calls);
      async move {
         calls.fetch_add(1, Ordering::SeqCst);
         sleep(Duration::from_millis(50)).await;
         Ok(value)
      }
   })
}

#[test]
fn new_cell_is_not_initialized() {
   let cell: Initializer<u32, ProbeError> = Initializer::new(|| async { Ok(1) });
   assert_eq!(cell.state(), InitState::NotInitialized);
   assert!(!cell.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn concurrent_observers_share_one_flight() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell = slow_ok(&calls, 42);

   let tasks: Vec<_> = (0..10)
      .map(|_| {
         let cell = cell.clone();
         tokio::spawn(async move { cell.observe().await })
      })
      .collect();

   // All callers resolve to the same value...
   for task in tasks {
      assert_eq!(task.await.unwrap(), Ok(42));
   }
   // ...and the producer ran exactly once for all of them.
   assert_eq!(calls.load(Ordering::SeqCst), 1);
   assert_eq!(cell.state(), InitState::Initialized);
}

#[tokio::test(start_paused = true)]
async fn concurrent_observers_share_one_failure() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            Err(ProbeError("disk on fire"))
         }
      })
   };

   let tasks: Vec<_> = (0..5)
      .map(|_| {
         let cell = cell.clone();
         tokio::spawn(async move { cell.observe().await })
      })
      .collect();

   // Every joined caller fails identically, with the producer's error intact.
   for task in tasks {
      assert_eq!(
         task.await.unwrap(),
         Err(InitializationError(ProbeError("disk on fire")))
      );
   }
   // One attempt sequence: the retry bound, not bound-per-caller.
   assert_eq!(calls.load(Ordering::SeqCst), RETRY_BOUND);
   assert_eq!(cell.state(), InitState::NotInitialized);
}

#[tokio::test]
async fn success_is_cached_until_reset() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
         }
      })
   };

   assert_eq!(cell.initialize().await, Ok(7));
   assert_eq!(cell.observe().await, Ok(7));
   assert_eq!(cell.initialize().await, Ok(7));
   assert_eq!(calls.load(Ordering::SeqCst), 1); // Producer not re-invoked
   assert!(cell.is_initialized());
}

#[tokio::test]
async fn two_failures_then_success_within_one_cycle() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
               Err(ProbeError("flaky"))
            } else {
               Ok(9)
            }
         }
      })
   };

   // The retries are internal: one observe() call rides through both
   // failures and resolves with the third attempt's value.
   assert_eq!(cell.observe().await, Ok(9));
   assert_eq!(calls.load(Ordering::SeqCst), 3);
   assert_eq!(cell.state(), InitState::Initialized);
}

#[tokio::test]
async fn exhausted_retries_fail_and_rearm() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProbeError("still broken"))
         }
      })
   };

   assert_eq!(
      cell.observe().await,
      Err(InitializationError(ProbeError("still broken")))
   );
   assert_eq!(calls.load(Ordering::SeqCst), RETRY_BOUND);
   assert_eq!(cell.state(), InitState::NotInitialized);

   // The next call is a brand-new cycle, not a retry continuation.
   assert_eq!(
      cell.observe().await,
      Err(InitializationError(ProbeError("still broken")))
   );
   assert_eq!(calls.load(Ordering::SeqCst), 2 * RETRY_BOUND);
   assert_eq!(cell.state(), InitState::NotInitialized);
}

#[tokio::test]
async fn reset_discards_a_cached_value() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move { Ok(calls.fetch_add(1, Ordering::SeqCst) as u32) }
      })
   };

   assert_eq!(cell.observe().await, Ok(0));
   assert_eq!(cell.state(), InitState::Initialized);

   // Nothing invalidated the old value except the caller's say-so.
   cell.reset();
   assert_eq!(cell.state(), InitState::NotInitialized);

   assert_eq!(cell.observe().await, Ok(1));
   assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reset_before_any_run_is_a_noop() {
   let cell: Initializer<u32, ProbeError> = Initializer::new(|| async { Ok(3) });
   assert_eq!(cell.state(), InitState::NotInitialized);
   cell.reset();
   assert_eq!(cell.state(), InitState::NotInitialized);
   assert_eq!(cell.observe().await, Ok(3));
}

#[tokio::test(start_paused = true)]
async fn reset_while_pending_detaches_the_attempt() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            sleep(Duration::from_millis(50)).await;
            Ok(n)
         }
      })
   };

   // First observer starts the attempt.
   let early = {
      let cell = cell.clone();
      tokio::spawn(async move { cell.observe().await })
   };
   tokio::task::yield_now().await;
   assert_eq!(cell.state(), InitState::Pending);

   // Reset detaches the in-flight attempt without cancelling it.
   cell.reset();
   assert_eq!(cell.state(), InitState::NotInitialized);

   // A post-reset observer starts a second attempt instead of joining the
   // stale one.
   let late = {
      let cell = cell.clone();
      tokio::spawn(async move { cell.observe().await })
   };

   // The early joiner still observes the first attempt's outcome; the late
   // one observes the second's.
   assert_eq!(early.await.unwrap(), Ok(0));
   assert_eq!(late.await.unwrap(), Ok(1));
   assert_eq!(calls.load(Ordering::SeqCst), 2);
   // The stale attempt's settle must not have clobbered the new cycle.
   assert_eq!(cell.state(), InitState::Initialized);
}

#[tokio::test(start_paused = true)]
async fn state_is_pending_while_the_attempt_runs() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell = slow_ok(&calls, 5);

   let observer = {
      let cell = cell.clone();
      tokio::spawn(async move { cell.observe().await })
   };
   tokio::task::yield_now().await;
   assert_eq!(cell.state(), InitState::Pending);
   assert!(!cell.is_initialized());

   assert_eq!(observer.await.unwrap(), Ok(5));
   assert_eq!(cell.state(), InitState::Initialized);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_thread_observers_share_one_flight() {
   let calls = Arc::new(AtomicUsize::new(0));
   let cell: Initializer<u32, ProbeError> = {
      let calls = Arc::clone(&calls);
      Initializer::new(move || {
         let calls = Arc::clone(&calls);
         async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            Ok(11)
         }
      })
   };

   let tasks: Vec<_> = (0..16)
      .map(|_| {
         let cell = cell.clone();
         tokio::spawn(async move { cell.observe().await })
      })
      .collect();

   for task in tasks {
      assert_eq!(task.await.unwrap(), Ok(11));
   }
   // Admission is lock-guarded, so parallel threads still start one attempt.
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn error_display_forwards_the_producer_error() {
   let err = InitializationError(ProbeError("no manifest"));
   assert_eq!(err.to_string(), "probe failed: no manifest");
   assert_eq!(err.clone().into_inner(), ProbeError("no manifest"));
   assert_eq!(err.inner(), &ProbeError("no manifest"));
}

#[test]
fn state_display_names() {
   assert_eq!(InitState::NotInitialized.to_string(), "not-initialized");
   assert_eq!(InitState::Pending.to_string(), "pending");
   assert_eq!(InitState::Initialized.to_string(), "initialized");
}
