use std::sync::atomic::{AtomicBool, Ordering};

use single_flight::{InitState, Initializer};

/// Stands in for an external fact the initializer caches, e.g. "is the
/// companion tool installed on disk".
static INSTALLED: AtomicBool = AtomicBool::new(false);

#[tokio::main(flavor = "current_thread")]
async fn main() {
   let tool = Initializer::new(|| async {
      if INSTALLED.load(Ordering::Relaxed) {
         println!("Tool already present, reusing it");
      } else {
         println!("Tool missing, installing...");
         INSTALLED.store(true, Ordering::Relaxed);
      }
      Ok::<_, String>("/opt/tool/bin/tool".to_string())
   });

   let path = tool.observe().await.unwrap();
   println!("Using tool at {path}");
   assert_eq!(tool.state(), InitState::Initialized);

   // Something outside our control removed the tool. The cached "installed"
   // answer is now stale, so force a re-check.
   INSTALLED.store(false, Ordering::Relaxed);
   println!("Tool removed out from under us; resetting");
   tool.reset();
   assert_eq!(tool.state(), InitState::NotInitialized);

   let path = tool.observe().await.unwrap();
   println!("Using reinstalled tool at {path}");
   assert!(INSTALLED.load(Ordering::Relaxed));
}
