use std::sync::atomic::{AtomicUsize, Ordering};

use single_flight::{InitState, Initializer, RETRY_BOUND};
use tracing_subscriber::EnvFilter;

static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() {
   let env_filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("single_flight=debug"));
   tracing_subscriber::fmt().with_env_filter(env_filter).init();

   // A producer that needs two warm-up failures before it succeeds, the way
   // a freshly started dependency might.
   let flaky = Initializer::new(|| async {
      let n = ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
      println!("Attempt {n}...");
      if n < RETRY_BOUND {
         Err(format!("not ready yet (attempt {n})"))
      } else {
         Ok(format!("ready after {n} attempts"))
      }
   });

   // One observe() call rides through the internal retries.
   match flaky.observe().await {
      Ok(value) => println!("Initialized: {value}"),
      Err(e) => panic!("Should have succeeded within the retry bound: {e}"),
   }
   assert_eq!(flaky.state(), InitState::Initialized);
   assert_eq!(ATTEMPTS.load(Ordering::Relaxed), RETRY_BOUND);

   // And now the value is cached; no further attempts happen.
   let _ = flaky.observe().await.unwrap();
   assert_eq!(ATTEMPTS.load(Ordering::Relaxed), RETRY_BOUND);
}
