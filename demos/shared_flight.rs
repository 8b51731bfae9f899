use std::sync::atomic::{AtomicUsize, Ordering};

use single_flight::Initializer;
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

#[tokio::main]
async fn main() {
   let env_filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("single_flight=debug"));
   tracing_subscriber::fmt().with_env_filter(env_filter).init();

   let data = Initializer::new(|| async {
      // This async block runs only once, no matter how many tasks observe.
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Producing expensive data...");
      sleep(Duration::from_millis(50)).await;
      Ok::<_, String>("Expensive shared data".to_string())
   });

   let tasks: Vec<_> = (0..5)
      .map(|i| {
         let data = data.clone();
         tokio::spawn(async move {
            println!("Task {i} observed: {}", data.observe().await.unwrap());
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Producer ran only once
   println!("Final value: {}", data.observe().await.unwrap());
}
