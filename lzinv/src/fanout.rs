use std::{collections::VecDeque, future::Future, sync::Arc};

use tokio::{sync::Mutex, task::JoinSet};
use tracing::{debug, error};

use crate::credentials::AccountCredentials;

/// Default number of workers pulling from the work queue
pub const DEFAULT_WORKERS: usize = 20;

/// A unit of work: one account, in one region
#[derive(Clone, Debug)]
pub struct Place {
  pub credentials: AccountCredentials,
  pub region: String,
}

/// Every (account, region) combination to visit
pub fn places(credentials: &[AccountCredentials], regions: &[String]) -> Vec<Place> {
  credentials
    .iter()
    .flat_map(|creds| {
      regions.iter().map(|region| Place {
        credentials: creds.clone(),
        region: region.to_owned(),
      })
    })
    .collect()
}

/// Run `work` over every item using a fixed size pool of workers
///
/// The pool is `min(max_workers, items.len())` tasks draining a shared FIFO queue.
/// Results are returned in completion order, not submission order
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, max_workers: usize, work: F) -> Vec<R>
where
  T: Send + 'static,
  R: Send + 'static,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = R> + Send + 'static,
{
  let total = items.len();
  let workers = max_workers.max(1).min(total);
  debug!("Queued {total} items across {workers} workers");

  let queue = Arc::new(Mutex::new(VecDeque::from(items)));
  let work = Arc::new(work);
  let mut pool = JoinSet::new();

  for _ in 0..workers {
    let queue = Arc::clone(&queue);
    let work = Arc::clone(&work);

    pool.spawn(async move {
      let mut results = Vec::new();
      loop {
        // Release the lock before doing any work
        let next = queue.lock().await.pop_front();
        match next {
          Some(item) => results.push(work(item).await),
          None => break,
        }
      }
      results
    });
  }

  let mut results = Vec::with_capacity(total);
  while let Some(joined) = pool.join_next().await {
    match joined {
      Ok(mut worker_results) => results.append(&mut worker_results),
      Err(err) => error!("Worker failed before finishing its queue: {err}"),
    }
  }

  results
}
