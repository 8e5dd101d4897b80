use std::collections::HashMap;
use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Merges concurrent calls for the same key into one execution whose result
/// is handed to every caller. The entry is dropped once the work resolves,
/// so later calls start fresh.
pub struct RequestCoalescer<T, E> {
    in_flight: Mutex<HashMap<String, SharedResult<T, E>>>,
}

impl<T, E> Default for RequestCoalescer<T, E> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T, E> RequestCoalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key`, or wait on the run already in progress.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(key) {
                Some(existing) => {
                    tracing::debug!(key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let fut = make().boxed().shared();
                    in_flight.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(key)
            .is_some_and(|current| Shared::ptr_eq(current, &shared))
        {
            in_flight.remove(key);
        }

        result
    }

    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
