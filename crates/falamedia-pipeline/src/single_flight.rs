//! Per-owner single-flight guard.
//!
//! Two overlapping runs for the same owner key would otherwise interleave
//! their upload/bind phases with last-write-wins on the binding column. The
//! guard keys in-flight runs by owner key; a second caller for the same key
//! awaits the first run's shared result instead of racing it. Runs for
//! different owners proceed independently (their storage paths are
//! owner-scoped).
//!
//! Map cleanup rides on the flight itself, so a finished key is released no
//! matter which caller drove the future to completion. A flight whose
//! callers were all dropped before it finished is discarded and restarted
//! by the next run for that key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use falamedia_core::{PipelineError, PipelineOutcome};

type RunResult = Result<PipelineOutcome, PipelineError>;
type SharedRun = Shared<BoxFuture<'static, RunResult>>;

#[derive(Default)]
pub struct SingleFlight {
    inflight: Arc<Mutex<HashMap<String, SharedRun>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` under `key`, or await the result of the run already in
    /// flight for that key.
    pub async fn run<F>(&self, key: &str, fut: F) -> RunResult
    where
        F: Future<Output = RunResult> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                // A live flight with at least one caller still awaiting it:
                // the map's handle is never the only one.
                Some(existing) if existing.strong_count() != Some(1) => {
                    tracing::debug!(owner_key = %key, "joining in-flight pipeline run");
                    existing.clone()
                }
                // No flight, or an abandoned one every caller dropped mid-run.
                // Inserting the fresh flight drops the stale entry and with it
                // the abandoned run's remaining work.
                _ => {
                    let map = Arc::clone(&self.inflight);
                    let owned_key = key.to_string();
                    let shared = async move {
                        let result = fut.await;
                        map.lock().unwrap().remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }
}
