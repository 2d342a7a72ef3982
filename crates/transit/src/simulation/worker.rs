//! Background precomputation.
//!
//! Precomputing a large feed takes seconds, so it runs on its own thread.
//! Progress is published through a `watch` channel (readers only ever see the
//! latest update) and the finished feed arrives through a `oneshot`, whole or
//! not at all.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{oneshot, watch};
use tracing::info;

use crate::config::SimulationConfig;
use crate::identifiers::ServiceIdentifier;
use crate::models::records::GtfsFeed;
use crate::models::types::{Result, TransitError};
use crate::progress::Progress;
use crate::simulation::session::PrecomputedFeed;

pub struct PrecomputeHandle {
    generation: u64,
    progress: watch::Receiver<Progress>,
    result: oneshot::Receiver<Result<PrecomputedFeed>>,
    thread: Option<JoinHandle<()>>,
}

/// Start precomputing `feed` on a new thread.
///
/// The result is tagged with `generation` so the caller can tell whether it
/// still matches the feed it has loaded by the time it finishes.
pub fn spawn_precompute(
    feed: Arc<GtfsFeed>,
    config: SimulationConfig,
    active_services: Option<HashSet<ServiceIdentifier>>,
    generation: u64,
) -> Result<PrecomputeHandle> {
    config.validate()?;

    let (progress_tx, progress_rx) = watch::channel(Progress::starting());
    let (result_tx, result_rx) = oneshot::channel();

    let thread = std::thread::Builder::new()
        .name(format!("precompute-{generation}"))
        .spawn(move || {
            let result = PrecomputedFeed::build(
                &feed,
                &config,
                active_services.as_ref(),
                generation,
                &progress_tx,
            );
            if result_tx.send(result).is_err() {
                info!(generation, "Precomputation finished after its handle was dropped");
            }
        })
        .map_err(|e| TransitError::WorkerFailed(e.to_string()))?;

    Ok(PrecomputeHandle {
        generation,
        progress: progress_rx,
        result: result_rx,
        thread: Some(thread),
    })
}

impl PrecomputeHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest progress update
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// A receiver for progress updates, for callers that want to await changes
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    /// The result if the worker is done, without blocking
    pub fn try_finish(&mut self) -> Option<Result<PrecomputedFeed>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(failure(self.thread.take()))),
        }
    }

    /// Block until the worker is done. Must not be called from inside an
    /// async runtime.
    pub fn wait(self) -> Result<PrecomputedFeed> {
        let PrecomputeHandle { result, thread, .. } = self;
        match result.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(failure(thread)),
        }
    }
}

/// Why the worker went away without sending a result
fn failure(thread: Option<JoinHandle<()>>) -> TransitError {
    let panic = thread.and_then(|thread| thread.join().err());
    let message = panic
        .as_ref()
        .and_then(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
        })
        .unwrap_or_else(|| "worker exited without a result".to_string());
    TransitError::WorkerFailed(message)
}
