//! The replicate driver: runs replicates across a worker pool and
//! aggregates per-thread branch tables into one normalized estimate.

use crate::errors::{JobQueueError, RunError};
use crate::jobqueue::JobQueue;
use crate::pattern::BranchTab;
use crate::simulation::DemoModel;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Settings for one estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of replicates, summed over all workers.
    pub nreps: u64,
    /// Worker threads; 0 means one per available core, capped at `nreps`.
    pub nthreads: usize,
    /// Tabulate singleton site patterns as well.
    pub include_singletons: bool,
    /// Worker `i` seeds its generator with `base_seed + i`. A
    /// single-worker run is bitwise reproducible given the seed.
    pub base_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nreps: 100,
            nthreads: 0,
            include_singletons: false,
            base_seed: 0,
        }
    }
}

impl RunConfig {
    /// The worker count actually used: autodetected when 0, never more
    /// than the replicate count, never less than one.
    pub fn effective_threads(&self) -> usize {
        let n = if self.nthreads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.nthreads
        };
        n.clamp(1, self.nreps.max(1) as usize)
    }
}

struct WorkerState {
    model: DemoModel,
    rng: Xoshiro256PlusPlus,
}

/// Estimate site-pattern probabilities for `model`.
///
/// Duplicates the model per worker, splits the replicates as evenly as
/// possible, accumulates each worker's batch into a private branch table,
/// merges the tables once per worker under the aggregate lock, divides by
/// the replicate count, and normalizes.
pub fn pattern_probs(model: &DemoModel, cfg: &RunConfig) -> Result<BranchTab, RunError> {
    let nthreads = cfg.effective_threads();
    let quot = cfg.nreps / nthreads as u64;
    let rem = cfg.nreps % nthreads as u64;

    let aggregate = Arc::new(Mutex::new(BranchTab::new()));
    let proto = model.clone();
    let base_seed = cfg.base_seed;
    let mut queue: JobQueue<WorkerState> = JobQueue::new(nthreads, move |i| WorkerState {
        model: proto.clone(),
        rng: Xoshiro256PlusPlus::seed_from_u64(base_seed + i as u64),
    });

    for j in 0..nthreads as u64 {
        let reps = quot + u64::from(j < rem);
        if reps == 0 {
            continue;
        }
        let aggregate = Arc::clone(&aggregate);
        let include_singletons = cfg.include_singletons;
        queue.add_job(move |st: &mut WorkerState| {
            let mut tab = BranchTab::new();
            st.model
                .simulate(&mut tab, &mut st.rng, reps, include_singletons)
                .map_err(|e| e.to_string())?;
            aggregate
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .merge(&tab);
            Ok(())
        })?;
    }
    queue.shutdown()?;

    let mut tab = Arc::try_unwrap(aggregate)
        .map_err(|_| JobQueueError::WorkerFailed("aggregate table still shared".to_string()))?
        .into_inner()
        .unwrap_or_else(|e| e.into_inner());
    tab.divide_by(cfg.nreps as f64);
    tab.normalize().map_err(RunError::Model)?;
    Ok(tab)
}

/// Single-threaded variant used by tests and by callers that already sit
/// on a worker thread: same replicate split semantics with one worker.
pub fn pattern_probs_serial(
    model: &DemoModel,
    nreps: u64,
    include_singletons: bool,
    seed: u64,
) -> Result<BranchTab, RunError> {
    let cfg = RunConfig {
        nreps,
        nthreads: 1,
        include_singletons,
        base_seed: seed,
    };
    pattern_probs(model, &cfg)
}
