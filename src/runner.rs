use crate::config::Config;
use crate::engine::Engine;
use crate::stats::{Accumulator, AccumulatorReport, RoundRecord, TrackedStat};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

/// Handle that keeps an [`AutoRun`] going until it is stopped.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Prevent further rounds from being scheduled.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Repeatedly steps an [`Engine`] on a fixed cadence.
pub struct AutoRun {
    interval: Duration,
    max_rounds: usize,
    handle: StopHandle,
}

impl AutoRun {
    pub fn new(interval: Duration, max_rounds: usize) -> Self {
        Self {
            interval,
            max_rounds,
            handle: StopHandle::new(),
        }
    }

    pub fn handle(&self) -> StopHandle {
        self.handle.clone()
    }

    /// Run until `max_rounds` rounds are done or the handle is stopped.
    ///
    /// Every new record is passed to `observe`. Returns the number of rounds performed.
    pub fn run<F>(&self, engine: &mut Engine, mut observe: F) -> Result<usize>
    where
        F: FnMut(&Engine, &RoundRecord) -> Result<()>,
    {
        let mut n_rounds = 0;
        while n_rounds < self.max_rounds && self.handle.is_running() {
            if n_rounds > 0 && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }

            let record = engine.step().context("failed to perform round")?;
            n_rounds += 1;

            observe(engine, &record).context("failed to observe round")?;
        }
        log::info!("completed {n_rounds} rounds");
        Ok(n_rounds)
    }
}

/// Summary of the repeated runs for one vector population size.
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub n_vectors: usize,
    pub n_reps: usize,
    pub peak_infected: AccumulatorReport,
    pub peak_round: AccumulatorReport,
    pub final_dead: AccumulatorReport,
    pub final_immune: AccumulatorReport,
}

/// Run `n_reps` seeded simulations for each vector population size.
///
/// Repetition `i_rep` uses the seed `base_seed + i_rep`, so every size sees the same seeds.
pub fn sweep(
    cfg: &Config,
    vector_sizes: &[usize],
    n_reps: usize,
    base_seed: u64,
) -> Result<Vec<SweepReport>> {
    let mut reports = Vec::with_capacity(vector_sizes.len());

    for &n_vectors in vector_sizes {
        let mut cfg = cfg.clone();
        cfg.init.n_vectors = n_vectors;

        let mut peak_infected = Accumulator::new();
        let mut peak_round = Accumulator::new();
        let mut final_dead = Accumulator::new();
        let mut final_immune = Accumulator::new();

        for i_rep in 0..n_reps {
            let seed = base_seed.wrapping_add(i_rep as u64);
            let mut engine = Engine::new(cfg.clone(), Some(seed))
                .with_context(|| format!("failed to construct engine with {n_vectors} vectors"))?;
            for _ in 0..cfg.output.n_rounds {
                engine.step().context("failed to perform round")?;
            }

            let history = engine.history();
            anyhow::ensure!(!history.is_empty(), "history is empty");
            let peak = history
                .peak(TrackedStat::Infected)
                .context("failed to find peak")?;
            let last = history.last().context("failed to find last record")?;
            peak_infected.add(peak.infected as f64);
            peak_round.add(peak.round as f64);
            final_dead.add(last.dead as f64);
            final_immune.add(last.immune as f64);
        }

        log::info!("completed sweep with {n_vectors} vectors");

        reports.push(SweepReport {
            n_vectors,
            n_reps,
            peak_infected: peak_infected.report(),
            peak_round: peak_round.report(),
            final_dead: final_dead.report(),
            final_immune: final_immune.report(),
        });
    }

    Ok(reports)
}
