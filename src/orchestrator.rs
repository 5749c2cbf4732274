use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashSet;
use log::{error, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::analysis::EventAnalyzer;
use crate::coalescence::{Coalescence, P_COAL};
use crate::error::{ConfigError, RunError, WorkerError};
use crate::generator::{Channel, GeneratorFactory, GeneratorSettings, DEFAULT_BEAMS, MAX_SEED};
use crate::output::{ResultLog, SpeciesCounts};
use crate::worker::{WorkerReport, WorkerTask};

/// Collision energies in GeV
pub const DEFAULT_ENERGIES: [f64; 5] = [2., 20., 200., 2000., 20000.];
pub const DEFAULT_EVENTS: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Collision energies in GeV, processed in order
    pub energies: Vec<f64>,
    /// Events per energy, shared between workers
    pub total_events: u64,
    pub workers: usize,
    pub channel: Channel,
    pub beams: [i32; 2],
    pub coalescence: Coalescence,
    /// Base for the seed sequence; fresh entropy if unset
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn new(channel: Channel) -> Self {
        Self {
            energies: DEFAULT_ENERGIES.to_vec(),
            total_events: DEFAULT_EVENTS,
            workers: default_workers(),
            channel,
            beams: DEFAULT_BEAMS,
            coalescence: Coalescence::new(P_COAL),
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.energies.is_empty() {
            return Err(ConfigError::NoEnergies);
        }
        if let Some(e) = self.energies.iter().find(|e| !(e.is_finite() && **e > 0.)) {
            return Err(ConfigError::InvalidEnergy(e.to_string()));
        }
        let p_coal = self.coalescence.p_coal;
        if !(p_coal.is_finite() && p_coal > 0.) {
            return Err(ConfigError::InvalidCoalescenceMomentum(p_coal.to_string()));
        }
        Ok(())
    }

    fn settings(&self, energy: f64) -> GeneratorSettings {
        GeneratorSettings {
            energy,
            beams: self.beams,
            channel: self.channel,
        }
    }
}

/// Number of available processing units
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Events for each worker slot; the remainder goes to the first slots
pub fn split_budget(total: u64, workers: usize) -> Vec<u64> {
    let n = workers as u64;
    let (base, rest) = (total / n, total % n);
    (0..n).map(|slot| base + u64::from(slot < rest)).collect()
}

/// Draws generator seeds, never handing out the same seed twice
#[derive(Clone, Debug)]
pub struct SeedSource {
    rng: ChaCha8Rng,
    issued: AHashSet<u64>,
}

impl SeedSource {
    pub fn new(base: Option<u64>) -> Self {
        let rng = match base {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            issued: AHashSet::new(),
        }
    }

    /// Next seed in `1..=MAX_SEED`
    pub fn draw(&mut self) -> u64 {
        loop {
            let seed = self.rng.gen_range(1..=MAX_SEED);
            if self.issued.insert(seed) {
                return seed;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnergyReport {
    pub energy: f64,
    pub workers: Vec<WorkerReport>,
}

impl EnergyReport {
    pub fn matches(&self) -> SpeciesCounts {
        let mut total = SpeciesCounts::default();
        for worker in &self.workers {
            total.add(&worker.matches);
        }
        total
    }

    pub fn skipped(&self) -> u64 {
        self.workers.iter().map(|w| w.skipped).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunReport {
    pub groups: Vec<EnergyReport>,
}

impl RunReport {
    pub fn matches(&self) -> SpeciesCounts {
        let mut total = SpeciesCounts::default();
        for group in &self.groups {
            total.add(&group.matches());
        }
        total
    }
}

pub struct Orchestrator<'a, F, W> {
    config: &'a RunConfig,
    factory: &'a F,
    log: &'a ResultLog<W>,
}

impl<'a, F, W> Orchestrator<'a, F, W>
where
    F: GeneratorFactory,
    W: Write + Send,
{
    pub fn new(config: &'a RunConfig, factory: &'a F, log: &'a ResultLog<W>) -> Self {
        Self { config, factory, log }
    }

    /// Process all energies in order, waiting for every worker of one
    /// energy before starting the next
    pub fn run(&self) -> Result<RunReport, RunError> {
        self.config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|n| format!("worker-{n}"))
            .build()?;
        let analyzer = EventAnalyzer::new(self.config.coalescence);
        let mut seeds = SeedSource::new(self.config.seed);
        let budget = split_budget(self.config.total_events, self.config.workers);
        let mut report = RunReport::default();

        for (completed_groups, &energy) in self.config.energies.iter().enumerate() {
            info!(
                "Starting {} workers at {energy} GeV, {} events",
                self.config.workers, self.config.total_events
            );
            let tasks: Vec<_> = budget
                .iter()
                .enumerate()
                .map(|(slot, &events)| WorkerTask {
                    slot,
                    energy,
                    events,
                    seed: seeds.draw(),
                })
                .collect();
            let settings = self.config.settings(energy);
            let halt = AtomicBool::new(false);
            let results: Vec<_> = pool.install(|| {
                tasks
                    .par_iter()
                    .with_max_len(1)
                    .map(|task| {
                        let res = task.run(self.factory, &settings, &analyzer, self.log, &halt);
                        if let Err(err) = &res {
                            if !matches!(err, WorkerError::Halted { .. }) {
                                error!("{err}");
                                halt.store(true, Ordering::Relaxed);
                            }
                        }
                        res
                    })
                    .collect()
            });

            match first_failure(results) {
                Ok(workers) => {
                    self.log.flush().map_err(|source| RunError::Flush {
                        completed_groups,
                        energy,
                        source,
                    })?;
                    let group = EnergyReport { energy, workers };
                    info!(
                        "Finished {energy} GeV: {}, {} failed attempts",
                        group.matches(),
                        group.skipped()
                    );
                    report.groups.push(group);
                }
                Err(source) => {
                    return Err(RunError::Aborted {
                        completed_groups,
                        energy,
                        source,
                    })
                }
            }
        }
        Ok(report)
    }
}

/// Collect worker reports, preferring a root cause over `Halted`
fn first_failure(
    results: Vec<Result<WorkerReport, WorkerError>>,
) -> Result<Vec<WorkerReport>, WorkerError> {
    let mut reports = Vec::with_capacity(results.len());
    let mut halted = None;
    for res in results {
        match res {
            Ok(report) => reports.push(report),
            Err(err @ WorkerError::Halted { .. }) => {
                halted.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }
    match halted {
        Some(err) => Err(err),
        None => Ok(reports),
    }
}
