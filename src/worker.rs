use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::analysis::EventAnalyzer;
use crate::error::WorkerError;
use crate::generator::{EventGenerator, GeneratorFactory, GeneratorSettings};
use crate::output::{ResultLog, SpeciesCounts};

/// One (collision energy, worker slot) assignment
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorkerTask {
    pub slot: usize,
    /// Collision energy in GeV
    pub energy: f64,
    /// Number of generation attempts
    pub events: u64,
    pub seed: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerReport {
    pub slot: usize,
    pub seed: u64,
    /// Generation attempts made
    pub attempts: u64,
    /// Events passed through the analyzer
    pub analyzed: u64,
    /// Attempts where the generator failed to produce an event
    pub skipped: u64,
    /// Antinucleons ignored for unusable momenta
    pub excluded: u64,
    pub matches: SpeciesCounts,
    pub elapsed: Duration,
}

impl WorkerTask {
    /// Generate and analyse all events of this task
    ///
    /// Stops early with [WorkerError::Halted] once `halt` is raised or the
    /// result log has failed.
    pub fn run<F, W>(
        &self,
        factory: &F,
        settings: &GeneratorSettings,
        analyzer: &EventAnalyzer,
        log: &ResultLog<W>,
        halt: &AtomicBool,
    ) -> Result<WorkerReport, WorkerError>
    where
        F: GeneratorFactory,
        W: Write + Send,
    {
        let slot = self.slot;
        let start = Instant::now();
        let mut generator = factory
            .build()
            .map_err(|source| WorkerError::Generator { slot, source })?;
        settings
            .apply(&mut generator, self.seed)
            .map_err(|source| WorkerError::Generator { slot, source })?;
        debug!(
            "Worker {slot} running {} events at {} GeV with seed {}",
            self.events, self.energy, self.seed
        );

        let mut report = WorkerReport {
            slot,
            seed: self.seed,
            ..Default::default()
        };
        for _ in 0..self.events {
            if halt.load(Ordering::Relaxed) || log.is_failed() {
                return Err(WorkerError::Halted { slot });
            }
            report.attempts += 1;
            let event = match generator.next_event() {
                Ok(event) => event,
                Err(err) if err.is_recoverable() => {
                    debug!("Worker {slot}: skipping attempt {}: {err}", report.attempts);
                    report.skipped += 1;
                    continue;
                }
                Err(source) => return Err(WorkerError::Generation { slot, source }),
            };
            let summary = analyzer
                .analyze(&event, self.energy, log)
                .map_err(|source| WorkerError::Output { slot, source })?;
            report.analyzed += 1;
            report.excluded += summary.excluded as u64;
            report.matches.add(&summary.matches);
        }
        report.elapsed = start.elapsed();
        info!(
            "Worker {slot} at {} GeV: {} events in {:.1}s, {} skipped, {}",
            self.energy,
            report.analyzed,
            report.elapsed.as_secs_f64(),
            report.skipped,
            report.matches
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, GeneratorError};
    use crate::event::{Event, Particle, Status};
    use crate::generator::Channel;
    use crate::cluster::{Species, PDG_PBAR};
    use particle_id::ParticleID;

    /// Alternates failed attempts with an event holding one antideuteron
    struct Alternating {
        calls: u64,
        limit: Option<u64>,
    }

    impl EventGenerator for Alternating {
        fn configure(&mut self, _command: &str) -> Result<(), GeneratorError> {
            Ok(())
        }

        fn seed(&mut self, _seed: u64) {}

        fn init(&mut self) -> Result<(), GeneratorError> {
            Ok(())
        }

        fn next_event(&mut self) -> Result<Event, GenerationError> {
            self.calls += 1;
            if self.limit.is_some_and(|limit| self.calls > limit) {
                return Err(GenerationError::Exhausted);
            }
            if self.calls % 2 == 0 {
                return Err(GenerationError::Rejected);
            }
            let pbar = |pz: f64| Particle {
                id: Some(ParticleID::new(PDG_PBAR)),
                p: Some([(0.88 + pz * pz).sqrt(), 0., 0., pz]),
                m: None,
                status: Some(Status::Outgoing),
            };
            Ok(Event {
                particles: vec![pbar(0.), pbar(0.02)],
                ..Default::default()
            })
        }
    }

    struct AlternatingFactory(Option<u64>);

    impl GeneratorFactory for AlternatingFactory {
        type Generator = Alternating;

        fn build(&self) -> Result<Alternating, GeneratorError> {
            Ok(Alternating { calls: 0, limit: self.0 })
        }
    }

    struct BrokenFactory;

    impl GeneratorFactory for BrokenFactory {
        type Generator = Alternating;

        fn build(&self) -> Result<Alternating, GeneratorError> {
            Err(GeneratorError::InvalidSetting("broken".to_owned()))
        }
    }

    fn task(events: u64) -> WorkerTask {
        WorkerTask {
            slot: 3,
            energy: 20.,
            events,
            seed: 1,
        }
    }

    fn settings() -> GeneratorSettings {
        GeneratorSettings::new(20., Channel::BottomPair)
    }

    #[test]
    fn failed_attempts_are_skipped() {
        let log = ResultLog::new(Vec::new());
        let halt = AtomicBool::new(false);
        let report = task(10)
            .run(&AlternatingFactory(None), &settings(), &EventAnalyzer::default(), &log, &halt)
            .unwrap();
        assert_eq!(report.slot, 3);
        assert_eq!(report.attempts, 10);
        assert_eq!(report.analyzed, 5);
        assert_eq!(report.skipped, 5);
        assert_eq!(report.matches[Species::Antideuteron], 5);
        assert_eq!(log.records(), 5);
    }

    #[test]
    fn exhaustion_is_fatal() {
        let log = ResultLog::new(Vec::new());
        let halt = AtomicBool::new(false);
        let err = task(10)
            .run(&AlternatingFactory(Some(4)), &settings(), &EventAnalyzer::default(), &log, &halt)
            .unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Generation { slot: 3, source: GenerationError::Exhausted }
        ));
    }

    #[test]
    fn construction_failure() {
        let log = ResultLog::new(Vec::new());
        let halt = AtomicBool::new(false);
        let err = task(10)
            .run(&BrokenFactory, &settings(), &EventAnalyzer::default(), &log, &halt)
            .unwrap_err();
        assert!(matches!(err, WorkerError::Generator { slot: 3, .. }));
    }

    #[test]
    fn halt_stops_worker() {
        let log = ResultLog::new(Vec::new());
        let halt = AtomicBool::new(true);
        let err = task(10)
            .run(&AlternatingFactory(None), &settings(), &EventAnalyzer::default(), &log, &halt)
            .unwrap_err();
        assert!(matches!(err, WorkerError::Halted { slot: 3 }));
        assert_eq!(log.records(), 0);
    }
}
