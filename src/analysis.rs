use std::io::Write;

use log::{debug, warn};

use crate::cluster::{find_clusters, Antinucleon, Candidate, ClusterMatch};
use crate::coalescence::Coalescence;
use crate::error::OutputError;
use crate::event::Event;
use crate::output::{ClusterRecord, ResultLog, SpeciesCounts};
use crate::util::is_finite;

/// Outcome of analysing a single event
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EventSummary {
    /// Final-state antinucleons entering the search
    pub candidates: usize,
    /// Antinucleons dropped for missing or non-finite momenta
    pub excluded: usize,
    /// Matches per species
    pub matches: SpeciesCounts,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EventAnalyzer {
    pub coalescence: Coalescence,
}

impl EventAnalyzer {
    pub fn new(coalescence: Coalescence) -> Self {
        Self { coalescence }
    }

    /// Final-state antiprotons and antineutrons in event order
    ///
    /// Also returns the number of antinucleons without a usable momentum.
    pub fn candidates(&self, event: &Event) -> (Vec<Candidate>, usize) {
        let mut candidates = Vec::new();
        let mut excluded = 0;
        for (index, particle) in event.particles.iter().enumerate() {
            if !particle.is_final() {
                continue;
            }
            let Some(kind) = Antinucleon::from_pdg(particle.pdg()) else {
                continue;
            };
            match particle.p {
                Some(p) if is_finite(&p) => candidates.push(Candidate { index, kind, p }),
                _ => {
                    warn!(
                        "Ignoring {kind:?} {index} in event {:?}: unusable momentum {:?}",
                        event.id, particle.p
                    );
                    excluded += 1;
                }
            }
        }
        (candidates, excluded)
    }

    /// Search one event and record every match in `log`
    pub fn analyze<W: Write + Send>(
        &self,
        event: &Event,
        energy: f64,
        log: &ResultLog<W>,
    ) -> Result<EventSummary, OutputError> {
        let (candidates, excluded) = self.candidates(event);
        let mut summary = EventSummary {
            candidates: candidates.len(),
            excluded,
            ..Default::default()
        };
        if candidates.len() < 2 {
            return Ok(summary);
        }
        for found in find_clusters(&candidates, &self.coalescence) {
            let record = cluster_record(energy, &found, &candidates);
            debug!("Found {} at {energy} GeV: {record}", found.species);
            log.record(&record)?;
            summary.matches[found.species] += 1;
        }
        Ok(summary)
    }
}

fn cluster_record(energy: f64, found: &ClusterMatch, candidates: &[Candidate]) -> ClusterRecord {
    ClusterRecord {
        energy,
        mass_number: found.mass_number(),
        charge_number: found.charge_number(candidates),
        total_energy: found.total_momentum(candidates)[0],
    }
}
