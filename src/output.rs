use std::fmt::{self, Display};
use std::io::Write;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use crate::cluster::Species;
use crate::error::OutputError;
use crate::generator::Channel;

/// Tag marking the run metadata line
pub const RUN_DETAILS_TAG: &str = "RUNDETAILS";

/// One coalescing cluster
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClusterRecord {
    /// Collision energy in GeV
    pub energy: f64,
    /// Number of antinucleons
    pub mass_number: usize,
    /// Number of antiprotons
    pub charge_number: usize,
    /// Summed energy of the constituents in GeV
    pub total_energy: f64,
}

impl ClusterRecord {
    pub fn species(&self) -> Option<Species> {
        Species::from_mass_number(self.mass_number)
    }
}

impl Display for ClusterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.energy, self.mass_number, self.charge_number, self.total_energy
        )
    }
}

/// Metadata written as the first line of the log
#[derive(Clone, Debug, PartialEq)]
pub struct RunDetails {
    pub start: DateTime<Utc>,
    pub total_events: u64,
    pub channel: Channel,
}

impl Display for RunDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{RUN_DETAILS_TAG} {} {} {}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.total_events,
            self.channel.selector()
        )
    }
}

/// Number of matches per species
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpeciesCounts([u64; 3]);

impl SpeciesCounts {
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn add(&mut self, other: &SpeciesCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a += b;
        }
    }
}

fn slot(species: Species) -> usize {
    match species {
        Species::Antideuteron => 0,
        Species::Antihelium3 => 1,
        Species::Antihelium4 => 2,
    }
}

impl Index<Species> for SpeciesCounts {
    type Output = u64;

    fn index(&self, species: Species) -> &u64 {
        &self.0[slot(species)]
    }
}

impl IndexMut<Species> for SpeciesCounts {
    fn index_mut(&mut self, species: Species) -> &mut u64 {
        &mut self.0[slot(species)]
    }
}

impl Display for SpeciesCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} antideuterons, {} antihelium-3, {} antihelium-4",
            self[Species::Antideuteron],
            self[Species::Antihelium3],
            self[Species::Antihelium4]
        )
    }
}

struct LogState<W> {
    sink: W,
    counts: SpeciesCounts,
    records: u64,
}

/// Result writer shared by all workers of a run
///
/// Writing a record and counting it happen in one critical section, so
/// the species counters always agree with the lines in the sink.
pub struct ResultLog<W> {
    state: Mutex<LogState<W>>,
    failed: AtomicBool,
}

impl<W: Write + Send> ResultLog<W> {
    pub fn new(sink: W) -> Self {
        Self {
            state: Mutex::new(LogState {
                sink,
                counts: Default::default(),
                records: 0,
            }),
            failed: AtomicBool::new(false),
        }
    }

    pub fn write_header(&self, details: &RunDetails) -> Result<(), OutputError> {
        self.write_line(&format!("{details}\n"))
    }

    /// Append one record and count it towards its species
    pub fn record(&self, record: &ClusterRecord) -> Result<(), OutputError> {
        let line = format!("{record}\n");
        let mut state = self.state.lock();
        self.append(&mut state, &line)?;
        if let Some(species) = record.species() {
            state.counts[species] += 1;
        }
        state.records += 1;
        Ok(())
    }

    /// Whether an earlier write has failed
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> SpeciesCounts {
        self.state.lock().counts
    }

    pub fn records(&self) -> u64 {
        self.state.lock().records
    }

    pub fn flush(&self) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        if let Err(err) = state.sink.flush() {
            self.failed.store(true, Ordering::SeqCst);
            return Err(err.into());
        }
        Ok(())
    }

    /// Flush and hand back the sink together with the final counts
    pub fn finish(self) -> Result<(W, SpeciesCounts), OutputError> {
        if self.is_failed() {
            return Err(OutputError::Failed);
        }
        let mut state = self.state.into_inner();
        state.sink.flush()?;
        Ok((state.sink, state.counts))
    }

    fn write_line(&self, line: &str) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        self.append(&mut state, line)
    }

    fn append(&self, state: &mut LogState<W>, line: &str) -> Result<(), OutputError> {
        if self.is_failed() {
            return Err(OutputError::Failed);
        }
        if let Err(err) = state.sink.write_all(line.as_bytes()) {
            self.failed.store(true, Ordering::SeqCst);
            return Err(err.into());
        }
        Ok(())
    }
}
