use std::fmt::{self, Display};
use std::io::BufRead;
use std::ops::Index;

use chrono::{DateTime, FixedOffset};
use itertools::Itertools;

use crate::error::SummaryError;
use crate::output::{ClusterRecord, RUN_DETAILS_TAG};

/// Antinuclei distinguished by (A, Z)
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Nuclide {
    Antideuteron,
    Antitriton,
    Antihelium3,
    Antihelium4,
    /// Unbound combinations such as two antineutrons
    Other,
}

impl Nuclide {
    pub const ALL: [Nuclide; 5] = [
        Self::Antideuteron,
        Self::Antitriton,
        Self::Antihelium3,
        Self::Antihelium4,
        Self::Other,
    ];

    pub fn classify(mass_number: usize, charge_number: usize) -> Self {
        match (mass_number, charge_number) {
            (2, 1) => Self::Antideuteron,
            (3, 1) => Self::Antitriton,
            (3, 2) => Self::Antihelium3,
            (4, 2) => Self::Antihelium4,
            _ => Self::Other,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl Display for Nuclide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Antideuteron => "antideuteron",
            Self::Antitriton => "antitriton",
            Self::Antihelium3 => "antihelium-3",
            Self::Antihelium4 => "antihelium-4",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Contents of the `RUNDETAILS` line
#[derive(Clone, Debug, PartialEq)]
pub struct RunHeader {
    pub start: DateTime<FixedOffset>,
    pub total_events: u64,
    pub channel: u8,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NuclideCounts([u64; 5]);

impl Index<Nuclide> for NuclideCounts {
    type Output = u64;

    fn index(&self, nuclide: Nuclide) -> &u64 {
        &self.0[nuclide.slot()]
    }
}

/// All records at one collision energy
#[derive(Clone, Debug, PartialEq)]
pub struct EnergyGroup {
    /// Collision energy in GeV
    pub energy: f64,
    pub records: Vec<ClusterRecord>,
}

impl EnergyGroup {
    /// Mass of a dark matter particle annihilating at rest into this energy
    pub fn dark_matter_mass(&self) -> f64 {
        self.energy / 2.
    }

    pub fn counts(&self) -> NuclideCounts {
        let mut counts = NuclideCounts::default();
        for record in &self.records {
            counts.0[Nuclide::classify(record.mass_number, record.charge_number).slot()] += 1;
        }
        counts
    }

    /// Energies of all records of the given nuclide
    pub fn energies(&self, nuclide: Nuclide) -> impl Iterator<Item = f64> + '_ {
        self.records
            .iter()
            .filter(move |r| Nuclide::classify(r.mass_number, r.charge_number) == nuclide)
            .map(|r| r.total_energy)
    }
}

/// Contents of a result log, grouped by collision energy
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub header: Option<RunHeader>,
    /// Groups in ascending order of collision energy
    pub groups: Vec<EnergyGroup>,
}

impl Summary {
    pub fn read<R: BufRead>(reader: R) -> Result<Self, SummaryError> {
        let mut header = None;
        let mut records = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line_nr = n + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(RUN_DETAILS_TAG) {
                header = Some(parse_header(line, line_nr)?);
                continue;
            }
            records.push(parse_record(line, line_nr)?);
        }
        let groups = records
            .into_iter()
            .into_group_map_by(|r| r.energy.to_bits())
            .into_values()
            .map(|records| EnergyGroup {
                energy: records[0].energy,
                records,
            })
            .sorted_by(|a, b| a.energy.total_cmp(&b.energy))
            .collect();
        Ok(Self { header, groups })
    }

    /// Number of generated events per energy, if known
    pub fn events(&self) -> Option<u64> {
        self.header.as_ref().map(|h| h.total_events)
    }
}

fn parse_error(line: usize, msg: impl Into<String>) -> SummaryError {
    SummaryError::Parse {
        line,
        msg: msg.into(),
    }
}

fn parse_header(line: &str, line_nr: usize) -> Result<RunHeader, SummaryError> {
    let fields: Vec<_> = line.split_whitespace().collect();
    let [_, start, total_events, channel] = fields[..] else {
        return Err(parse_error(line_nr, "expected 4 fields in run details"));
    };
    let start = DateTime::parse_from_rfc3339(start)
        .map_err(|err| parse_error(line_nr, format!("invalid start time: {err}")))?;
    let total_events = total_events
        .parse()
        .map_err(|_| parse_error(line_nr, format!("invalid event count `{total_events}`")))?;
    let channel = channel
        .parse()
        .map_err(|_| parse_error(line_nr, format!("invalid channel `{channel}`")))?;
    Ok(RunHeader {
        start,
        total_events,
        channel,
    })
}

fn parse_record(line: &str, line_nr: usize) -> Result<ClusterRecord, SummaryError> {
    let fields: Vec<_> = line.split_whitespace().collect();
    let [energy, a, z, total_energy] = fields[..] else {
        return Err(parse_error(line_nr, format!("expected 4 fields, found {}", fields.len())));
    };
    let float = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| parse_error(line_nr, format!("invalid number `{s}`")))
    };
    let int = |s: &str| {
        s.parse::<usize>()
            .map_err(|_| parse_error(line_nr, format!("invalid integer `{s}`")))
    };
    let record = ClusterRecord {
        energy: float(energy)?,
        mass_number: int(a)?,
        charge_number: int(z)?,
        total_energy: float(total_energy)?,
    };
    if record.charge_number > record.mass_number {
        return Err(parse_error(line_nr, "charge number exceeds mass number"));
    }
    Ok(record)
}

/// Histogram with logarithmically spaced bins
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    /// Bin edges, one more than the number of bins
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Spectrum {
    pub fn log_binned<I>(values: I, lo: f64, hi: f64, bins: usize) -> Result<Self, SummaryError>
    where
        I: IntoIterator<Item = f64>,
    {
        if bins == 0 {
            return Err(SummaryError::Binning("need at least one bin".to_owned()));
        }
        if !(lo > 0. && hi > lo && hi.is_finite()) {
            return Err(SummaryError::Binning(format!("invalid range [{lo}, {hi}]")));
        }
        let (log_lo, log_hi) = (lo.log10(), hi.log10());
        let step = (log_hi - log_lo) / bins as f64;
        let edges: Vec<_> = (0..=bins)
            .map(|i| 10f64.powf(log_lo + i as f64 * step))
            .collect();
        let mut counts = vec![0; bins];
        for value in values {
            if !(lo..=hi).contains(&value) {
                continue;
            }
            let idx = (((value.log10() - log_lo) / step) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Ok(Self { edges, counts })
    }

    /// dN/dE per event for each bin, in GeV⁻¹
    ///
    /// Dividing by the number of events makes runs with different budgets
    /// comparable.
    pub fn density(&self, events: u64) -> Vec<f64> {
        let events = events.max(1) as f64;
        self.edges
            .iter()
            .tuple_windows()
            .zip(&self.counts)
            .map(|((lo, hi), &count)| count as f64 / (hi - lo) / events)
            .collect()
    }
}
