use thiserror::Error;

/// Failure to construct, configure or initialise an event generator
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Unrecognised generator setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to launch generator `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to produce a single event
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Event rejected by generator")]
    Rejected,

    #[error("Malformed event record: {0}")]
    Malformed(String),

    #[error("Generator ran out of events")]
    Exhausted,

    #[error("Generator used before initialisation")]
    NotInitialised,
}

impl GenerationError {
    /// Whether later attempts can still succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Exhausted | Self::NotInitialised)
    }
}

/// Failure of the shared result log
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write to result log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result log unusable after an earlier write failure")]
    Failed,
}

/// Irrecoverable failure of a single worker task
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker {slot}: {source}")]
    Generator {
        slot: usize,
        #[source]
        source: GeneratorError,
    },

    #[error("Worker {slot}: {source}")]
    Generation {
        slot: usize,
        #[source]
        source: GenerationError,
    },

    #[error("Worker {slot}: {source}")]
    Output {
        slot: usize,
        #[source]
        source: OutputError,
    },

    #[error("Worker {slot} halted after a failure elsewhere in the run")]
    Halted { slot: usize },
}

/// Failure of a complete run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(
        "Run aborted at {energy} GeV after {completed_groups} completed energy groups: {source}"
    )]
    Aborted {
        completed_groups: usize,
        energy: f64,
        #[source]
        source: WorkerError,
    },

    #[error("Flush at {energy} GeV failed after {completed_groups} completed groups: {source}")]
    Flush {
        completed_groups: usize,
        energy: f64,
        #[source]
        source: OutputError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid run configuration, detected before any work starts
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid process channel {0}, expected one of 0, 1, 2, 4")]
    InvalidChannel(String),

    #[error("Process channel 3 is reserved")]
    ReservedChannel,

    #[error("Need at least one worker")]
    NoWorkers,

    #[error("Need at least one collision energy")]
    NoEnergies,

    #[error("Invalid collision energy {0}")]
    InvalidEnergy(String),

    #[error("Invalid coalescence momentum {0}")]
    InvalidCoalescenceMomentum(String),

    #[error("Invalid beam specification `{0}`, expected two PDG codes")]
    InvalidBeams(String),

    #[error("External generator needs a command")]
    MissingCommand,

    #[error("Cannot create output file {0}")]
    Output(String),
}

/// Failure to read back a result log
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("Invalid spectrum binning: {0}")]
    Binning(String),
}
