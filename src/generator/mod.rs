use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::{ConfigError, GenerationError, GeneratorError};
use crate::event::Event;

#[cfg(feature = "hepmc2")]
pub mod external;
pub mod toy;

#[cfg(feature = "hepmc2")]
pub use external::{ExternalFactory, ExternalGenerator};
pub use toy::{ToyFactory, ToyGenerator};

/// Largest seed accepted by Pythia's random number generator
pub const MAX_SEED: u64 = 900_000_000;

/// Source of simulated collision events
///
/// Generators are configured with Pythia-style `key = value` commands,
/// seeded, initialised and then asked for one event at a time. Each worker
/// owns its generator exclusively.
pub trait EventGenerator {
    /// Apply a single configuration command
    fn configure(&mut self, command: &str) -> Result<(), GeneratorError>;

    fn seed(&mut self, seed: u64);

    /// Finish configuration; must be called before the first event
    fn init(&mut self) -> Result<(), GeneratorError>;

    /// Generate the next event
    fn next_event(&mut self) -> Result<Event, GenerationError>;
}

/// Creates one private generator per worker
pub trait GeneratorFactory: Sync {
    type Generator: EventGenerator;

    fn build(&self) -> Result<Self::Generator, GeneratorError>;
}

/// Hard process selection
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Channel {
    /// γ*/Z → b b̄
    BottomPair,
    /// γ*/Z → t t̄
    TopPair,
    /// W⁺ W⁻ pair production
    WPlusWMinus,
    /// Higgs-strahlung, f f̄ → H Z
    HiggsZ,
}

impl Channel {
    pub fn selector(self) -> u8 {
        match self {
            Self::BottomPair => 0,
            Self::TopPair => 1,
            Self::WPlusWMinus => 2,
            Self::HiggsZ => 4,
        }
    }

    /// Generator commands enabling this channel
    pub fn commands(self) -> &'static [&'static str] {
        match self {
            Self::BottomPair => &[
                "WeakSingleBoson:ffbar2ffbar(s:gm) = on",
                // Z decays to b b-bar only
                "23:oneChannel = 1 1. 0 5",
                "22:onMode = off",
            ],
            Self::TopPair => &[
                "WeakSingleBoson:ffbar2ffbar(s:gm) = on",
                "23:oneChannel = 1 1. 0 6",
                "22:onMode = off",
            ],
            Self::WPlusWMinus => &["WeakDoubleBoson:ffbar2WW = on"],
            Self::HiggsZ => &["HiggsSM:ffbar2HZ = on"],
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = ConfigError;

    fn try_from(selector: u8) -> Result<Self, Self::Error> {
        match selector {
            0 => Ok(Self::BottomPair),
            1 => Ok(Self::TopPair),
            2 => Ok(Self::WPlusWMinus),
            3 => Err(ConfigError::ReservedChannel),
            4 => Ok(Self::HiggsZ),
            n => Err(ConfigError::InvalidChannel(n.to_string())),
        }
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector: u8 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidChannel(s.to_owned()))?;
        selector.try_into()
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector())
    }
}

/// Everything a worker needs to set up its generator
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeneratorSettings {
    /// Centre-of-mass energy in GeV
    pub energy: f64,
    /// PDG codes of the two beams
    pub beams: [i32; 2],
    pub channel: Channel,
}

/// Electron-positron collisions
pub const DEFAULT_BEAMS: [i32; 2] = [11, -11];

impl GeneratorSettings {
    pub fn new(energy: f64, channel: Channel) -> Self {
        Self {
            energy,
            beams: DEFAULT_BEAMS,
            channel,
        }
    }

    /// Commands to apply before initialisation, in order
    pub fn commands(&self) -> Vec<String> {
        let mut commands = vec![
            "Next:numberCount = 10000".to_owned(),
            format!("Beams:eCM = {}", self.energy),
            format!("Beams:idA = {}", self.beams[0]),
            format!("Beams:idB = {}", self.beams[1]),
            "Random:setSeed = on".to_owned(),
        ];
        commands.extend(self.channel.commands().iter().map(|c| c.to_string()));
        commands
    }

    /// Configure, seed and initialise a fresh generator
    pub fn apply<G: EventGenerator>(
        &self,
        generator: &mut G,
        seed: u64,
    ) -> Result<(), GeneratorError> {
        for command in self.commands() {
            generator.configure(&command)?;
        }
        generator.seed(seed);
        generator.init()
    }
}

/// Split a `key = value` command
pub(crate) fn split_command(command: &str) -> Result<(&str, &str), GeneratorError> {
    let (key, value) = command
        .split_once('=')
        .ok_or_else(|| GeneratorError::InvalidSetting(command.to_owned()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(GeneratorError::InvalidSetting(command.to_owned()));
    }
    Ok((key, value.trim()))
}
