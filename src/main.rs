use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use antinuclei::coalescence::P_COAL;
use antinuclei::error::ConfigError;
#[cfg(feature = "hepmc2")]
use antinuclei::generator::ExternalFactory;
use antinuclei::generator::{Channel, GeneratorFactory, ToyFactory};
use antinuclei::orchestrator::{default_workers, DEFAULT_EVENTS};
use antinuclei::summary::{Nuclide, Spectrum, Summary};
use antinuclei::{Coalescence, Orchestrator, ResultLog, RunConfig, RunDetails};

#[derive(Debug, Parser)]
#[command(version, about = "Search simulated collision events for coalescing antinuclei")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate events and record all coalescing antinucleon clusters
    Run(RunArgs),
    /// Summarise a result log
    Summary(SummaryArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GeneratorKind {
    /// Built-in toy model
    Toy,
    /// External program writing HepMC2 events to stdout
    #[cfg(feature = "hepmc2")]
    External,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Output file for the result log
    output: PathBuf,

    /// Process channel: 0 = Z/γ* → b b̄, 1 = Z/γ* → t t̄, 2 = W⁺W⁻, 4 = HZ
    #[arg(short, long)]
    channel: Channel,

    /// Events per collision energy, shared between workers
    #[arg(short = 'n', long, default_value_t = DEFAULT_EVENTS)]
    events: u64,

    /// Number of worker threads [default: available parallelism]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Comma-separated collision energies in GeV
    #[arg(short, long, value_delimiter = ',', default_values_t = [2., 20., 200., 2000., 20000.])]
    energies: Vec<f64>,

    /// Coalescence momentum in GeV
    #[arg(long, default_value_t = P_COAL)]
    p_coal: f64,

    /// PDG codes of the two beams
    #[arg(long, value_delimiter = ',', default_values_t = [11, -11], allow_negative_numbers = true)]
    beams: Vec<i32>,

    /// Base seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, value_enum, default_value_t = GeneratorKind::Toy)]
    generator: GeneratorKind,

    /// Extra generator command, may be repeated (e.g. "Toy:failureRate = 0.01")
    #[arg(long = "set")]
    settings: Vec<String>,

    /// Program for the external generator, followed by its arguments
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct SummaryArgs {
    /// Result log to summarise
    log: PathBuf,

    /// Number of spectrum bins
    #[arg(long, default_value_t = 10)]
    bins: usize,

    /// Lower edge of the spectrum in GeV
    #[arg(long, default_value_t = 1.)]
    min_energy: f64,

    /// Upper edge of the spectrum in GeV
    #[arg(long, default_value_t = 100.)]
    max_energy: f64,
}

impl RunArgs {
    fn config(&self) -> Result<RunConfig, ConfigError> {
        let beams: [i32; 2] = self
            .beams
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::InvalidBeams(format!("{:?}", self.beams)))?;
        let config = RunConfig {
            energies: self.energies.clone(),
            total_events: self.events,
            workers: self.workers.unwrap_or_else(default_workers),
            channel: self.channel,
            beams,
            coalescence: Coalescence::new(self.p_coal),
            seed: self.seed,
        };
        config.validate()?;
        #[cfg(feature = "hepmc2")]
        if self.generator == GeneratorKind::External && self.command.is_empty() {
            return Err(ConfigError::MissingCommand);
        }
        Ok(config)
    }

    fn create_output(&self) -> Result<File, ConfigError> {
        File::create(&self.output)
            .map_err(|err| ConfigError::Output(format!("{}: {err}", self.output.display())))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            // nothing has been attempted yet
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => err.exit(),
    };
    match cli.command {
        Command::Run(args) => run(args),
        Command::Summary(args) => summary(args),
    }
}

fn run(args: RunArgs) -> ExitCode {
    let prepared = args
        .config()
        .and_then(|config| args.create_output().map(|file| (config, file)));
    let (config, file) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            // nothing has been attempted yet
            eprintln!("error: {err}\n\nFor more information, try '--help'.");
            return ExitCode::SUCCESS;
        }
    };
    match args.generator {
        GeneratorKind::Toy => {
            let factory = ToyFactory {
                commands: args.settings.clone(),
            };
            run_with(file, &config, &factory)
        }
        #[cfg(feature = "hepmc2")]
        GeneratorKind::External => {
            let factory = ExternalFactory::new(args.command[0].clone(), args.command[1..].to_vec());
            run_with(file, &config, &factory)
        }
    }
}

fn run_with<F: GeneratorFactory>(file: File, config: &RunConfig, factory: &F) -> ExitCode {
    info!("Using {} workers", config.workers);
    let log = ResultLog::new(BufWriter::new(file));
    let details = RunDetails {
        start: Utc::now(),
        total_events: config.total_events,
        channel: config.channel,
    };
    if let Err(err) = log.write_header(&details) {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    let report = Orchestrator::new(config, factory, &log).run();
    match report {
        Ok(report) => {
            if let Err(err) = log.finish() {
                error!("{err}");
                return ExitCode::FAILURE;
            }
            info!("Job finished: {}", report.matches());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            let _ = log.flush();
            ExitCode::FAILURE
        }
    }
}

fn summary(args: SummaryArgs) -> ExitCode {
    let summary = match File::open(&args.log)
        .map_err(Into::into)
        .and_then(|file| Summary::read(BufReader::new(file)))
    {
        Ok(summary) => summary,
        Err(err) => {
            error!("{}: {err}", args.log.display());
            return ExitCode::FAILURE;
        }
    };
    let events = summary.events();
    if let Some(header) = &summary.header {
        println!(
            "Run started {}, {} events per energy, channel {}",
            header.start, header.total_events, header.channel
        );
    }
    for group in &summary.groups {
        println!("\nDM mass {} GeV (√s = {} GeV)", group.dark_matter_mass(), group.energy);
        let counts = group.counts();
        for nuclide in Nuclide::ALL {
            println!("  {:>13}: {}", nuclide.to_string(), counts[nuclide]);
        }
        let Some(events) = events else { continue };
        let spectrum = match Spectrum::log_binned(
            group.energies(Nuclide::Antideuteron),
            args.min_energy,
            args.max_energy,
            args.bins,
        ) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                error!("{err}");
                return ExitCode::FAILURE;
            }
        };
        println!("  antideuteron dN/dE per event [GeV⁻¹]:");
        for (lo, density) in spectrum.edges.iter().zip(spectrum.density(events)) {
            println!("    {lo:>10.3} {density:.3e}");
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(["antinuclei", "run"].iter().chain(args)).unwrap();
        match cli.command {
            Command::Run(args) => args,
            Command::Summary(_) => unreachable!(),
        }
    }

    #[test]
    fn cli_config() {
        let args = run_args(&["out.txt", "-c", "4", "-e", "20,200", "--beams", "2212,-2212"]);
        let config = args.config().unwrap();
        assert_eq!(config.channel, Channel::HiggsZ);
        assert_eq!(config.energies, vec![20., 200.]);
        assert_eq!(config.beams, [2212, -2212]);
        assert_eq!(config.total_events, DEFAULT_EVENTS);
    }

    #[test]
    fn invalid_cli_config() {
        let args = run_args(&["out.txt", "-c", "0", "--workers", "0"]);
        assert_eq!(args.config(), Err(ConfigError::NoWorkers));
        let args = run_args(&["out.txt", "-c", "0", "--beams", "11"]);
        assert!(matches!(args.config(), Err(ConfigError::InvalidBeams(_))));
        assert!(Cli::try_parse_from(["antinuclei", "run", "out.txt", "-c", "3"]).is_err());
    }

    #[test]
    fn unwritable_output_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let args = run_args(&[path.to_str().unwrap(), "-c", "0"]);
        assert!(args.config().is_ok());
        assert!(matches!(args.create_output(), Err(ConfigError::Output(_))));
        assert!(!path.exists());
    }
}
