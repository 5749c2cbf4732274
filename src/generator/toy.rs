use ahash::AHashMap;
use particle_id::ParticleID;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal, Poisson, UnitSphere};

use super::{split_command, EventGenerator, GeneratorFactory};
use crate::cluster::Antinucleon;
use crate::error::{GenerationError, GeneratorError};
use crate::event::{Event, Particle, Status};
use crate::util::on_shell_energy;

const M_PROTON: f64 = 0.938272;
const M_NEUTRON: f64 = 0.939565;
const M_PION: f64 = 0.139570;
const M_PI0: f64 = 0.134977;

const DEFAULT_ENERGY: f64 = 500.;
const DEFAULT_SPREAD: f64 = 0.1;

const KEY_ENERGY: &str = "Beams:eCM";
const KEY_BEAM_A: &str = "Beams:idA";
const KEY_BEAM_B: &str = "Beams:idB";
const KEY_ANTINUCLEON_MEAN: &str = "Toy:antinucleonMean";
const KEY_SPREAD: &str = "Toy:momentumSpread";
const KEY_FAILURE_RATE: &str = "Toy:failureRate";

/// Seeded toy event generator
///
/// Each event is an e⁺e⁻ annihilation into a single jet of pions with a
/// Poisson-distributed number of nucleon-antinucleon pairs. Antinucleons
/// are smeared around a common jet momentum, so that nearby antinucleons
/// are frequent. Only baryon number is conserved.
#[derive(Clone, Debug, Default)]
pub struct ToyGenerator {
    settings: AHashMap<String, String>,
    seed: u64,
    model: Option<ToyModel>,
}

#[derive(Clone, Debug)]
struct ToyModel {
    rng: ChaCha8Rng,
    energy: f64,
    beams: [i32; 2],
    max_pairs: u64,
    pairs: Option<Poisson<f64>>,
    pions: Poisson<f64>,
    jet_momentum: Exp<f64>,
    smear: Normal<f64>,
    failure_rate: f64,
    nevent: i32,
}

impl ToyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Result<Option<f64>, GeneratorError> {
        let Some(value) = self.settings.get(key) else {
            return Ok(None);
        };
        value.parse().map(Some).map_err(|_| invalid(key, value))
    }

    fn get_id(&self, key: &str, default: i32) -> Result<i32, GeneratorError> {
        match self.settings.get(key) {
            Some(value) => value.parse().map_err(|_| invalid(key, value)),
            None => Ok(default),
        }
    }
}

fn invalid(key: &str, value: &str) -> GeneratorError {
    GeneratorError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

impl EventGenerator for ToyGenerator {
    fn configure(&mut self, command: &str) -> Result<(), GeneratorError> {
        let (key, value) = split_command(command)?;
        self.settings.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn init(&mut self) -> Result<(), GeneratorError> {
        let energy = self.get(KEY_ENERGY)?.unwrap_or(DEFAULT_ENERGY);
        if !(energy.is_finite() && energy > 0.) {
            return Err(invalid(KEY_ENERGY, &energy.to_string()));
        }
        // each antinucleon comes with a nucleon
        let max_pairs = (energy / (2. * M_NEUTRON)).floor() as u64;
        let log_s = (energy / (2. * M_PROTON)).max(1.).ln();
        let mean = self.get(KEY_ANTINUCLEON_MEAN)?.unwrap_or(0.4 * log_s);
        if !(mean.is_finite() && mean >= 0.) {
            return Err(invalid(KEY_ANTINUCLEON_MEAN, &mean.to_string()));
        }
        let pairs = if mean > 0. {
            Some(Poisson::new(mean).map_err(|_| invalid(KEY_ANTINUCLEON_MEAN, &mean.to_string()))?)
        } else {
            None
        };
        let spread = self.get(KEY_SPREAD)?.unwrap_or(DEFAULT_SPREAD);
        let smear = Normal::new(0., spread).map_err(|_| invalid(KEY_SPREAD, &spread.to_string()))?;
        let failure_rate = self.get(KEY_FAILURE_RATE)?.unwrap_or(0.);
        if !(0. ..=1.).contains(&failure_rate) {
            return Err(invalid(KEY_FAILURE_RATE, &failure_rate.to_string()));
        }
        let pion_mean = 2. * energy.max(1.).ln() + 1.;
        let pions = Poisson::new(pion_mean).map_err(|_| invalid(KEY_ENERGY, &energy.to_string()))?;
        let jet_momentum =
            Exp::new(20. / energy).map_err(|_| invalid(KEY_ENERGY, &energy.to_string()))?;
        let beams = [self.get_id(KEY_BEAM_A, 11)?, self.get_id(KEY_BEAM_B, -11)?];
        self.model = Some(ToyModel {
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            energy,
            beams,
            max_pairs,
            pairs,
            pions,
            jet_momentum,
            smear,
            failure_rate,
            nevent: 0,
        });
        Ok(())
    }

    fn next_event(&mut self) -> Result<Event, GenerationError> {
        let model = self.model.as_mut().ok_or(GenerationError::NotInitialised)?;
        model.generate()
    }
}

impl ToyModel {
    fn generate(&mut self) -> Result<Event, GenerationError> {
        self.nevent += 1;
        if self.failure_rate > 0. && self.rng.gen_bool(self.failure_rate) {
            return Err(GenerationError::Rejected);
        }
        let half = self.energy / 2.;
        let mut particles = vec![
            particle(self.beams[0], [half, 0., 0., half], Status::Incoming),
            particle(self.beams[1], [half, 0., 0., -half], Status::Incoming),
            particle(23, [self.energy, 0., 0., 0.], Status::IntermediateResonance),
        ];

        let axis: [f64; 3] = UnitSphere.sample(&mut self.rng);
        let pjet = self.jet_momentum.sample(&mut self.rng).min(half);
        let centre = axis.map(|a| a * pjet);

        let npairs = match &self.pairs {
            Some(pairs) => (pairs.sample(&mut self.rng) as u64).min(self.max_pairs),
            None => 0,
        };
        for _ in 0..npairs {
            let kind = if self.rng.gen_bool(0.5) {
                Antinucleon::Antiproton
            } else {
                Antinucleon::Antineutron
            };
            let m = match kind {
                Antinucleon::Antiproton => M_PROTON,
                Antinucleon::Antineutron => M_NEUTRON,
            };
            let p = self.smeared(&centre);
            particles.push(particle(kind.pdg(), on_shell(&p, m), Status::Outgoing));
            let recoil = self.smeared(&centre.map(|c| -c));
            particles.push(particle(-kind.pdg(), on_shell(&recoil, m), Status::Outgoing));
        }

        let npions = self.pions.sample(&mut self.rng) as u64;
        for _ in 0..npions {
            let dir: [f64; 3] = UnitSphere.sample(&mut self.rng);
            let k = self.jet_momentum.sample(&mut self.rng).min(half) / 4.;
            let p = dir.map(|d| d * k);
            match self.rng.gen_range(0..3) {
                0 => particles.push(particle(211, on_shell(&p, M_PION), Status::Outgoing)),
                1 => particles.push(particle(-211, on_shell(&p, M_PION), Status::Outgoing)),
                _ => {
                    let pi0 = on_shell(&p, M_PI0);
                    particles.push(particle(111, pi0, Status::IntermediateResonance));
                    let half_p = [pi0[1] / 2., pi0[2] / 2., pi0[3] / 2.];
                    let gamma = on_shell(&half_p, 0.);
                    particles.push(particle(22, gamma, Status::Outgoing));
                    particles.push(particle(22, gamma, Status::Outgoing));
                }
            }
        }

        Ok(Event {
            id: Some(self.nevent),
            process_id: Some(0),
            weights: vec![1.],
            particles,
        })
    }

    fn smeared(&mut self, centre: &[f64; 3]) -> [f64; 3] {
        let mut p = *centre;
        for p in &mut p {
            *p += self.smear.sample(&mut self.rng);
        }
        p
    }
}

fn on_shell(p: &[f64; 3], m: f64) -> [f64; 4] {
    [on_shell_energy(p, m), p[0], p[1], p[2]]
}

fn particle(id: i32, p: [f64; 4], status: Status) -> Particle {
    let m = (p[0] * p[0] - p[1] * p[1] - p[2] * p[2] - p[3] * p[3]).max(0.).sqrt();
    Particle {
        id: Some(ParticleID::new(id)),
        p: Some(p),
        m: Some(m),
        status: Some(status),
    }
}

/// Builds toy generators, applying extra commands to each
#[derive(Clone, Debug, Default)]
pub struct ToyFactory {
    pub commands: Vec<String>,
}

impl ToyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }
}

impl GeneratorFactory for ToyFactory {
    type Generator = ToyGenerator;

    fn build(&self) -> Result<ToyGenerator, GeneratorError> {
        let mut generator = ToyGenerator::new();
        for command in &self.commands {
            generator.configure(command)?;
        }
        Ok(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{PDG_NBAR, PDG_PBAR};
    use crate::generator::{Channel, GeneratorSettings};

    fn generator(seed: u64, energy: f64, extra: &[&str]) -> ToyGenerator {
        let mut factory = ToyFactory::new();
        for command in extra {
            factory = factory.with_command(*command);
        }
        let mut generator = factory.build().unwrap();
        GeneratorSettings::new(energy, Channel::BottomPair)
            .apply(&mut generator, seed)
            .unwrap();
        generator
    }

    #[test]
    fn requires_init() {
        let mut generator = ToyGenerator::new();
        assert!(matches!(
            generator.next_event(),
            Err(GenerationError::NotInitialised)
        ));
    }

    #[test]
    fn same_seed_same_events() {
        let mut a = generator(17, 200., &[]);
        let mut b = generator(17, 200., &[]);
        for _ in 0..20 {
            let ea = a.next_event().unwrap();
            let eb = b.next_event().unwrap();
            assert_eq!(ea.particles, eb.particles);
        }
    }

    #[test]
    fn baryon_number_caps_antinucleons() {
        // at 2 GeV at most one nucleon pair fits
        let mut generator = generator(3, 2., &["Toy:antinucleonMean = 5"]);
        for _ in 0..50 {
            let event = generator.next_event().unwrap();
            let nbar = event
                .final_state()
                .filter(|p| p.pdg() == PDG_PBAR || p.pdg() == PDG_NBAR)
                .count();
            assert!(nbar <= 1);
        }
    }

    #[test]
    fn antinucleons_come_with_nucleons() {
        let mut generator = generator(11, 200., &["Toy:antinucleonMean = 3"]);
        let mut antinucleons = 0;
        for _ in 0..20 {
            let event = generator.next_event().unwrap();
            let count = |id| event.final_state().filter(|p| p.pdg() == id).count();
            assert_eq!(count(PDG_PBAR), count(-PDG_PBAR));
            assert_eq!(count(PDG_NBAR), count(-PDG_NBAR));
            antinucleons += count(PDG_PBAR) + count(PDG_NBAR);
        }
        assert!(antinucleons > 0);
    }

    #[test]
    fn beams_and_final_state() {
        let mut generator = generator(5, 200., &[]);
        let event = generator.next_event().unwrap();
        assert_eq!(event.particles[0].pdg(), 11);
        assert_eq!(event.particles[1].pdg(), -11);
        assert!(!event.particles[0].is_final());
        assert!(event.final_state().all(|p| p.status == Some(Status::Outgoing)));
    }

    #[test]
    fn failure_rate_rejects() {
        let mut generator = generator(9, 200., &["Toy:failureRate = 1"]);
        assert!(matches!(
            generator.next_event(),
            Err(GenerationError::Rejected)
        ));
    }

    #[test]
    fn invalid_values() {
        let mut generator = ToyGenerator::new();
        generator.configure("Toy:momentumSpread = wide").unwrap();
        assert!(generator.init().is_err());

        let mut generator = ToyGenerator::new();
        generator.configure("Toy:failureRate = 2").unwrap();
        assert!(generator.init().is_err());
    }
}
