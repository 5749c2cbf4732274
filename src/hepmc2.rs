use particle_id::ParticleID;

use crate::event::{Event, Particle, Status};

const HEPMC_OUTGOING: i32 = 1;
const HEPMC_DECAYED: i32 = 2;
const HEPMC_DOC: i32 = 3;
const HEPMC_INCOMING: i32 = 4;

impl From<hepmc2::Event> for Event {
    fn from(source: hepmc2::Event) -> Self {
        let efact = if source.energy_unit == hepmc2::event::EnergyUnit::MEV {
            1e-3
        } else {
            1.
        };
        let mut particles = Vec::new();
        for vx in source.vertices {
            // exclude incident particles with decayed status,
            // they are listed as outgoing at the vertex where they originate
            let incoming = vx.particles_in.into_iter()
                .filter(|p| p.status != HEPMC_DECAYED);
            for particle in incoming.chain(vx.particles_out) {
                particles.push(Particle {
                    id: Some(ParticleID::new(particle.id)),
                    p: Some(particle.p.0.map(|p| efact * p)),
                    m: Some(efact * particle.m),
                    status: Some(from_i32(particle.status)),
                });
            }
        }

        Self {
            id: Some(source.number),
            process_id: Some(source.signal_process_id),
            weights: source.weights,
            particles,
        }
    }
}

fn from_i32(status: i32) -> Status {
    use Status::*;
    match status {
        HEPMC_INCOMING => Incoming,
        HEPMC_OUTGOING => Outgoing,
        HEPMC_DECAYED => IntermediateResonance,
        HEPMC_DOC => IntermediateDoc,
        s => Unknown(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::EventAnalyzer;
    use crate::cluster::Antinucleon;

    // e+ e- -> anti-p anti-Lambda, anti-Lambda -> anti-n pi0, in MeV
    const EVENT: &str = "\
HepMC::Version 2.06.09
HepMC::IO_GenEvent-START_EVENT_LISTING
E 7 -1 -1 -1 -1 0 0 2 1 2 0 1 1
N 1 \"0\"
U MEV MM
C 1 0
F 0 0 0 0 0 0 0 0 0
V -1 0 0 0 0 0 2 2 0
P 1 11 0 0 10000 10000 0.511 4 0 0 -1 0
P 2 -11 0 0 -10000 10000 0.511 4 0 0 -1 0
P 3 -2212 0 0 300 1000 938.272 1 0 0 0 0
P 4 -3122 0 100 0 1120 1115.683 2 0 0 -2 0
V -2 0 0 0 0 0 0 2 0
P 5 -2112 0 60 0 941.5 939.565 1 0 0 0 0
P 6 111 0 40 0 140 134.977 1 0 0 0 0
HepMC::IO_GenEvent-END_EVENT_LISTING
";

    fn read_event() -> Event {
        let mut reader = hepmc2::reader::Reader::from(EVENT.as_bytes());
        let event = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());
        event.into()
    }

    #[test]
    fn converts_generator_record() {
        let event = read_event();
        assert_eq!(event.id, Some(7));
        assert_eq!(event.weights, vec![1.]);

        let ids: Vec<_> = event.particles.iter().map(|p| p.pdg()).collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids.iter().filter(|&&id| id == -3122).count(), 1);

        let pbar = event.particles.iter().find(|p| p.pdg() == -2212).unwrap();
        let p = pbar.p.unwrap();
        assert!((p[0] - 1.).abs() < 1e-12);
        assert!((p[3] - 0.3).abs() < 1e-12);
        assert!((pbar.m.unwrap() - 0.938272).abs() < 1e-12);
        assert!(pbar.is_final());

        let lambda = event.particles.iter().find(|p| p.pdg() == -3122).unwrap();
        assert_eq!(lambda.status, Some(Status::IntermediateResonance));
        assert!(!lambda.is_final());
        let beams: Vec<_> = event
            .particles
            .iter()
            .filter(|p| p.status == Some(Status::Incoming))
            .map(|p| p.pdg())
            .collect();
        assert_eq!(beams, vec![11, -11]);
    }

    #[test]
    fn decay_products_are_candidates() {
        let event = read_event();
        let (candidates, excluded) = EventAnalyzer::default().candidates(&event);
        assert_eq!(excluded, 0);
        let kinds: Vec<_> = candidates.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![Antinucleon::Antiproton, Antinucleon::Antineutron]);
        assert!((candidates[1].p[2] - 0.06).abs() < 1e-12);
    }

    #[test]
    fn status_codes() {
        assert_eq!(from_i32(1), Status::Outgoing);
        assert_eq!(from_i32(2), Status::IntermediateResonance);
        assert_eq!(from_i32(4), Status::Incoming);
        assert_eq!(from_i32(11), Status::Unknown(11));
    }
}
