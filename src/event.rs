use particle_id::ParticleID;

/// Scattering event
#[derive(Clone, Debug, Default)]
pub struct Event {
    /// Event id
    pub id: Option<i32>,
    /// ID of the process this event belongs to
    pub process_id: Option<i32>,
    /// Event weights
    pub weights: Vec<f64>,
    /// Particles involved in the scattering
    pub particles: Vec<Particle>,
}

impl Event {
    /// Final-state particles, in event order
    pub fn final_state(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.is_final())
    }
}

/// A particle
#[derive(Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Particle {
    /// Particle type
    pub id: Option<ParticleID>,
    /// Four-momentum `[E, px, py, pz]` in GeV
    pub p: Option<[f64; 4]>,
    /// Mass
    pub m: Option<f64>,
    /// Status
    pub status: Option<Status>,
}

impl Particle {
    /// Whether the particle survives to the end of the event
    pub fn is_final(&self) -> bool {
        self.status == Some(Status::Outgoing)
    }

    /// PDG code, zero if unknown
    pub fn pdg(&self) -> i32 {
        self.id.map(|id| id.id()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Incoming particle
    Incoming,
    /// Outgoing particle
    Outgoing,
    /// Intermediate resonance, decayed further within the event
    IntermediateResonance,
    /// Intermediate resonance, for documentation only
    IntermediateDoc,
    /// Unknown
    Unknown(i32),
}
