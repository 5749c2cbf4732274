pub mod analysis;
pub mod cluster;
pub mod coalescence;
pub mod error;
pub mod event;
pub mod generator;
#[cfg(feature = "hepmc2")]
mod hepmc2;
pub mod orchestrator;
pub mod output;
pub mod summary;
mod util;
pub mod worker;

pub use crate::analysis::EventAnalyzer;
pub use crate::cluster::{find_clusters, Antinucleon, Candidate, ClusterMatch, Species};
pub use crate::coalescence::{coalesces, Coalescence};
pub use crate::event::Event;
pub use crate::orchestrator::{Orchestrator, RunConfig, RunReport};
pub use crate::output::{ClusterRecord, ResultLog, RunDetails};
