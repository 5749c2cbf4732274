use std::fmt::{self, Display};

use crate::coalescence::Coalescence;
use crate::util::three_momentum;

pub const PDG_PBAR: i32 = -2212;
pub const PDG_NBAR: i32 = -2112;

/// Constituents eligible for coalescence
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Antinucleon {
    Antiproton,
    Antineutron,
}

impl Antinucleon {
    pub fn from_pdg(id: i32) -> Option<Self> {
        match id {
            PDG_PBAR => Some(Self::Antiproton),
            PDG_NBAR => Some(Self::Antineutron),
            _ => None,
        }
    }

    pub fn pdg(self) -> i32 {
        match self {
            Self::Antiproton => PDG_PBAR,
            Self::Antineutron => PDG_NBAR,
        }
    }

    /// Contribution to the charge number of a cluster
    pub fn charge_number(self) -> usize {
        match self {
            Self::Antiproton => 1,
            Self::Antineutron => 0,
        }
    }
}

/// A final-state antinucleon found in an event
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Position in the event's particle list
    pub index: usize,
    pub kind: Antinucleon,
    /// Four-momentum `[E, px, py, pz]`
    pub p: [f64; 4],
}

impl Candidate {
    pub fn momentum(&self) -> [f64; 3] {
        three_momentum(&self.p)
    }
}

/// Composite antinucleus, classified by the number of constituents
///
/// `Antihelium3` covers both antihelium-3 and antitriton.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Species {
    Antideuteron,
    Antihelium3,
    Antihelium4,
}

impl Species {
    pub const ALL: [Species; 3] = [Self::Antideuteron, Self::Antihelium3, Self::Antihelium4];

    pub fn mass_number(self) -> usize {
        match self {
            Self::Antideuteron => 2,
            Self::Antihelium3 => 3,
            Self::Antihelium4 => 4,
        }
    }

    pub fn from_mass_number(a: usize) -> Option<Self> {
        match a {
            2 => Some(Self::Antideuteron),
            3 => Some(Self::Antihelium3),
            4 => Some(Self::Antihelium4),
            _ => None,
        }
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Antideuteron => "antideuteron",
            Self::Antihelium3 => "antihelium-3",
            Self::Antihelium4 => "antihelium-4",
        };
        f.write_str(name)
    }
}

/// A coalescing subset of the candidate list
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClusterMatch {
    pub species: Species,
    members: [usize; 4],
}

impl ClusterMatch {
    fn new(species: Species, members: &[usize]) -> Self {
        debug_assert_eq!(members.len(), species.mass_number());
        debug_assert!(members.windows(2).all(|w| w[0] < w[1]));
        let mut m = [0; 4];
        m[..members.len()].copy_from_slice(members);
        Self { species, members: m }
    }

    /// Strictly increasing indices into the candidate list
    pub fn members(&self) -> &[usize] {
        &self.members[..self.species.mass_number()]
    }

    pub fn mass_number(&self) -> usize {
        self.species.mass_number()
    }

    /// Number of antiprotons among the members
    pub fn charge_number(&self, candidates: &[Candidate]) -> usize {
        self.members()
            .iter()
            .map(|&i| candidates[i].kind.charge_number())
            .sum()
    }

    /// Summed four-momentum of the members
    pub fn total_momentum(&self, candidates: &[Candidate]) -> [f64; 4] {
        crate::util::sum_four_momenta(self.members().iter().map(|&i| &candidates[i].p))
    }
}

/// Find all coalescing pairs, triples and quadruples
///
/// Subsets are visited in strictly increasing index order. A triple is
/// only tested when its first two members coalesce, and a quadruple only
/// when its first three do. Nested matches are all reported, so a
/// coalescing quadruple also shows up as its leading pair and triple.
pub fn find_clusters(candidates: &[Candidate], coalescence: &Coalescence) -> Vec<ClusterMatch> {
    let momenta: Vec<_> = candidates.iter().map(Candidate::momentum).collect();
    let n = momenta.len();
    let mut found = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if !coalescence.coalesces(&[momenta[i], momenta[j]]) {
                continue;
            }
            found.push(ClusterMatch::new(Species::Antideuteron, &[i, j]));

            for k in (j + 1)..n {
                if !coalescence.coalesces(&[momenta[i], momenta[j], momenta[k]]) {
                    continue;
                }
                found.push(ClusterMatch::new(Species::Antihelium3, &[i, j, k]));

                for l in (k + 1)..n {
                    let quad = [momenta[i], momenta[j], momenta[k], momenta[l]];
                    if coalescence.coalesces(&quad) {
                        found.push(ClusterMatch::new(Species::Antihelium4, &[i, j, k, l]));
                    }
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Antinucleon::{Antineutron as N, Antiproton as P};
    use crate::util::on_shell_energy;

    const M_PBAR: f64 = 0.938272;

    fn candidates(momenta: &[[f64; 3]], kinds: &[Antinucleon]) -> Vec<Candidate> {
        momenta
            .iter()
            .zip(kinds)
            .enumerate()
            .map(|(index, (p, &kind))| Candidate {
                index,
                kind,
                p: [on_shell_energy(p, M_PBAR), p[0], p[1], p[2]],
            })
            .collect()
    }

    fn count(found: &[ClusterMatch], species: Species) -> usize {
        found.iter().filter(|m| m.species == species).count()
    }

    #[test]
    fn single_antideuteron() {
        let c = candidates(&[[0., 0., 0.], [0., 0., 0.05]], &[P, N]);
        let found = find_clusters(&c, &Coalescence::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].species, Species::Antideuteron);
        assert_eq!(found[0].members(), &[0, 1]);
        assert_eq!(found[0].mass_number(), 2);
        assert_eq!(found[0].charge_number(&c), 1);
    }

    #[test]
    fn distant_pair_prunes_supersets() {
        // pair (0, 1) fails; the third candidate sits between them and
        // coalesces with each end separately
        let c = candidates(&[[0., 0., 0.], [0., 0., 0.2], [0., 0., 0.1]], &[P, P, N]);
        let found = find_clusters(&c, &Coalescence::default());
        assert!(found.iter().all(|m| m.members()[..2] != [0, 1]));
        assert_eq!(count(&found, Species::Antihelium3), 0);
        assert_eq!(count(&found, Species::Antideuteron), 2);
    }

    #[test]
    fn four_close_antiprotons() {
        let c = candidates(
            &[[0., 0., 0.], [0.01, 0., 0.], [0., 0.01, 0.], [0., 0., 0.01]],
            &[P; 4],
        );
        let found = find_clusters(&c, &Coalescence::default());
        assert_eq!(count(&found, Species::Antideuteron), 6);
        assert_eq!(count(&found, Species::Antihelium3), 4);
        assert_eq!(count(&found, Species::Antihelium4), 1);
        let he4 = found.iter().find(|m| m.species == Species::Antihelium4).unwrap();
        assert_eq!(he4.members(), &[0, 1, 2, 3]);
        assert_eq!(he4.mass_number(), 4);
        assert_eq!(he4.charge_number(&c), 4);
    }

    #[test]
    fn quadruple_uses_fourth_member() {
        // the fourth candidate is far away, so only the triple may match
        let c = candidates(
            &[[0., 0., 0.], [0.01, 0., 0.], [0., 0.01, 0.], [1., 1., 1.]],
            &[P, N, N, P],
        );
        let found = find_clusters(&c, &Coalescence::default());
        assert_eq!(count(&found, Species::Antihelium3), 1);
        assert_eq!(count(&found, Species::Antihelium4), 0);
    }

    #[test]
    fn disjoint_pairs() {
        let c = candidates(
            &[[0., 0., 0.], [5., 0., 0.], [0., 0., 0.03], [5., 0., 0.03]],
            &[P, N, N, N],
        );
        let found = find_clusters(&c, &Coalescence::default());
        let pairs: Vec<_> = found.iter().map(|m| m.members().to_vec()).collect();
        assert_eq!(pairs, vec![vec![0, 2], vec![1, 3]]);
        assert_eq!(found[0].charge_number(&c), 1);
        assert_eq!(found[1].charge_number(&c), 0);
    }

    #[test]
    fn failing_pairs_never_prefix_larger_matches() {
        let momenta = [
            [0., 0., 0.],
            [0., 0., 0.15],
            [0., 0.02, 0.07],
            [0.02, 0., 0.08],
            [0.1, 0., 0.05],
        ];
        let c = candidates(&momenta, &[P, N, P, N, P]);
        let coal = Coalescence::default();
        let found = find_clusters(&c, &coal);
        for m in &found {
            let members = m.members();
            let pair = [c[members[0]].momentum(), c[members[1]].momentum()];
            assert!(coal.coalesces(&pair));
            let z = m.charge_number(&c);
            assert!(z <= m.mass_number());
        }
    }

    #[test]
    fn empty_and_single() {
        assert!(find_clusters(&[], &Coalescence::default()).is_empty());
        let c = candidates(&[[0., 0., 0.]], &[P]);
        assert!(find_clusters(&c, &Coalescence::default()).is_empty());
    }

    #[test]
    fn total_momentum_sums_members() {
        let c = candidates(&[[0., 0., 0.], [0., 0., 0.05]], &[P, P]);
        let found = find_clusters(&c, &Coalescence::default());
        let total = found[0].total_momentum(&c);
        assert!((total[0] - c[0].p[0] - c[1].p[0]).abs() < 1e-12);
        assert!((total[3] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn species_by_mass_number() {
        for species in Species::ALL {
            assert_eq!(Species::from_mass_number(species.mass_number()), Some(species));
        }
        assert_eq!(Species::from_mass_number(5), None);
        assert_eq!(Antinucleon::from_pdg(-2212), Some(Antinucleon::Antiproton));
        assert_eq!(Antinucleon::from_pdg(2212), None);
        for kind in [P, N] {
            assert_eq!(Antinucleon::from_pdg(kind.pdg()), Some(kind));
        }
    }
}
