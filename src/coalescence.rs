/// Default coalescence momentum in GeV
pub const P_COAL: f64 = 0.160;

/// Coalescence criterion with a fixed coalescence momentum
///
/// A set of antinucleons forms a bound antinucleus when every member lies
/// within a sphere of diameter `p_coal` around the centroid of the
/// members' three-momenta.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Coalescence {
    /// Diameter of the coalescence sphere in GeV
    pub p_coal: f64,
}

impl Default for Coalescence {
    fn default() -> Self {
        Self { p_coal: P_COAL }
    }
}

impl Coalescence {
    pub fn new(p_coal: f64) -> Self {
        Self { p_coal }
    }

    /// Maximum allowed distance from the centroid
    pub fn radius(&self) -> f64 {
        self.p_coal / 2.
    }

    /// Check whether all momenta lie within `radius()` of their centroid
    ///
    /// The boundary is inclusive. Any non-finite component makes the test
    /// fail.
    pub fn coalesces(&self, momenta: &[[f64; 3]]) -> bool {
        if momenta.is_empty() {
            return true;
        }
        let centroid = centroid(momenta);
        if centroid.iter().any(|c| !c.is_finite()) {
            return false;
        }
        let r = self.radius();
        let r2 = r * r;
        momenta.iter().all(|p| distance_squared(p, &centroid) <= r2)
    }
}

/// Check the coalescence condition with the default coalescence momentum
pub fn coalesces(momenta: &[[f64; 3]]) -> bool {
    Coalescence::default().coalesces(momenta)
}

fn centroid(momenta: &[[f64; 3]]) -> [f64; 3] {
    let mut c = [0.; 3];
    for p in momenta {
        for (c, p) in c.iter_mut().zip(p) {
            *c += p;
        }
    }
    let n = momenta.len() as f64;
    c.map(|c| c / n)
}

fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}
