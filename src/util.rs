/// Spatial part of a four-momentum `[E, px, py, pz]`
pub(crate) fn three_momentum(p: &[f64; 4]) -> [f64; 3] {
    [p[1], p[2], p[3]]
}

pub(crate) fn is_finite(p: &[f64; 4]) -> bool {
    p.iter().all(|x| x.is_finite())
}

/// Component-wise sum of four-momenta
pub(crate) fn sum_four_momenta<'a, I>(momenta: I) -> [f64; 4]
where
    I: IntoIterator<Item = &'a [f64; 4]>,
{
    let mut total = [0.; 4];
    for p in momenta {
        for (t, x) in total.iter_mut().zip(p) {
            *t += x;
        }
    }
    total
}

/// On-shell energy for a given three-momentum and mass
pub(crate) fn on_shell_energy(p: &[f64; 3], m: f64) -> f64 {
    (p[0] * p[0] + p[1] * p[1] + p[2] * p[2] + m * m).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_components() {
        let a = [1., 0.1, 0.2, 0.3];
        let b = [2., -0.1, 0.2, 0.];
        assert_eq!(sum_four_momenta([&a, &b]), [3., 0., 0.4, 0.3]);
    }

    #[test]
    fn massless_energy_is_momentum() {
        assert_eq!(on_shell_energy(&[3., 4., 0.], 0.), 5.);
    }
}
