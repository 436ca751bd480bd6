//! First-order post-Newtonian (1PN) correction
//!
//! Einstein-Infeld-Hoffmann equations of motion in the parameterized form
//! used for planetary ephemerides (Newhall, Standish & Williams 1983) with
//! β = γ = 1. Only the difference from Newtonian gravity is added, so this
//! model is meant to sit next to `NewtonianGravity` in a composite.

use nalgebra::Vector3;

use super::{ForceModel, NewtonianGravity};
use crate::propagation::state::SystemState;

/// 1PN Einstein-Infeld-Hoffmann perturbation
#[derive(Debug, Clone, Copy)]
pub struct PostNewtonian {
    pub gravitational_constant: f64,
    pub speed_of_light: f64,
}

impl PostNewtonian {
    pub fn new(gravitational_constant: f64, speed_of_light: f64) -> Self {
        Self {
            gravitational_constant,
            speed_of_light,
        }
    }

    /// Periastron advance per orbit of a relativistic binary (rad)
    ///
    /// Δω = 6πGM / (c² a (1 - e²)) for total mass M.
    pub fn periastron_advance_per_orbit(&self, total_mass: f64, sma: f64, ecc: f64) -> f64 {
        6.0 * std::f64::consts::PI * self.gravitational_constant * total_mass
            / (self.speed_of_light * self.speed_of_light * sma * (1.0 - ecc * ecc))
    }
}

impl ForceModel for PostNewtonian {
    fn accumulate(&self, state: &SystemState, out: &mut [Vector3<f64>]) {
        let g = self.gravitational_constant;
        let inv_c2 = 1.0 / (self.speed_of_light * self.speed_of_light);
        let bodies = &state.bodies;
        let n = bodies.len();

        // Newtonian accelerations and potentials Σ G m_k / r_ik
        let newtonian = NewtonianGravity::new(g).accelerations(state);
        let potentials: Vec<f64> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&k| k != i)
                    .map(|k| g * bodies[k].mass / (bodies[k].position - bodies[i].position).norm())
                    .sum()
            })
            .collect();

        for i in 0..n {
            let ri = bodies[i].position;
            let vi = bodies[i].velocity;
            let mut correction = Vector3::zeros();

            for j in (0..n).filter(|&j| j != i) {
                let rj = bodies[j].position;
                let vj = bodies[j].velocity;
                let aj = newtonian[j];
                let gm = g * bodies[j].mass;

                let r_ji = rj - ri;
                let r = r_ji.norm();
                let r3 = r * r * r;

                let radial_vj = (ri - rj).dot(&vj) / r;
                let bracket = -4.0 * potentials[i] - potentials[j] + vi.norm_squared()
                    + 2.0 * vj.norm_squared()
                    - 4.0 * vi.dot(&vj)
                    - 1.5 * radial_vj * radial_vj
                    + 0.5 * r_ji.dot(&aj);

                correction += r_ji * (gm / r3 * bracket);
                correction += (vi - vj) * (gm / r3 * (ri - rj).dot(&(4.0 * vi - 3.0 * vj)));
                correction += aj * (3.5 * gm / r);
            }

            out[i] += correction * inv_c2;
        }
    }

    fn name(&self) -> &'static str {
        "1PN relativity"
    }

    fn description(&self) -> &'static str {
        "Einstein-Infeld-Hoffmann first post-Newtonian correction"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::state::BodyState;

    fn circular_binary(c: f64) -> (SystemState, PostNewtonian) {
        let mut state = SystemState::new(0.0);
        state.bodies.push(BodyState::new(
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -0.5, 0.0),
            1.0,
            0.0,
        ));
        state.bodies.push(BodyState::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
            1.0,
            0.0,
        ));
        (state, PostNewtonian::new(1.0, c))
    }

    #[test]
    fn test_correction_vanishes_with_infinite_light_speed() {
        let (state, pn) = circular_binary(1e12);
        let mut out = vec![Vector3::zeros(); 2];
        pn.accumulate(&state, &mut out);
        assert!(out[0].norm() < 1e-20 && out[1].norm() < 1e-20);
    }

    #[test]
    fn test_correction_scales_as_inverse_c_squared() {
        let (state, pn1) = circular_binary(100.0);
        let (_, pn2) = circular_binary(200.0);

        let mut out1 = vec![Vector3::zeros(); 2];
        let mut out2 = vec![Vector3::zeros(); 2];
        pn1.accumulate(&state, &mut out1);
        pn2.accumulate(&state, &mut out2);

        assert!(out1[1].norm() > 0.0);
        assert!((out1[1].norm() / out2[1].norm() - 4.0).abs() < 1e-9);
        // Symmetric pair: equal and opposite corrections
        assert!((out1[0] + out1[1]).norm() < 1e-15);
    }

    #[test]
    fn test_circular_correction_is_radial() {
        let (state, pn) = circular_binary(50.0);
        let mut out = vec![Vector3::zeros(); 2];
        pn.accumulate(&state, &mut out);
        // For circular motion the 1PN correction only changes the radial pull
        assert!(out[1].y.abs() < 1e-15);
        assert!(out[1].x.abs() > 0.0);
    }

    #[test]
    fn test_advance_formula() {
        let pn = PostNewtonian::new(1.0, 100.0);
        let expected = 6.0 * std::f64::consts::PI / (1e4 * 0.75);
        assert!((pn.periastron_advance_per_orbit(1.0, 1.0, 0.5) - expected).abs() < 1e-15);
    }
}
