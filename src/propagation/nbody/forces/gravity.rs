//! Point-mass Newtonian gravity

use nalgebra::Vector3;

use super::ForceModel;
use crate::propagation::state::SystemState;

/// Direct pairwise Newtonian gravity (O(N²), no softening)
#[derive(Debug, Clone, Copy)]
pub struct NewtonianGravity {
    pub gravitational_constant: f64,
}

impl NewtonianGravity {
    pub fn new(gravitational_constant: f64) -> Self {
        Self {
            gravitational_constant,
        }
    }

    /// Newtonian acceleration of every body
    pub fn accelerations(&self, state: &SystemState) -> Vec<Vector3<f64>> {
        let mut out = vec![Vector3::zeros(); state.bodies.len()];
        self.accumulate(state, &mut out);
        out
    }
}

impl ForceModel for NewtonianGravity {
    fn accumulate(&self, state: &SystemState, out: &mut [Vector3<f64>]) {
        let bodies = &state.bodies;

        // Each unordered pair once; equal and opposite pulls
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let r = bodies[j].position - bodies[i].position;
                let d2 = r.norm_squared();
                let inv_d3 = self.gravitational_constant / (d2 * d2.sqrt());

                out[i] += r * (bodies[j].mass * inv_d3);
                out[j] -= r * (bodies[i].mass * inv_d3);
            }
        }
    }

    fn name(&self) -> &'static str {
        "Newtonian gravity"
    }

    fn description(&self) -> &'static str {
        "Direct pairwise point-mass gravity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::state::BodyState;

    #[test]
    fn test_momentum_conserving_forces() {
        let mut state = SystemState::new(0.0);
        for (i, m) in [1.0, 2.5, 0.3].iter().enumerate() {
            let x = i as f64;
            state.bodies.push(BodyState::new(
                Vector3::new(x, x * x - 1.0, 0.5 * x),
                Vector3::zeros(),
                *m,
                0.0,
            ));
        }

        let gravity = NewtonianGravity::new(2.0);
        let accel = gravity.accelerations(&state);
        let net: Vector3<f64> = state
            .bodies
            .iter()
            .zip(&accel)
            .map(|(b, a)| a * b.mass)
            .sum();
        assert!(net.norm() < 1e-14);
    }

    #[test]
    fn test_scales_with_gravitational_constant() {
        let mut state = SystemState::new(0.0);
        state.bodies.push(BodyState::new(Vector3::zeros(), Vector3::zeros(), 1.0, 0.0));
        state.bodies.push(BodyState::new(Vector3::new(0.0, 0.0, 3.0), Vector3::zeros(), 9.0, 0.0));

        let a1 = NewtonianGravity::new(1.0).accelerations(&state);
        let a2 = NewtonianGravity::new(4.0).accelerations(&state);
        assert!((a1[0].z - 1.0).abs() < 1e-15);
        assert!((a2[0].z - 4.0).abs() < 1e-15);
    }
}
