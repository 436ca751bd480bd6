//! Light travel time correction
//!
//! Light from a body at line-of-sight coordinate z reaches the observer z/c
//! later than light from the plane z = 0 (positive z is farther away). For
//! an observation time t_obs the corrector finds the emission time t_em with
//!
//! ```text
//! f(t) = t - z(t)/c - t_obs = 0
//! ```
//!
//! by Newton's method on the analytic derivative f'(t) = 1 - v_z(t)/c.

use serde::{Deserialize, Serialize};

use super::error::DynamicsError;
use super::state::BodyState;

/// Anything that can report one body's state at an arbitrary time
///
/// Implemented by the Keplerian propagator (pure) and by the N-body
/// integrator session (which advances its own state, so callers hand in a
/// private copy).
pub trait BodyPropagator {
    fn body_state_at(&mut self, body: usize, time: f64) -> Result<BodyState, DynamicsError>;
}

/// Light travel time root-finder settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightTravelTime {
    /// Speed of light in the caller's length/time units
    pub speed_of_light: f64,

    /// Convergence threshold on the Newton step |Δt|
    pub tolerance: f64,

    /// Newton iterations allowed before giving up
    pub max_iterations: usize,
}

impl LightTravelTime {
    pub const DEFAULT_TOLERANCE: f64 = 1.48e-8;
    pub const DEFAULT_MAX_ITERATIONS: usize = 50;

    /// Corrector with default tolerance and iteration budget
    ///
    /// # Errors
    ///
    /// `InvalidInput` unless the speed of light is positive and finite.
    pub fn new(speed_of_light: f64) -> Result<Self, DynamicsError> {
        if !(speed_of_light > 0.0) || !speed_of_light.is_finite() {
            return Err(DynamicsError::invalid_input(format!(
                "speed of light must be positive and finite, got {}",
                speed_of_light
            )));
        }
        Ok(Self {
            speed_of_light,
            tolerance: Self::DEFAULT_TOLERANCE,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        })
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Emission time for `body` observed at `t_obs`, seeded at `t_obs`
    pub fn emission_time<P: BodyPropagator + ?Sized>(
        &self,
        propagator: &mut P,
        body: usize,
        t_obs: f64,
    ) -> Result<f64, DynamicsError> {
        self.emission_time_from(propagator, body, t_obs, t_obs)
    }

    /// Emission time for `body` observed at `t_obs`, seeded at `seed`
    ///
    /// # Errors
    ///
    /// `Convergence` when the iteration budget runs out or the derivative
    /// vanishes (|v_z| = c); propagator errors pass through unchanged.
    pub fn emission_time_from<P: BodyPropagator + ?Sized>(
        &self,
        propagator: &mut P,
        body: usize,
        t_obs: f64,
        seed: f64,
    ) -> Result<f64, DynamicsError> {
        let c = self.speed_of_light;
        let mut t = seed;

        for iteration in 1..=self.max_iterations {
            let state = propagator.body_state_at(body, t)?;
            let residual = t - state.z() / c - t_obs;
            let slope = 1.0 - state.velocity.z / c;

            if slope == 0.0 || !slope.is_finite() {
                break;
            }

            let step = residual / slope;
            t -= step;
            log::trace!(
                "LTTE body {} t_obs={} iteration {}: t={} step={:e}",
                body,
                t_obs,
                iteration,
                t,
                step
            );

            if step.abs() <= self.tolerance {
                return Ok(t);
            }
        }

        Err(DynamicsError::Convergence {
            body,
            time: t_obs,
            iterations: self.max_iterations,
        })
    }

    /// State of `body` at the emission time of light observed at `t_obs`
    pub fn correct<P: BodyPropagator + ?Sized>(
        &self,
        propagator: &mut P,
        body: usize,
        t_obs: f64,
    ) -> Result<BodyState, DynamicsError> {
        let t_em = self.emission_time(propagator, body, t_obs)?;
        propagator.body_state_at(body, t_em)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::hierarchy::Hierarchy;
    use crate::propagation::keplerian::{KeplerianPropagator, OrbitParameters};
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    /// Body moving uniformly along the line of sight
    struct Drift {
        z0: f64,
        vz: f64,
        calls: usize,
    }

    impl BodyPropagator for Drift {
        fn body_state_at(&mut self, _body: usize, time: f64) -> Result<BodyState, DynamicsError> {
            self.calls += 1;
            Ok(BodyState::new(
                Vector3::new(0.0, 0.0, self.z0 + self.vz * time),
                Vector3::new(0.0, 0.0, self.vz),
                1.0,
                time,
            ))
        }
    }

    fn binary() -> KeplerianPropagator {
        KeplerianPropagator::new(
            Hierarchy::jacobi(2).unwrap(),
            vec![14.4, 10.0],
            &[OrbitParameters {
                sma: 10.0,
                ecc: 0.3,
                incl: PI / 2.0,
                per0: 0.4,
                long_an: 0.0,
                mean_anom: 0.0,
            }],
            0.0,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_uniform_drift_has_closed_form() {
        let ltte = LightTravelTime::new(50.0).unwrap();
        let mut drift = Drift {
            z0: 100.0,
            vz: 5.0,
            calls: 0,
        };
        let t_obs = 3.0;
        let t_em = ltte.emission_time(&mut drift, 0, t_obs).unwrap();

        let expected = (t_obs + 100.0 / 50.0) / (1.0 - 5.0 / 50.0);
        assert!((t_em - expected).abs() < 1e-10, "t_em {} vs {}", t_em, expected);
        // Linear residual: one Newton step lands on the root, one more confirms it
        assert_eq!(drift.calls, 2);
    }

    #[test]
    fn test_emission_time_satisfies_light_travel_relation() {
        let propagator = binary();
        let c = 20.0;
        let ltte = LightTravelTime::new(c).unwrap().with_tolerance(1e-12);

        for &t_obs in &[0.0, 3.3, 17.0] {
            let mut view = &propagator;
            let state = ltte.correct(&mut view, 1, t_obs).unwrap();
            let lag = state.time - t_obs;
            assert!(
                (lag - state.z() / c).abs() < 1e-10,
                "t_em - t_obs = {} but z/c = {}",
                lag,
                state.z() / c
            );
        }
    }

    #[test]
    fn test_converged_root_is_fixed_point() {
        let propagator = binary();
        let ltte = LightTravelTime::new(20.0).unwrap().with_tolerance(1e-12);
        let mut view = &propagator;

        let t_em = ltte.emission_time(&mut view, 0, 5.0).unwrap();
        let again = ltte.emission_time_from(&mut view, 0, 5.0, t_em).unwrap();
        assert!((again - t_em).abs() < 1e-11);
    }

    #[test]
    fn test_exhausted_budget_is_convergence_error() {
        let propagator = binary();
        let ltte = LightTravelTime::new(20.0).unwrap().with_max_iterations(1);
        let mut view = &propagator;

        let err = ltte.emission_time(&mut view, 1, 2.0).unwrap_err();
        assert_eq!(
            err,
            DynamicsError::Convergence {
                body: 1,
                time: 2.0,
                iterations: 1
            }
        );
    }

    #[test]
    fn test_light_speed_motion_fails_to_converge() {
        let ltte = LightTravelTime::new(5.0).unwrap();
        let mut drift = Drift {
            z0: 1.0,
            vz: 5.0,
            calls: 0,
        };
        assert!(matches!(
            ltte.emission_time(&mut drift, 0, 0.0),
            Err(DynamicsError::Convergence { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_speed_of_light() {
        assert!(LightTravelTime::new(0.0).is_err());
        assert!(LightTravelTime::new(f64::INFINITY).is_err());
    }
}
