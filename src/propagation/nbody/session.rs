//! Stateful N-body integration session
//!
//! A session owns the system state and advances it on request. It is
//! created once per run, filled with bodies, then driven through the output
//! times with `integrate_to`. Cloning is cheap (integrator and forces are
//! shared) and yields an independent state, which is how light travel time
//! root-finds evaluate other epochs without disturbing the main run.

use std::sync::Arc;

use nalgebra::Vector3;

use super::forces::CompositeForce;
use super::integrator::Integrator;
use super::settings::{IntegratorType, NBodySettings};
use crate::propagation::error::DynamicsError;
use crate::propagation::ltte::BodyPropagator;
use crate::propagation::state::{BodyState, SystemState};

/// Owned N-body integration state
#[derive(Clone)]
pub struct IntegratorSession {
    state: SystemState,
    integrator: Arc<dyn Integrator>,
    integrator_type: IntegratorType,
    forces: Arc<CompositeForce>,
    settings: NBodySettings,
    /// Magnitude of the next step to attempt
    next_step: f64,
    steps_taken: usize,
}

impl IntegratorSession {
    /// Create an empty session starting at `start_time`
    ///
    /// # Errors
    ///
    /// `UnsupportedConfiguration` for an unknown integrator or for GR in a
    /// build without the `relativity` feature; `InvalidInput` for bad
    /// numeric settings.
    pub fn new(
        settings: NBodySettings,
        gravitational_constant: f64,
        speed_of_light: f64,
        start_time: f64,
    ) -> Result<Self, DynamicsError> {
        let integrator_type = settings.validate()?;
        let forces = build_forces(&settings, gravitational_constant, speed_of_light)?;

        log::debug!(
            "N-body session: integrator={} step={} tolerance={:e} forces={:?}",
            integrator_type.name(),
            settings.step_size,
            settings.tolerance,
            forces.model_names()
        );

        Ok(Self {
            state: SystemState::new(start_time),
            integrator: integrator_type.create(),
            integrator_type,
            forces: Arc::new(forces),
            next_step: settings.step_size,
            settings,
            steps_taken: 0,
        })
    }

    /// Append a body; its index is the number of bodies added before it
    pub fn add_body(&mut self, mass: f64, position: Vector3<f64>, velocity: Vector3<f64>) -> usize {
        self.state
            .bodies
            .push(BodyState::new(position, velocity, mass, self.state.time));
        self.state.bodies.len() - 1
    }

    /// Current simulation time
    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn body_count(&self) -> usize {
        self.state.bodies.len()
    }

    pub fn integrator_type(&self) -> IntegratorType {
        self.integrator_type
    }

    pub fn settings(&self) -> &NBodySettings {
        &self.settings
    }

    /// Total steps accepted since the session was created
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn system(&self) -> &SystemState {
        &self.state
    }

    /// State of one body at the current time
    pub fn state_of(&self, index: usize) -> Result<BodyState, DynamicsError> {
        self.state
            .bodies
            .get(index)
            .map(|b| BodyState {
                time: self.state.time,
                ..*b
            })
            .ok_or_else(|| {
                DynamicsError::invalid_input(format!(
                    "no body with index {} (session has {})",
                    index,
                    self.state.bodies.len()
                ))
            })
    }

    /// States of all bodies at the current time
    pub fn states(&self) -> Vec<BodyState> {
        self.state.snapshot()
    }

    /// Advance (or rewind) the system to exactly `target`
    ///
    /// The last step is shortened to land on `target`; nothing is
    /// interpolated.
    ///
    /// # Errors
    ///
    /// `IntegrationFailure` if the integrator rejects a step or the step
    /// budget of this call is exhausted.
    pub fn integrate_to(&mut self, target: f64) -> Result<(), DynamicsError> {
        if self.state.bodies.is_empty() {
            return Err(DynamicsError::invalid_input("cannot integrate an empty system"));
        }
        if !target.is_finite() {
            return Err(DynamicsError::invalid_input(format!(
                "integration target must be finite, got {}",
                target
            )));
        }

        let direction = (target - self.state.time).signum();
        let tolerance = self.settings.tolerance;
        let forces = Arc::clone(&self.forces);
        let accelerations = move |s: &SystemState| forces.total_accelerations(s);
        let mut steps = 0;

        while (target - self.state.time) * direction > 0.0 {
            if steps >= self.settings.max_steps {
                return Err(DynamicsError::IntegrationFailure {
                    message: format!(
                        "exceeded {} steps integrating to t={} (reached t={})",
                        self.settings.max_steps, target, self.state.time
                    ),
                });
            }

            let remaining = (target - self.state.time).abs();
            let finishing = self.next_step >= remaining;
            let h = direction * self.next_step.min(remaining);

            let result = self
                .integrator
                .adaptive_step(&self.state, h, tolerance, &accelerations);

            if !result.success {
                return Err(DynamicsError::IntegrationFailure {
                    message: format!(
                        "{} rejected step at t={} (scaled error {:?})",
                        self.integrator.name(),
                        self.state.time,
                        result.error_estimate
                    ),
                });
            }

            let full_step = result.dt_used == h;
            self.state = result.state;

            if finishing && full_step {
                // Land exactly on the target
                self.state.time = target;
                for body in &mut self.state.bodies {
                    body.time = target;
                }
            } else {
                self.next_step = result.dt_next.abs();
            }

            steps += 1;
            self.steps_taken += 1;
        }

        log::trace!("Integrated to t={} in {} steps", target, steps);
        Ok(())
    }
}

impl BodyPropagator for IntegratorSession {
    fn body_state_at(&mut self, body: usize, time: f64) -> Result<BodyState, DynamicsError> {
        self.integrate_to(time)?;
        self.state_of(body)
    }
}

#[cfg(feature = "relativity")]
fn build_forces(
    settings: &NBodySettings,
    gravitational_constant: f64,
    speed_of_light: f64,
) -> Result<CompositeForce, DynamicsError> {
    if settings.gr {
        if !(speed_of_light > 0.0) || !speed_of_light.is_finite() {
            return Err(DynamicsError::invalid_input(format!(
                "speed of light must be positive and finite, got {}",
                speed_of_light
            )));
        }
        Ok(CompositeForce::post_newtonian(
            gravitational_constant,
            speed_of_light,
        ))
    } else {
        Ok(CompositeForce::newtonian(gravitational_constant))
    }
}

#[cfg(not(feature = "relativity"))]
fn build_forces(
    settings: &NBodySettings,
    gravitational_constant: f64,
    _speed_of_light: f64,
) -> Result<CompositeForce, DynamicsError> {
    if settings.gr {
        return Err(DynamicsError::unsupported(
            "general relativity requested but this build lacks the `relativity` feature",
        ));
    }
    Ok(CompositeForce::newtonian(gravitational_constant))
}
