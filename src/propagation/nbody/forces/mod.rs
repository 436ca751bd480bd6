//! Force models for N-body integration
//!
//! Each force model implements the `ForceModel` trait and adds its
//! acceleration of every body into a shared buffer. Models are combined with
//! `CompositeForce`, which sums all enabled contributions.
//!
//! # Available Models
//!
//! - **NewtonianGravity**: Direct pairwise point-mass gravity
//! - **PostNewtonian**: First-order Einstein-Infeld-Hoffmann correction
//!   (requires the `relativity` feature)

mod gravity;
#[cfg(feature = "relativity")]
mod relativity;

pub use gravity::NewtonianGravity;
#[cfg(feature = "relativity")]
pub use relativity::PostNewtonian;

use nalgebra::Vector3;

use crate::propagation::state::SystemState;

/// Trait for acceleration contributions
///
/// Models must be thread-safe so a composite can be shared between cloned
/// integration sessions.
pub trait ForceModel: Send + Sync {
    /// Add this model's acceleration of every body to `out`
    ///
    /// `out` has one entry per body of `state`, in body order.
    fn accumulate(&self, state: &SystemState, out: &mut [Vector3<f64>]);

    /// Force model name for debugging and logging
    fn name(&self) -> &'static str;

    /// Brief description of the model
    fn description(&self) -> &'static str {
        self.name()
    }

    /// Disabled models are skipped during acceleration computation
    fn enabled(&self) -> bool {
        true
    }
}

/// Composite force model that aggregates multiple force contributions
#[derive(Default)]
pub struct CompositeForce {
    forces: Vec<Box<dyn ForceModel>>,
}

impl CompositeForce {
    /// Create an empty composite force model
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Add a force model to the composite
    pub fn add(&mut self, force: Box<dyn ForceModel>) {
        log::debug!("Adding force model: {}", force.name());
        self.forces.push(force);
    }

    /// Create a builder for convenient force model construction
    pub fn builder() -> CompositeForceBuilder {
        CompositeForceBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// List all force model names
    pub fn model_names(&self) -> Vec<&'static str> {
        self.forces.iter().map(|f| f.name()).collect()
    }

    /// Total acceleration of every body from all enabled forces
    pub fn total_accelerations(&self, state: &SystemState) -> Vec<Vector3<f64>> {
        let mut out = vec![Vector3::zeros(); state.bodies.len()];
        for force in self.forces.iter().filter(|f| f.enabled()) {
            force.accumulate(state, &mut out);
        }
        out
    }
}

/// Builder for CompositeForce
pub struct CompositeForceBuilder {
    forces: Vec<Box<dyn ForceModel>>,
}

impl CompositeForceBuilder {
    fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Add a force model
    pub fn with(mut self, force: Box<dyn ForceModel>) -> Self {
        self.forces.push(force);
        self
    }

    pub fn with_gravity(self, gravity: NewtonianGravity) -> Self {
        self.with(Box::new(gravity))
    }

    #[cfg(feature = "relativity")]
    pub fn with_relativity(self, relativity: PostNewtonian) -> Self {
        self.with(Box::new(relativity))
    }

    /// Build the composite force model
    pub fn build(self) -> CompositeForce {
        let mut composite = CompositeForce::new();
        for force in self.forces {
            composite.add(force);
        }
        composite
    }
}

/// Standard force model configurations
impl CompositeForce {
    /// Point-mass gravity only
    pub fn newtonian(gravitational_constant: f64) -> Self {
        Self::builder()
            .with_gravity(NewtonianGravity::new(gravitational_constant))
            .build()
    }

    /// Point-mass gravity plus the 1PN correction
    #[cfg(feature = "relativity")]
    pub fn post_newtonian(gravitational_constant: f64, speed_of_light: f64) -> Self {
        Self::builder()
            .with_gravity(NewtonianGravity::new(gravitational_constant))
            .with_relativity(PostNewtonian::new(gravitational_constant, speed_of_light))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::state::BodyState;

    fn pair() -> SystemState {
        let mut state = SystemState::new(0.0);
        state.bodies.push(BodyState::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::zeros(),
            3.0,
            0.0,
        ));
        state.bodies.push(BodyState::new(
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::zeros(),
            1.0,
            0.0,
        ));
        state
    }

    #[test]
    fn test_composite_force_empty() {
        let forces = CompositeForce::new();
        assert!(forces.is_empty());

        let accel = forces.total_accelerations(&pair());
        assert_eq!(accel, vec![Vector3::zeros(); 2]);
    }

    #[test]
    fn test_composite_force_gravity() {
        let forces = CompositeForce::newtonian(1.0);
        assert_eq!(forces.model_names(), vec!["Newtonian gravity"]);

        let accel = forces.total_accelerations(&pair());
        // a0 = G m1 / r² toward +x, a1 = G m0 / r² toward -x
        assert!((accel[0].x - 0.25).abs() < 1e-15);
        assert!((accel[1].x + 0.75).abs() < 1e-15);
        assert!(accel[0].y.abs() < 1e-15 && accel[1].z.abs() < 1e-15);
    }

    struct Disabled;

    impl ForceModel for Disabled {
        fn accumulate(&self, _state: &SystemState, out: &mut [Vector3<f64>]) {
            for a in out.iter_mut() {
                *a += Vector3::new(1.0, 1.0, 1.0);
            }
        }

        fn name(&self) -> &'static str {
            "disabled"
        }

        fn enabled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_disabled_models_are_skipped() {
        let mut forces = CompositeForce::new();
        forces.add(Box::new(Disabled));
        assert_eq!(forces.len(), 1);
        assert_eq!(forces.total_accelerations(&pair()), vec![Vector3::zeros(); 2]);
    }
}
