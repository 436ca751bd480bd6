//! Orbital dynamics of hierarchical stellar systems
//!
//! Two propagation approaches share one input description:
//!
//! ## Keplerian Propagation (Fast)
//!
//! `keplerian` superimposes the analytic two-body orbits of a hierarchy
//! (Jacobi by default). States at any time are independent of each other,
//! so output times are evaluated in parallel and may come in any order.
//!
//! ## N-Body Integration (Accurate)
//!
//! The `nbody` submodule integrates the full mutual gravity of all bodies
//! with a selectable integrator and an optional 1PN relativistic term.
//! Output times must increase strictly.
//!
//! Both paths can apply light travel time effects (`ltte`) and report the
//! instantaneous Roche/Euler elements of every body (`euler`).
//!
//! # Example
//!
//! ```ignore
//! use stellar_dynamics::propagation::*;
//!
//! let orbit = OrbitParameters { sma: 10.0, ecc: 0.1, incl: 1.2, per0: 0.0, long_an: 0.0, mean_anom: 0.0 };
//! let request = DynamicsRequest::new(vec![1.0, 0.8], &[orbit], vec![0.0, 1.0, 2.0])
//!     .with_mode(PropagationMode::Nbody(NBodySettings::high_precision()));
//!
//! let output = DynamicsOrchestrator::new(request)?.compute()?;
//! ```

pub mod elements;
pub mod error;
pub mod euler;
pub mod hierarchy;
pub mod keplerian;
pub mod ltte;
pub mod nbody;
mod orchestrator;
pub mod state;

pub use elements::{elements_from_state, state_from_elements, OrbitalElements};
pub use error::DynamicsError;
pub use euler::{compute_euler, EulerElements};
pub use hierarchy::{Component, Hierarchy, OrbitNode, Side};
pub use keplerian::{KeplerianPropagator, OrbitParameters};
pub use ltte::{BodyPropagator, LightTravelTime};
pub use nbody::{IntegratorSession, IntegratorType, NBodySettings};
pub use orchestrator::*;
pub use state::{BodyState, SystemState};
