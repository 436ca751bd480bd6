//! Gravitational N-body integration
//!
//! Numerical propagation of the full system with configurable force models,
//! used when Keplerian superposition is not accurate enough (strongly
//! interacting triples, relativistic binaries).
//!
//! # Architecture
//!
//! - **Integrator**: Step methods (Dormand-Prince 5(4), RK4, leapfrog)
//! - **ForceModel**: Acceleration contributions (Newtonian, 1PN relativity)
//! - **IntegratorSession**: Owned system state advanced to requested times
//!
//! # Example
//!
//! ```ignore
//! use stellar_dynamics::propagation::nbody::*;
//!
//! let settings = NBodySettings::default().with_integrator(IntegratorType::Leapfrog);
//! let mut session = IntegratorSession::new(settings, 1.0, 37_231.66, 0.0)?;
//! session.add_body(1.0, position_a, velocity_a);
//! session.add_body(0.8, position_b, velocity_b);
//! session.integrate_to(10.0)?;
//! let states = session.states();
//! ```

pub mod forces;
pub mod integrator;

mod session;
mod settings;

// Re-export main types
pub use forces::{CompositeForce, ForceModel, NewtonianGravity};
#[cfg(feature = "relativity")]
pub use forces::PostNewtonian;
pub use integrator::{DormandPrince54, Integrator, Leapfrog, RungeKutta4, StepController, StepResult};
pub use session::IntegratorSession;
pub use settings::{IntegratorType, NBodySettings};
