//! Stellar Dynamics - orbits of hierarchical multiple-star systems
//!
//! Computes barycentric positions and velocities of every star at requested
//! times, analytically or by N-body integration, with optional light travel
//! time correction and instantaneous Roche/Euler elements.

pub mod data;
pub mod propagation;

pub use data::{load_request, write_report, DynamicsReport};
pub use propagation::{DynamicsError, DynamicsOrchestrator, DynamicsOutput, DynamicsRequest};
