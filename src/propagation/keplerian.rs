//! Analytic Keplerian propagation of a hierarchical system
//!
//! Every orbit is an independent two-body problem between the barycenters of
//! its two children. Body states follow by superposing the relative orbits
//! down the tree, starting from a root barycenter at rest at the origin.

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::elements::{state_from_elements, OrbitalElements};
use super::error::DynamicsError;
use super::hierarchy::{Component, Hierarchy};
use super::ltte::BodyPropagator;
use super::state::BodyState;

/// Element set of one orbit as supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitParameters {
    pub sma: f64,
    pub ecc: f64,
    pub incl: f64,
    pub per0: f64,
    pub long_an: f64,
    pub mean_anom: f64,
}

/// Keplerian propagator for a whole hierarchy
///
/// Immutable after construction; every query is a pure function of time, so
/// a single instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct KeplerianPropagator {
    hierarchy: Hierarchy,
    elements: Vec<OrbitalElements>,
    masses: Vec<f64>,
    /// (primary subtree mass, secondary subtree mass) per orbit
    child_masses: Vec<(f64, f64)>,
    order: Vec<usize>,
}

impl KeplerianPropagator {
    /// Build the propagator from per-orbit parameters defined at `epoch`
    ///
    /// # Errors
    ///
    /// `InvalidInput` on length mismatches or non-positive masses,
    /// `InvalidOrbit` for unbound element sets.
    pub fn new(
        hierarchy: Hierarchy,
        masses: Vec<f64>,
        orbits: &[OrbitParameters],
        epoch: f64,
        gravitational_constant: f64,
    ) -> Result<Self, DynamicsError> {
        if masses.len() != hierarchy.n_bodies() {
            return Err(DynamicsError::invalid_input(format!(
                "hierarchy has {} bodies but {} masses were given",
                hierarchy.n_bodies(),
                masses.len()
            )));
        }
        if let Some((i, m)) = masses
            .iter()
            .enumerate()
            .find(|(_, m)| !(**m > 0.0) || !m.is_finite())
        {
            return Err(DynamicsError::invalid_input(format!(
                "mass of body {} must be positive, got {}",
                i, m
            )));
        }
        if orbits.len() != hierarchy.n_orbits() {
            return Err(DynamicsError::invalid_input(format!(
                "hierarchy has {} orbits but {} element sets were given",
                hierarchy.n_orbits(),
                orbits.len()
            )));
        }

        let child_masses: Vec<(f64, f64)> = hierarchy
            .orbits()
            .iter()
            .map(|node| {
                (
                    hierarchy.mass_of(node.primary, &masses),
                    hierarchy.mass_of(node.secondary, &masses),
                )
            })
            .collect();

        let elements = orbits
            .iter()
            .zip(&child_masses)
            .map(|(p, (m1, m2))| {
                OrbitalElements::new(
                    p.sma,
                    p.ecc,
                    p.incl,
                    p.per0,
                    p.long_an,
                    p.mean_anom,
                    epoch,
                    gravitational_constant * (m1 + m2),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (k, e) in elements.iter().enumerate() {
            log::debug!(
                "Orbit {}: a={} e={} P={} t0_perpass={}",
                k,
                e.sma,
                e.ecc,
                e.period,
                e.t0_perpass
            );
        }

        let order = hierarchy.orbits_top_down();

        Ok(Self {
            hierarchy,
            elements,
            masses,
            child_masses,
            order,
        })
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Element sets at the epoch, in orbit order
    pub fn elements(&self) -> &[OrbitalElements] {
        &self.elements
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Barycentric states of all bodies at `time`
    pub fn states_at(&self, time: f64) -> Vec<BodyState> {
        let mut states: Vec<BodyState> = self
            .masses
            .iter()
            .map(|&m| BodyState::new(Vector3::zeros(), Vector3::zeros(), m, time))
            .collect();
        let mut centers = vec![(Vector3::zeros(), Vector3::zeros()); self.elements.len()];

        for &k in &self.order {
            let (com_position, com_velocity) = centers[k];
            let (dr, dv) = state_from_elements(&self.elements[k], time);
            let (m1, m2) = self.child_masses[k];
            let total = m1 + m2;
            let node = self.hierarchy.orbit(k);

            let primary = (com_position - dr * (m2 / total), com_velocity - dv * (m2 / total));
            let secondary = (com_position + dr * (m1 / total), com_velocity + dv * (m1 / total));

            for (child, (position, velocity)) in [(node.primary, primary), (node.secondary, secondary)] {
                match child {
                    Component::Body(i) => {
                        states[i].position = position;
                        states[i].velocity = velocity;
                    }
                    Component::Orbit(j) => centers[j] = (position, velocity),
                }
            }
        }

        states
    }

    /// Barycentric states of all bodies at every time, evaluated in parallel
    ///
    /// Results follow the order of `times`; times may be unordered or repeated.
    pub fn states_at_times(&self, times: &[f64]) -> Vec<Vec<BodyState>> {
        times.par_iter().map(|&t| self.states_at(t)).collect()
    }
}

impl BodyPropagator for &KeplerianPropagator {
    fn body_state_at(&mut self, body: usize, time: f64) -> Result<BodyState, DynamicsError> {
        self.states_at(time).get(body).copied().ok_or_else(|| {
            DynamicsError::invalid_input(format!("no body with index {}", body))
        })
    }
}
