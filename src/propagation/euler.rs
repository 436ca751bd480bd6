//! Instantaneous Roche/Euler elements
//!
//! For mesh distortion every star needs the two-body orbit it currently
//! describes around its hierarchical partner: the mass-weighted barycenter of
//! the other child of the orbit the star belongs to. The elements are
//! osculating and recomputed from scratch at every output time.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::elements::{elements_from_state, wrap_angle};
use super::error::DynamicsError;
use super::hierarchy::Hierarchy;
use super::state::{barycenter, BodyState};

/// Instantaneous orbit and orientation of one body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerElements {
    /// Separation from the partner in units of the instantaneous sma
    pub d: f64,
    /// Synchronicity: instantaneous orbital period over rotation period
    pub f: f64,
    /// Longitude in orbit: true anomaly + per0 + π (rad)
    pub etheta: f64,
    /// Longitude of the ascending node (rad)
    pub elongan: f64,
    /// Inclination (rad)
    pub eincl: f64,
    pub period: f64,
    pub sma: f64,
    pub ecc: f64,
    pub per0: f64,
    pub long_an: f64,
    pub incl: f64,
    pub t0_perpass: f64,
}

/// Euler elements of one body at one instant
///
/// # Arguments
///
/// * `states` - Barycentric states of all bodies at `time`
/// * `rotation_period` - Rotation period of `body`, held fixed in frequency
///
/// # Errors
///
/// `InvalidInput` when `states` does not hold one state per body or `body`
/// is out of range; `InvalidOrbit` when the body is not bound to its partner.
pub fn euler_for_body(
    hierarchy: &Hierarchy,
    states: &[BodyState],
    rotation_period: f64,
    gravitational_constant: f64,
    body: usize,
    time: f64,
) -> Result<EulerElements, DynamicsError> {
    if states.len() != hierarchy.n_bodies() {
        return Err(DynamicsError::invalid_input(format!(
            "expected {} body states, got {}",
            hierarchy.n_bodies(),
            states.len()
        )));
    }
    if body >= states.len() {
        return Err(DynamicsError::invalid_input(format!("no body with index {}", body)));
    }

    let siblings = hierarchy.sibling_bodies(body);
    let partner = barycenter(siblings.iter().map(|&k| &states[k])).ok_or_else(|| {
        DynamicsError::invalid_input(format!("body {} has a massless partner", body))
    })?;

    let own = &states[body];
    let (position, velocity) = own.relative_to(&partner);
    let orbit = elements_from_state(
        &position,
        &velocity,
        own.mass + partner.mass,
        gravitational_constant,
        time,
    )?;

    Ok(EulerElements {
        d: position.norm() / orbit.sma,
        f: orbit.period / rotation_period,
        etheta: wrap_angle(orbit.true_anom + orbit.per0 + PI),
        elongan: orbit.long_an,
        eincl: orbit.incl,
        period: orbit.period,
        sma: orbit.sma,
        ecc: orbit.ecc,
        per0: orbit.per0,
        long_an: orbit.long_an,
        incl: orbit.incl,
        t0_perpass: orbit.t0_perpass,
    })
}

/// Euler elements of every body at one instant
///
/// # Errors
///
/// `InvalidInput` when rotation periods are missing, mismatched or not
/// positive; `InvalidOrbit` when a body is unbound from its partner.
pub fn compute_euler(
    hierarchy: &Hierarchy,
    states: &[BodyState],
    rotation_periods: &[f64],
    gravitational_constant: f64,
    time: f64,
) -> Result<Vec<EulerElements>, DynamicsError> {
    validate_rotation_periods(rotation_periods, hierarchy.n_bodies())?;

    (0..hierarchy.n_bodies())
        .map(|j| {
            euler_for_body(
                hierarchy,
                states,
                rotation_periods[j],
                gravitational_constant,
                j,
                time,
            )
        })
        .collect()
}

/// Check that there is one positive rotation period per body
pub fn validate_rotation_periods(rotation_periods: &[f64], n_bodies: usize) -> Result<(), DynamicsError> {
    if rotation_periods.len() != n_bodies {
        return Err(DynamicsError::invalid_input(format!(
            "Euler elements need one rotation period per body: expected {}, got {}",
            n_bodies,
            rotation_periods.len()
        )));
    }
    if let Some((i, p)) = rotation_periods
        .iter()
        .enumerate()
        .find(|(_, p)| !(**p > 0.0) || !p.is_finite())
    {
        return Err(DynamicsError::invalid_input(format!(
            "rotation period of body {} must be positive, got {}",
            i, p
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::elements::angle_difference;
    use crate::propagation::keplerian::{KeplerianPropagator, OrbitParameters};

    fn params(sma: f64, ecc: f64, incl: f64, long_an: f64) -> OrbitParameters {
        OrbitParameters {
            sma,
            ecc,
            incl,
            per0: 0.8,
            long_an,
            mean_anom: 1.9,
        }
    }

    #[test]
    fn test_binary_components_share_orbit() {
        let propagator = KeplerianPropagator::new(
            Hierarchy::jacobi(2).unwrap(),
            vec![2.0, 1.0],
            &[params(5.0, 0.0, 0.9, 1.3)],
            0.0,
            1.0,
        )
        .unwrap();
        let t = 3.7;
        let states = propagator.states_at(t);
        let euler = compute_euler(propagator.hierarchy(), &states, &[2.0, 4.0], 1.0, t).unwrap();

        let period = propagator.elements()[0].period;
        for e in &euler {
            assert!((e.d - 1.0).abs() < 1e-10, "circular orbit has d = 1");
            assert!((e.sma - 5.0).abs() < 1e-9);
            assert!((e.eincl - 0.9).abs() < 1e-10);
            assert!(angle_difference(e.elongan, 1.3).abs() < 1e-10);
            assert!((e.period - period).abs() / period < 1e-10);
        }
        assert!((euler[0].f - period / 2.0).abs() < 1e-8);
        assert!((euler[1].f - period / 4.0).abs() < 1e-8);

        // Components sit on opposite sides of the orbit
        assert!(angle_difference(euler[0].etheta, euler[1].etheta + PI).abs() < 1e-9);
    }

    #[test]
    fn test_outer_body_sees_inner_barycenter() {
        let propagator = KeplerianPropagator::new(
            Hierarchy::jacobi(3).unwrap(),
            vec![1.0, 0.7, 0.4],
            &[params(1.0, 0.1, 0.5, 0.2), params(12.0, 0.25, 0.6, 2.9)],
            0.0,
            1.0,
        )
        .unwrap();
        let states = propagator.states_at(8.0);
        let euler = euler_for_body(propagator.hierarchy(), &states, 1.0, 1.0, 2, 8.0).unwrap();

        assert!((euler.sma - 12.0).abs() < 1e-9);
        assert!((euler.ecc - 0.25).abs() < 1e-10);
        assert!((euler.incl - 0.6).abs() < 1e-10);
        assert!(angle_difference(euler.per0, 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rotation_periods() {
        let propagator = KeplerianPropagator::new(
            Hierarchy::jacobi(2).unwrap(),
            vec![1.0, 1.0],
            &[params(1.0, 0.0, 0.3, 0.0)],
            0.0,
            1.0,
        )
        .unwrap();
        let states = propagator.states_at(0.0);

        let err = compute_euler(propagator.hierarchy(), &states, &[1.0], 1.0, 0.0).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidInput { .. }));

        let err = compute_euler(propagator.hierarchy(), &states, &[1.0, -2.0], 1.0, 0.0).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidInput { .. }));
    }

    #[test]
    fn test_short_state_slice_is_rejected() {
        let propagator = KeplerianPropagator::new(
            Hierarchy::jacobi(3).unwrap(),
            vec![1.0, 0.7, 0.4],
            &[params(1.0, 0.1, 0.5, 0.2), params(12.0, 0.25, 0.6, 2.9)],
            0.0,
            1.0,
        )
        .unwrap();
        let states = propagator.states_at(0.0);

        // The outer body's partner needs both inner states
        let err = euler_for_body(propagator.hierarchy(), &states[..2], 1.0, 1.0, 2, 0.0).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidInput { .. }));

        let err = euler_for_body(propagator.hierarchy(), &states, 1.0, 1.0, 3, 0.0).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidInput { .. }));

        let err = compute_euler(propagator.hierarchy(), &states[..1], &[1.0; 3], 1.0, 0.0).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidInput { .. }));
    }
}
