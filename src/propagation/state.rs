//! Cartesian body and system state representations
//!
//! Provides the state vectors shared by the Keplerian propagator, the N-body
//! integrator and the Euler element computer. Positions and velocities are
//! barycentric, in whatever length/time units the caller chose; the z axis
//! is the line of sight.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Cartesian state of a single body at a single time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    /// Position (length units)
    pub position: Vector3<f64>,

    /// Velocity (length units per time unit)
    pub velocity: Vector3<f64>,

    /// Mass in gravitational-parameter-consistent units
    pub mass: f64,

    /// Time this state refers to
    pub time: f64,
}

impl BodyState {
    /// Create a new body state
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, mass: f64, time: f64) -> Self {
        Self {
            position,
            velocity,
            mass,
            time,
        }
    }

    /// Line-of-sight coordinate
    pub fn z(&self) -> f64 {
        self.position.z
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn momentum(&self) -> Vector3<f64> {
        self.velocity * self.mass
    }

    /// Position and velocity of `self` relative to `other`
    pub fn relative_to(&self, other: &BodyState) -> (Vector3<f64>, Vector3<f64>) {
        (
            self.position - other.position,
            self.velocity - other.velocity,
        )
    }
}

/// Mass-weighted center of a group of bodies
///
/// The returned state carries the summed mass. Returns `None` for an empty
/// group or one with no mass.
pub fn barycenter<'a>(bodies: impl IntoIterator<Item = &'a BodyState>) -> Option<BodyState> {
    let mut mass = 0.0;
    let mut position = Vector3::zeros();
    let mut velocity = Vector3::zeros();
    let mut time = 0.0;

    for body in bodies {
        mass += body.mass;
        position += body.position * body.mass;
        velocity += body.velocity * body.mass;
        time = body.time;
    }

    if mass <= 0.0 {
        return None;
    }

    Some(BodyState::new(position / mass, velocity / mass, mass, time))
}

/// Complete state of an N-body system at a given time
#[derive(Debug, Clone, Default)]
pub struct SystemState {
    /// Current simulation time
    pub time: f64,

    /// Bodies in input order
    pub bodies: Vec<BodyState>,
}

impl SystemState {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            bodies: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(|b| b.mass).sum()
    }

    /// Total linear momentum (zero for a barycentric system at rest)
    pub fn total_momentum(&self) -> Vector3<f64> {
        self.bodies
            .iter()
            .map(|b| b.momentum())
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }

    /// Total Newtonian energy (kinetic + pairwise potential)
    pub fn total_energy(&self, gravitational_constant: f64) -> f64 {
        let kinetic: f64 = self
            .bodies
            .iter()
            .map(|b| 0.5 * b.mass * b.velocity.norm_squared())
            .sum();

        let mut potential = 0.0;
        for (i, bi) in self.bodies.iter().enumerate() {
            for bj in &self.bodies[i + 1..] {
                let r = (bj.position - bi.position).norm();
                potential -= gravitational_constant * bi.mass * bj.mass / r;
            }
        }

        kinetic + potential
    }

    /// Copy of the state with every body stamped with the system time
    pub fn snapshot(&self) -> Vec<BodyState> {
        self.bodies
            .iter()
            .map(|b| BodyState { time: self.time, ..*b })
            .collect()
    }
}

// Physical constants
/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Nominal solar radius in km (IAU 2015 B3)
pub const SOLAR_RADIUS_KM: f64 = 695_700.0;

/// Nominal solar gravitational parameter in km³/s² (IAU 2015 B3)
pub const SOLAR_GM_KM3_S2: f64 = 1.327_124_4e11;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Speed of light in solar radii per day
pub const SPEED_OF_LIGHT_SOLRAD_PER_DAY: f64 =
    SPEED_OF_LIGHT_KM_S * SECONDS_PER_DAY / SOLAR_RADIUS_KM;

/// Gravitational constant in R☉³ / (M☉ d²)
pub const G_SOLRAD3_PER_MSUN_DAY2: f64 = SOLAR_GM_KM3_S2 * SECONDS_PER_DAY * SECONDS_PER_DAY
    / (SOLAR_RADIUS_KM * SOLAR_RADIUS_KM * SOLAR_RADIUS_KM);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barycenter_weights_by_mass() {
        let a = BodyState::new(Vector3::new(-1.0, 0.0, 0.0), Vector3::new(0.0, -2.0, 0.0), 2.0, 0.0);
        let b = BodyState::new(Vector3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 0.0), 1.0, 0.0);

        let com = barycenter([&a, &b]).unwrap();
        assert!((com.mass - 3.0).abs() < 1e-15);
        assert!(com.position.norm() < 1e-15);
        assert!(com.velocity.norm() < 1e-15);
    }

    #[test]
    fn test_barycenter_empty_is_none() {
        assert!(barycenter(std::iter::empty()).is_none());
    }

    #[test]
    fn test_solar_unit_constants() {
        // c ≈ 37231.7 R☉/d, G ≈ 2942.2 R☉³/(M☉ d²)
        assert!((SPEED_OF_LIGHT_SOLRAD_PER_DAY - 37_231.66).abs() < 0.1);
        assert!((G_SOLRAD3_PER_MSUN_DAY2 - 2942.2).abs() < 1.0);
    }

    #[test]
    fn test_energy_of_circular_binary() {
        // Equal masses m=1 at separation 2, circular: v = sqrt(G m_tot / r) / 2 each
        let g = 1.0;
        let v = (g * 2.0 / 2.0_f64).sqrt() / 2.0;
        let mut system = SystemState::new(0.0);
        system.bodies.push(BodyState::new(Vector3::new(-1.0, 0.0, 0.0), Vector3::new(0.0, -v, 0.0), 1.0, 0.0));
        system.bodies.push(BodyState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, v, 0.0), 1.0, 0.0));

        // E = -G m1 m2 / (2a) with a = 2
        let energy = system.total_energy(g);
        assert!((energy + 0.25).abs() < 1e-12, "energy = {}", energy);
        assert!(system.total_momentum().norm() < 1e-15);
    }
}
