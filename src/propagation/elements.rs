//! Classical orbital elements and their conversion to and from Cartesian state
//!
//! The inverse transform follows Vallado, "Fundamentals of Astrodynamics and
//! Applications" (2007), with explicit handling of the planar and circular
//! cases where the node vector or the eccentricity vector is undefined.
//!
//! # Angle conventions
//!
//! All angles are radians wrapped to [0, 2π). The z axis is the line of sight.
//! The longitude of the ascending node carries a fixed offset of π
//! ([`NODE_OFFSET`]) relative to the textbook definition: the forward
//! transform rotates by `long_an - π` and the inverse adds π back. The offset
//! is kept for compatibility with existing light-curve outputs. It is a frame
//! convention, not a verified physical requirement.

use std::f64::consts::{PI, TAU};

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use super::error::DynamicsError;

/// Inclination below which an orbit is treated as planar (rad)
///
/// A planar orbit has no node line, so the inverse transform reports
/// `long_an = 0` and measures per0 (or, when circular, the true anomaly)
/// from +x. The forward transform still rotates by `long_an - NODE_OFFSET`,
/// so an exactly face-on orbit given with `long_an = 0` comes back with that
/// angle shifted by π. Supplying `long_an = NODE_OFFSET` avoids the shift.
pub const PLANAR_TOLERANCE: f64 = 1e-12;

/// Eccentricity below which an orbit is treated as circular
///
/// Round-tripping an exactly circular orbit typically yields e ~ 1e-8, so the
/// circular branch must trigger well above zero.
pub const CIRCULAR_TOLERANCE: f64 = 1e-6;

/// Offset between the stored longitude of the ascending node and the
/// textbook node longitude (convention artifact, see module docs)
pub const NODE_OFFSET: f64 = PI;

const KEPLER_TOLERANCE: f64 = 1e-14;
const KEPLER_MAX_ITERATIONS: usize = 100;

/// Osculating two-body orbital elements of one orbit
///
/// `mean_anom` and `true_anom` refer to `epoch`; `t0_perpass` is the most
/// recent periastron passage at or before `epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (length units)
    pub sma: f64,
    /// Eccentricity, 0 <= e < 1
    pub ecc: f64,
    /// Inclination (rad)
    pub incl: f64,
    /// Argument of periastron (rad)
    pub per0: f64,
    /// Longitude of the ascending node (rad, includes [`NODE_OFFSET`])
    pub long_an: f64,
    /// Mean anomaly at `epoch` (rad)
    pub mean_anom: f64,
    /// True anomaly at `epoch` (rad)
    pub true_anom: f64,
    /// Time of periastron passage
    pub t0_perpass: f64,
    /// Orbital period from Kepler's third law
    pub period: f64,
    /// Reference time of the anomalies
    pub epoch: f64,
    /// Gravitational parameter G·(m1 + m2)
    pub mu: f64,
}

impl OrbitalElements {
    /// Validate and complete an element set given by its mean anomaly
    ///
    /// # Arguments
    ///
    /// * `mu` - Gravitational parameter G·(m1 + m2) of the orbit
    ///
    /// # Errors
    ///
    /// `InvalidOrbit` if the eccentricity is outside [0, 1) or the
    /// semi-major axis is not positive.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sma: f64,
        ecc: f64,
        incl: f64,
        per0: f64,
        long_an: f64,
        mean_anom: f64,
        epoch: f64,
        mu: f64,
    ) -> Result<Self, DynamicsError> {
        if !(0.0..1.0).contains(&ecc) || !(sma > 0.0) || !sma.is_finite() {
            return Err(DynamicsError::InvalidOrbit { eccentricity: ecc });
        }
        if !(mu > 0.0) {
            return Err(DynamicsError::invalid_input(format!(
                "gravitational parameter must be positive, got {}",
                mu
            )));
        }

        let period = kepler_period(sma, mu);
        let mean_anom = wrap_angle(mean_anom);

        Ok(Self {
            sma,
            ecc,
            incl,
            per0: wrap_angle(per0),
            long_an: wrap_angle(long_an),
            mean_anom,
            true_anom: true_from_mean(mean_anom, ecc),
            t0_perpass: epoch - mean_anom * period / TAU,
            period,
            epoch,
            mu,
        })
    }

    /// Mean motion 2π/P
    pub fn mean_motion(&self) -> f64 {
        TAU / self.period
    }

    /// The same orbit with its anomalies advanced (or rewound) to `time`
    pub fn at_time(&self, time: f64) -> Self {
        let mean_anom = wrap_angle(self.mean_anom + self.mean_motion() * (time - self.epoch));
        Self {
            mean_anom,
            true_anom: true_from_mean(mean_anom, self.ecc),
            t0_perpass: time - mean_anom * self.period / TAU,
            epoch: time,
            ..*self
        }
    }

    /// Rotation from the perifocal frame to the observer frame
    pub fn orientation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), self.long_an - NODE_OFFSET)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.incl)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.per0)
    }

    /// Position and velocity of the secondary relative to the primary at `epoch`
    pub fn relative_state(&self) -> (Vector3<f64>, Vector3<f64>) {
        let e = self.ecc;
        let a = self.sma;
        let ecc_anom = solve_kepler(self.mean_anom, e);
        let (sin_e, cos_e) = ecc_anom.sin_cos();
        let root = (1.0 - e * e).sqrt();

        let position = Vector3::new(a * (cos_e - e), a * root * sin_e, 0.0);
        let speed_factor = self.mean_motion() * a / (1.0 - e * cos_e);
        let velocity = Vector3::new(-speed_factor * sin_e, speed_factor * root * cos_e, 0.0);

        let rotation = self.orientation();
        (rotation * position, rotation * velocity)
    }
}

/// Relative state of an orbit's secondary with respect to its primary at `time`
pub fn state_from_elements(elements: &OrbitalElements, time: f64) -> (Vector3<f64>, Vector3<f64>) {
    elements.at_time(time).relative_state()
}

/// Orbital elements of a relative two-body state
///
/// # Arguments
///
/// * `position` - Position relative to the partner
/// * `velocity` - Velocity relative to the partner
/// * `total_mass` - Sum of both masses
/// * `gravitational_constant` - G in the caller's unit system
/// * `t_ref` - Time the state refers to
///
/// # Errors
///
/// `InvalidOrbit` for parabolic or hyperbolic (unbound) states.
pub fn elements_from_state(
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
    total_mass: f64,
    gravitational_constant: f64,
    t_ref: f64,
) -> Result<OrbitalElements, DynamicsError> {
    let mu = total_mass * gravitational_constant;
    if !(mu > 0.0) {
        return Err(DynamicsError::invalid_input(format!(
            "gravitational parameter must be positive, got {}",
            mu
        )));
    }

    let r = position.norm();
    let v = velocity.norm();

    let h_vec = position.cross(velocity);
    let h = h_vec.norm();
    let n_vec = Vector3::z().cross(&h_vec);
    let n = n_vec.norm();

    let r_dot_v = position.dot(velocity);
    let e_vec = ((v * v - mu / r) * position - r_dot_v * velocity) / mu;
    let e = e_vec.norm();

    let energy = 0.5 * v * v - mu / r;
    if !(e < 1.0) || !(energy < 0.0) {
        return Err(DynamicsError::InvalidOrbit { eccentricity: e });
    }
    let sma = -mu / (2.0 * energy);

    let incl = clamped_acos(h_vec.z / h);
    let planar = incl < PLANAR_TOLERANCE || PI - incl < PLANAR_TOLERANCE;
    let circular = e < CIRCULAR_TOLERANCE;

    let (long_an, per0, true_anom) = if planar {
        // No node line: measure everything from the x axis
        let per0 = if circular {
            0.0
        } else {
            let per0 = clamped_acos(e_vec.x / e);
            if e_vec.y * h_vec.z < 0.0 {
                TAU - per0
            } else {
                per0
            }
        };

        let true_anom = if circular {
            let true_anom = clamped_acos(position.x / r);
            if velocity.x > 0.0 {
                TAU - true_anom
            } else {
                true_anom
            }
        } else {
            anomaly_from_eccentricity_vector(&e_vec, e, position, r, r_dot_v)
        };

        (0.0, per0, true_anom)
    } else {
        let mut long_an = clamped_acos(n_vec.x / n);
        if n_vec.y < 0.0 {
            long_an = TAU - long_an;
        }
        long_an = wrap_angle(long_an + NODE_OFFSET);

        if circular {
            // Argument of latitude stands in for the true anomaly
            let true_anom = clamped_acos(n_vec.dot(position) / (n * r));
            let true_anom = if n_vec.dot(velocity) > 0.0 {
                TAU - true_anom
            } else {
                true_anom
            };
            (long_an, 0.0, true_anom)
        } else {
            let per0 = clamped_acos(n_vec.dot(&e_vec) / (n * e));
            let per0 = if e_vec.z < 0.0 { TAU - per0 } else { per0 };
            let true_anom = anomaly_from_eccentricity_vector(&e_vec, e, position, r, r_dot_v);
            (long_an, per0, true_anom)
        }
    };

    let true_anom = wrap_angle(true_anom);
    let period = kepler_period(sma, mu);
    let mean_anom = mean_from_true(true_anom, e);

    Ok(OrbitalElements {
        sma,
        ecc: e,
        incl,
        per0: wrap_angle(per0),
        long_an,
        mean_anom,
        true_anom,
        t0_perpass: t_ref - mean_anom * period / TAU,
        period,
        epoch: t_ref,
        mu,
    })
}

fn anomaly_from_eccentricity_vector(
    e_vec: &Vector3<f64>,
    e: f64,
    position: &Vector3<f64>,
    r: f64,
    r_dot_v: f64,
) -> f64 {
    let true_anom = clamped_acos(e_vec.dot(position) / (e * r));
    if r_dot_v < 0.0 {
        TAU - true_anom
    } else {
        true_anom
    }
}

/// Kepler's third law: P = 2π·sqrt(a³/μ)
pub fn kepler_period(sma: f64, mu: f64) -> f64 {
    TAU * (sma * sma * sma / mu).sqrt()
}

/// Solve Kepler's equation E - e·sin(E) = M for the eccentric anomaly
///
/// Newton's method safeguarded by the bracket [M - e, M + e], which always
/// contains the root because E - e·sin(E) is monotonic for e < 1. Steps that
/// would leave the bracket fall back to bisection, so the iteration converges
/// for every e in [0, 1).
pub fn solve_kepler(mean_anom: f64, ecc: f64) -> f64 {
    let m = wrap_angle(mean_anom);
    if ecc == 0.0 {
        return m;
    }

    let mut lo = m - ecc;
    let mut hi = m + ecc;
    let mut ecc_anom = if ecc < 0.8 { m + ecc * m.sin() } else { PI };
    ecc_anom = ecc_anom.clamp(lo, hi);

    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = ecc_anom - ecc * ecc_anom.sin() - m;
        if f == 0.0 {
            break;
        }
        if f > 0.0 {
            hi = ecc_anom;
        } else {
            lo = ecc_anom;
        }

        let fp = 1.0 - ecc * ecc_anom.cos();
        let newton = ecc_anom - f / fp;
        let next = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };

        let delta = (next - ecc_anom).abs();
        ecc_anom = next;
        if delta < KEPLER_TOLERANCE || hi - lo < KEPLER_TOLERANCE {
            break;
        }
    }

    ecc_anom
}

pub fn true_from_eccentric(ecc_anom: f64, ecc: f64) -> f64 {
    let (s, c) = (0.5 * ecc_anom).sin_cos();
    wrap_angle(2.0 * ((1.0 + ecc).sqrt() * s).atan2((1.0 - ecc).sqrt() * c))
}

pub fn eccentric_from_true(true_anom: f64, ecc: f64) -> f64 {
    let (s, c) = (0.5 * true_anom).sin_cos();
    wrap_angle(2.0 * ((1.0 - ecc).sqrt() * s).atan2((1.0 + ecc).sqrt() * c))
}

pub fn true_from_mean(mean_anom: f64, ecc: f64) -> f64 {
    true_from_eccentric(solve_kepler(mean_anom, ecc), ecc)
}

pub fn mean_from_true(true_anom: f64, ecc: f64) -> f64 {
    let ecc_anom = eccentric_from_true(true_anom, ecc);
    wrap_angle(ecc_anom - ecc * ecc_anom.sin())
}

/// Wrap an angle into [0, 2π)
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly 2π
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Signed difference a - b folded into (-π, π]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let diff = wrap_angle(a - b);
    if diff > PI {
        diff - TAU
    } else {
        diff
    }
}

fn clamped_acos(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos()
}
