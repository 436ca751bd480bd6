//! Numerical integrators for N-body propagation
//!
//! Integrators advance a whole [`SystemState`] given a function that returns
//! the acceleration of every body. Velocities come from the state itself.
//!
//! # Available Integrators
//!
//! - **DormandPrince54**: Embedded Runge-Kutta 5(4) with adaptive stepping (default)
//! - **RungeKutta4**: Classic RK4 with step doubling and Richardson extrapolation
//! - **Leapfrog**: Fixed-step kick-drift-kick, symplectic and time reversible

use nalgebra::Vector3;

use crate::propagation::state::SystemState;

/// Result of a single integration step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New state after the step
    pub state: SystemState,

    /// Actual step size used (signed, may be shorter than requested)
    pub dt_used: f64,

    /// Suggested size of the next step (signed)
    pub dt_next: f64,

    /// Scaled local error estimate, 1.0 being the tolerance (if available)
    pub error_estimate: Option<f64>,

    /// Whether step was successful
    pub success: bool,
}

/// Trait for numerical integrators
///
/// Implementations must be `Send + Sync` so a session can be cloned and
/// driven from another thread.
pub trait Integrator: Send + Sync {
    /// Take a single fixed step
    fn step(
        &self,
        state: &SystemState,
        dt: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> SystemState;

    /// Take a step with error control
    ///
    /// The step actually taken may be shorter than `dt_suggested`; it is
    /// never longer.
    fn adaptive_step(
        &self,
        state: &SystemState,
        dt_suggested: f64,
        tolerance: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> StepResult;

    /// Integrator name
    fn name(&self) -> &'static str;

    /// Integrator order
    fn order(&self) -> u8;

    /// Number of acceleration evaluations per step
    fn stages(&self) -> usize;
}

/// Step-size controller: h_new = safety · h · error^(-exponent)
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    /// Exponent = 1/(order + 1)
    pub exponent: f64,
    /// Consecutive rejections tolerated before a step fails
    pub max_rejections: usize,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 0.2,
            max_rejections: 64,
        }
    }
}

impl StepController {
    /// Step size adjustment factor for a scaled error (1.0 = at tolerance)
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        if !error.is_finite() {
            return self.min_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Time derivative of every body: (velocity, acceleration)
struct Slope {
    velocity: Vec<Vector3<f64>>,
    acceleration: Vec<Vector3<f64>>,
}

impl Slope {
    fn at(state: &SystemState, accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>) -> Self {
        Self {
            velocity: state.bodies.iter().map(|b| b.velocity).collect(),
            acceleration: accelerations(state),
        }
    }
}

/// state + dt · Σ w_i k_i, stamped at state.time + c · dt
fn combine(state: &SystemState, dt: f64, c: f64, terms: &[(f64, &Slope)]) -> SystemState {
    let mut next = state.clone();
    next.time = state.time + c * dt;

    for (i, body) in next.bodies.iter_mut().enumerate() {
        for (weight, slope) in terms {
            if *weight == 0.0 {
                continue;
            }
            body.position += slope.velocity[i] * (weight * dt);
            body.velocity += slope.acceleration[i] * (weight * dt);
        }
        body.time = next.time;
    }

    next
}

/// Largest per-body difference, scaled by tolerance · (1 + |y|)
fn scaled_error(reference: &SystemState, other: &SystemState, tolerance: f64) -> f64 {
    reference
        .bodies
        .iter()
        .zip(&other.bodies)
        .map(|(a, b)| {
            let position = (a.position - b.position).norm() / (tolerance * (1.0 + a.position.norm()));
            let velocity = (a.velocity - b.velocity).norm() / (tolerance * (1.0 + a.velocity.norm()));
            position.max(velocity)
        })
        .fold(0.0, f64::max)
}

fn failed_step(state: &SystemState, dt: f64, error: f64) -> StepResult {
    StepResult {
        state: state.clone(),
        dt_used: 0.0,
        dt_next: dt,
        error_estimate: Some(error),
        success: false,
    }
}

/// Runge-Kutta 4 integrator with adaptive stepping via step doubling
#[derive(Debug, Clone, Default)]
pub struct RungeKutta4 {
    pub controller: StepController,
}

impl RungeKutta4 {
    pub fn new() -> Self {
        Self::default()
    }

    fn rk4_step(
        &self,
        state: &SystemState,
        dt: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> SystemState {
        let k1 = Slope::at(state, accelerations);
        let k2 = Slope::at(&combine(state, dt, 0.5, &[(0.5, &k1)]), accelerations);
        let k3 = Slope::at(&combine(state, dt, 0.5, &[(0.5, &k2)]), accelerations);
        let k4 = Slope::at(&combine(state, dt, 1.0, &[(1.0, &k3)]), accelerations);

        combine(
            state,
            dt,
            1.0,
            &[
                (1.0 / 6.0, &k1),
                (1.0 / 3.0, &k2),
                (1.0 / 3.0, &k3),
                (1.0 / 6.0, &k4),
            ],
        )
    }
}

impl Integrator for RungeKutta4 {
    fn step(
        &self,
        state: &SystemState,
        dt: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> SystemState {
        self.rk4_step(state, dt, accelerations)
    }

    fn adaptive_step(
        &self,
        state: &SystemState,
        dt_suggested: f64,
        tolerance: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> StepResult {
        let mut h = dt_suggested;
        let mut error = f64::INFINITY;

        for _ in 0..=self.controller.max_rejections {
            // One full step against two half steps
            let y_full = self.rk4_step(state, h, accelerations);
            let y_half1 = self.rk4_step(state, h / 2.0, accelerations);
            let y_half2 = self.rk4_step(&y_half1, h / 2.0, accelerations);

            error = scaled_error(&y_half2, &y_full, tolerance);
            let factor = self.controller.compute_factor(error);

            if error <= 1.0 {
                // Richardson extrapolation of the fine solution
                let mut extrapolated = y_half2.clone();
                for (body, coarse) in extrapolated.bodies.iter_mut().zip(&y_full.bodies) {
                    body.position = (16.0 * body.position - coarse.position) / 15.0;
                    body.velocity = (16.0 * body.velocity - coarse.velocity) / 15.0;
                }

                return StepResult {
                    state: extrapolated,
                    dt_used: h,
                    dt_next: h * factor,
                    error_estimate: Some(error),
                    success: true,
                };
            }

            h *= factor.min(1.0);
        }

        failed_step(state, h, error)
    }

    fn name(&self) -> &'static str {
        "rk4"
    }

    fn order(&self) -> u8 {
        4
    }

    fn stages(&self) -> usize {
        12
    }
}

// Dormand-Prince 5(4) tableau
const DP_C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const DP_A2: [f64; 1] = [1.0 / 5.0];
const DP_A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const DP_A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const DP_A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const DP_A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
/// Fifth-order weights (also the seventh stage row)
const DP_B5: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
/// Embedded fourth-order weights
const DP_B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

/// Dormand-Prince 5(4) embedded Runge-Kutta integrator
#[derive(Debug, Clone, Default)]
pub struct DormandPrince54 {
    pub controller: StepController,
}

impl DormandPrince54 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fifth-order solution and embedded fourth-order solution
    fn embedded_pair(
        &self,
        state: &SystemState,
        h: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> (SystemState, SystemState) {
        let k1 = Slope::at(state, accelerations);
        let k2 = Slope::at(&combine(state, h, DP_C[1], &[(DP_A2[0], &k1)]), accelerations);
        let k3 = Slope::at(
            &combine(state, h, DP_C[2], &[(DP_A3[0], &k1), (DP_A3[1], &k2)]),
            accelerations,
        );
        let k4 = Slope::at(
            &combine(
                state,
                h,
                DP_C[3],
                &[(DP_A4[0], &k1), (DP_A4[1], &k2), (DP_A4[2], &k3)],
            ),
            accelerations,
        );
        let k5 = Slope::at(
            &combine(
                state,
                h,
                DP_C[4],
                &[(DP_A5[0], &k1), (DP_A5[1], &k2), (DP_A5[2], &k3), (DP_A5[3], &k4)],
            ),
            accelerations,
        );
        let k6 = Slope::at(
            &combine(
                state,
                h,
                DP_C[5],
                &[
                    (DP_A6[0], &k1),
                    (DP_A6[1], &k2),
                    (DP_A6[2], &k3),
                    (DP_A6[3], &k4),
                    (DP_A6[4], &k5),
                ],
            ),
            accelerations,
        );

        let ks = [&k1, &k2, &k3, &k4, &k5, &k6];
        let fifth_terms: Vec<(f64, &Slope)> = DP_B5.iter().copied().zip(ks).collect();
        let fifth = combine(state, h, DP_C[6], &fifth_terms);

        let k7 = Slope::at(&fifth, accelerations);
        let fourth_terms: Vec<(f64, &Slope)> = DP_B4
            .iter()
            .copied()
            .zip(ks.into_iter().chain(std::iter::once(&k7)))
            .collect();
        let fourth = combine(state, h, DP_C[6], &fourth_terms);

        (fifth, fourth)
    }
}

impl Integrator for DormandPrince54 {
    fn step(
        &self,
        state: &SystemState,
        dt: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> SystemState {
        self.embedded_pair(state, dt, accelerations).0
    }

    fn adaptive_step(
        &self,
        state: &SystemState,
        dt_suggested: f64,
        tolerance: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> StepResult {
        let mut h = dt_suggested;
        let mut error = f64::INFINITY;

        for _ in 0..=self.controller.max_rejections {
            let (fifth, fourth) = self.embedded_pair(state, h, accelerations);
            error = scaled_error(&fifth, &fourth, tolerance);
            let factor = self.controller.compute_factor(error);

            if error <= 1.0 {
                return StepResult {
                    state: fifth,
                    dt_used: h,
                    dt_next: h * factor,
                    error_estimate: Some(error),
                    success: true,
                };
            }

            h *= factor.min(1.0);
        }

        failed_step(state, h, error)
    }

    fn name(&self) -> &'static str {
        "dopri5"
    }

    fn order(&self) -> u8 {
        5
    }

    fn stages(&self) -> usize {
        7
    }
}

/// Kick-drift-kick leapfrog
///
/// Second order and symplectic, so energy errors stay bounded instead of
/// drifting. Always takes exactly the step it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl Integrator for Leapfrog {
    fn step(
        &self,
        state: &SystemState,
        dt: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> SystemState {
        let mut next = state.clone();
        next.time = state.time + dt;

        let a0 = accelerations(state);
        for (body, a) in next.bodies.iter_mut().zip(&a0) {
            body.velocity += a * (0.5 * dt);
            body.position += body.velocity * dt;
            body.time = next.time;
        }

        let a1 = accelerations(&next);
        for (body, a) in next.bodies.iter_mut().zip(&a1) {
            body.velocity += a * (0.5 * dt);
        }

        next
    }

    fn adaptive_step(
        &self,
        state: &SystemState,
        dt_suggested: f64,
        _tolerance: f64,
        accelerations: &dyn Fn(&SystemState) -> Vec<Vector3<f64>>,
    ) -> StepResult {
        StepResult {
            state: self.step(state, dt_suggested, accelerations),
            dt_used: dt_suggested,
            dt_next: dt_suggested,
            error_estimate: None,
            success: true,
        }
    }

    fn name(&self) -> &'static str {
        "leapfrog"
    }

    fn order(&self) -> u8 {
        2
    }

    fn stages(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::state::BodyState;
    use std::f64::consts::PI;

    /// Equal-mass circular binary, G = 1, separation 2, period 4π
    fn circular_binary() -> SystemState {
        let mut state = SystemState::new(0.0);
        state.bodies.push(BodyState::new(
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -0.5, 0.0),
            1.0,
            0.0,
        ));
        state.bodies.push(BodyState::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
            1.0,
            0.0,
        ));
        state
    }

    fn point_mass(state: &SystemState) -> Vec<Vector3<f64>> {
        let mut out = vec![Vector3::zeros(); state.bodies.len()];
        for (i, bi) in state.bodies.iter().enumerate() {
            for (j, bj) in state.bodies.iter().enumerate() {
                if i != j {
                    let d = bj.position - bi.position;
                    out[i] += d * (bj.mass / d.norm().powi(3));
                }
            }
        }
        out
    }

    fn run_adaptive(integrator: &dyn Integrator, duration: f64, tolerance: f64) -> SystemState {
        let mut state = circular_binary();
        let mut h: f64 = 0.1;
        while state.time < duration {
            let dt = h.min(duration - state.time);
            let result = integrator.adaptive_step(&state, dt, tolerance, &point_mass);
            assert!(result.success);
            state = result.state;
            h = result.dt_next;
        }
        state
    }

    #[test]
    fn test_rk4_circular_orbit() {
        let integrator = RungeKutta4::new();
        let state = circular_binary();
        let next = integrator.step(&state, 0.01, &point_mass);

        // Radius and speed preserved on a circular orbit
        assert!((next.bodies[1].position.norm() - 1.0).abs() < 1e-8);
        assert!((next.bodies[1].velocity.norm() - 0.5).abs() < 1e-8);
        assert!((next.time - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_dopri5_full_period_returns_home() {
        let state = run_adaptive(&DormandPrince54::new(), 4.0 * PI, 1e-10);
        let start = circular_binary();
        let drift = (state.bodies[1].position - start.bodies[1].position).norm();
        assert!(drift < 1e-6, "drift after one period = {}", drift);
        assert!((state.total_energy(1.0) + 0.25).abs() < 1e-8);
    }

    #[test]
    fn test_rk4_adaptive_conserves_energy() {
        let state = run_adaptive(&RungeKutta4::new(), 4.0 * PI, 1e-10);
        assert!((state.total_energy(1.0) + 0.25).abs() < 1e-8);
    }

    #[test]
    fn test_oversized_step_is_shortened() {
        let integrator = DormandPrince54::new();
        let state = circular_binary();
        let result = integrator.adaptive_step(&state, 5.0, 1e-10, &point_mass);

        assert!(result.success);
        assert!(result.dt_used < 5.0);
        assert!(result.dt_used > 0.0);
        assert!(result.error_estimate.unwrap() <= 1.0);
    }

    #[test]
    fn test_backward_step() {
        let integrator = DormandPrince54::new();
        let state = circular_binary();
        let result = integrator.adaptive_step(&state, -0.1, 1e-10, &point_mass);
        assert!(result.success);
        assert!(result.dt_used < 0.0);
        assert!((result.state.time - result.dt_used).abs() < 1e-15);
    }

    #[test]
    fn test_leapfrog_is_time_reversible() {
        let integrator = Leapfrog;
        let start = circular_binary();
        let mut state = start.clone();
        for _ in 0..100 {
            state = integrator.step(&state, 0.01, &point_mass);
        }
        for _ in 0..100 {
            state = integrator.step(&state, -0.01, &point_mass);
        }

        assert!((state.bodies[0].position - start.bodies[0].position).norm() < 1e-10);
        assert!((state.bodies[0].velocity - start.bodies[0].velocity).norm() < 1e-10);
    }

    #[test]
    fn test_leapfrog_energy_bounded() {
        let integrator = Leapfrog;
        let mut state = circular_binary();
        for _ in 0..2000 {
            state = integrator.step(&state, 0.01, &point_mass);
        }
        assert!((state.total_energy(1.0) + 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_step_controller_limits() {
        let controller = StepController::default();
        assert_eq!(controller.compute_factor(0.0), 5.0);
        assert_eq!(controller.compute_factor(1e12), 0.2);
        assert_eq!(controller.compute_factor(f64::NAN), 0.2);
        assert!((controller.compute_factor(1.0) - 0.9).abs() < 1e-15);
    }

    #[test]
    fn test_integrator_metadata() {
        assert_eq!(DormandPrince54::new().order(), 5);
        assert_eq!(RungeKutta4::new().order(), 4);
        assert_eq!(Leapfrog.order(), 2);
        assert_eq!(DormandPrince54::new().name(), "dopri5");
    }
}
