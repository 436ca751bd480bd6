//! Top-level dynamics entry point
//!
//! A [`DynamicsRequest`] describes one run: masses, one element set per
//! orbit of the hierarchy, the output times and the optional corrections.
//! [`DynamicsOrchestrator`] validates the whole request up front, then
//! produces the per-body time series either analytically (Keplerian mode,
//! parallel over times) or by N-body integration (sequential).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::DynamicsError;
use super::euler::{compute_euler, validate_rotation_periods, EulerElements};
use super::hierarchy::{Hierarchy, OrbitNode};
use super::keplerian::{KeplerianPropagator, OrbitParameters};
use super::ltte::LightTravelTime;
use super::nbody::{IntegratorSession, NBodySettings};
use super::state::{BodyState, G_SOLRAD3_PER_MSUN_DAY2, SPEED_OF_LIGHT_SOLRAD_PER_DAY};

/// Times evaluated per parallel batch between progress reports
const KEPLERIAN_BATCH: usize = 256;

/// Fixed steps per shortest orbit below which leapfrog output is unreliable
const LEAPFROG_STEPS_PER_ORBIT: f64 = 100.0;

fn default_gravitational_constant() -> f64 {
    1.0
}

fn default_speed_of_light() -> f64 {
    SPEED_OF_LIGHT_SOLRAD_PER_DAY
}

fn default_ltte_tolerance() -> f64 {
    LightTravelTime::DEFAULT_TOLERANCE
}

fn default_ltte_max_iterations() -> usize {
    LightTravelTime::DEFAULT_MAX_ITERATIONS
}

/// How body states are propagated
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationMode {
    /// Analytic superposition of two-body orbits
    #[default]
    Keplerian,
    /// Numerical integration of the full system
    Nbody(NBodySettings),
}

/// Input of one dynamics run
///
/// Element arrays hold one entry per orbit, in hierarchy orbit order. With
/// the default `gravitational_constant` of 1 the masses are gravitational
/// parameters in the caller's length and time units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsRequest {
    pub masses: Vec<f64>,
    #[serde(default)]
    pub rotation_periods: Option<Vec<f64>>,
    pub smas: Vec<f64>,
    pub eccs: Vec<f64>,
    pub incls: Vec<f64>,
    pub per0s: Vec<f64>,
    pub long_ans: Vec<f64>,
    pub mean_anoms: Vec<f64>,
    /// Explicit hierarchy; the flat Jacobi hierarchy when absent
    #[serde(default)]
    pub hierarchy: Option<Vec<OrbitNode>>,
    /// Epoch of the element sets
    #[serde(default)]
    pub t0: f64,
    pub times: Vec<f64>,
    #[serde(default)]
    pub ltte: bool,
    #[serde(default)]
    pub return_roche_euler: bool,
    #[serde(default = "default_gravitational_constant")]
    pub gravitational_constant: f64,
    #[serde(default = "default_speed_of_light")]
    pub speed_of_light: f64,
    #[serde(default = "default_ltte_tolerance")]
    pub ltte_tolerance: f64,
    #[serde(default = "default_ltte_max_iterations")]
    pub ltte_max_iterations: usize,
    #[serde(default)]
    pub mode: PropagationMode,
}

impl DynamicsRequest {
    /// Keplerian request over a Jacobi hierarchy with no corrections
    pub fn new(masses: Vec<f64>, orbits: &[OrbitParameters], times: Vec<f64>) -> Self {
        Self {
            masses,
            rotation_periods: None,
            smas: orbits.iter().map(|o| o.sma).collect(),
            eccs: orbits.iter().map(|o| o.ecc).collect(),
            incls: orbits.iter().map(|o| o.incl).collect(),
            per0s: orbits.iter().map(|o| o.per0).collect(),
            long_ans: orbits.iter().map(|o| o.long_an).collect(),
            mean_anoms: orbits.iter().map(|o| o.mean_anom).collect(),
            hierarchy: None,
            t0: 0.0,
            times,
            ltte: false,
            return_roche_euler: false,
            gravitational_constant: default_gravitational_constant(),
            speed_of_light: default_speed_of_light(),
            ltte_tolerance: default_ltte_tolerance(),
            ltte_max_iterations: default_ltte_max_iterations(),
            mode: PropagationMode::Keplerian,
        }
    }

    pub fn with_mode(mut self, mode: PropagationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ltte(mut self, speed_of_light: f64) -> Self {
        self.ltte = true;
        self.speed_of_light = speed_of_light;
        self
    }

    pub fn with_roche_euler(mut self, rotation_periods: Vec<f64>) -> Self {
        self.return_roche_euler = true;
        self.rotation_periods = Some(rotation_periods);
        self
    }

    pub fn with_hierarchy(mut self, orbits: Vec<OrbitNode>) -> Self {
        self.hierarchy = Some(orbits);
        self
    }

    /// Interpret masses in M☉, lengths in R☉ and times in days
    pub fn with_solar_units(mut self) -> Self {
        self.gravitational_constant = G_SOLRAD3_PER_MSUN_DAY2;
        self.speed_of_light = SPEED_OF_LIGHT_SOLRAD_PER_DAY;
        self
    }

    /// Zip the element arrays into per-orbit parameters
    fn orbit_parameters(&self) -> Result<Vec<OrbitParameters>, DynamicsError> {
        let n_orbits = self.masses.len().saturating_sub(1);
        let arrays = [
            ("smas", &self.smas),
            ("eccs", &self.eccs),
            ("incls", &self.incls),
            ("per0s", &self.per0s),
            ("long_ans", &self.long_ans),
            ("mean_anoms", &self.mean_anoms),
        ];
        for (name, values) in arrays {
            if values.len() != n_orbits {
                return Err(DynamicsError::invalid_input(format!(
                    "{} bodies need {} entries in {}, got {}",
                    self.masses.len(),
                    n_orbits,
                    name,
                    values.len()
                )));
            }
        }

        Ok((0..n_orbits)
            .map(|k| OrbitParameters {
                sma: self.smas[k],
                ecc: self.eccs[k],
                incl: self.incls[k],
                per0: self.per0s[k],
                long_an: self.long_ans[k],
                mean_anom: self.mean_anoms[k],
            })
            .collect())
    }
}

/// Euler element time series of one body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerSeries {
    pub ds: Vec<f64>,
    pub fs: Vec<f64>,
    pub ethetas: Vec<f64>,
    pub elongans: Vec<f64>,
    pub eincls: Vec<f64>,
    pub periods: Vec<f64>,
    pub smas: Vec<f64>,
    pub eccs: Vec<f64>,
    pub per0s: Vec<f64>,
    pub long_ans: Vec<f64>,
    pub incls: Vec<f64>,
    pub t0_perpasses: Vec<f64>,
}

impl EulerSeries {
    fn push(&mut self, e: &EulerElements) {
        self.ds.push(e.d);
        self.fs.push(e.f);
        self.ethetas.push(e.etheta);
        self.elongans.push(e.elongan);
        self.eincls.push(e.eincl);
        self.periods.push(e.period);
        self.smas.push(e.sma);
        self.eccs.push(e.ecc);
        self.per0s.push(e.per0);
        self.long_ans.push(e.long_an);
        self.incls.push(e.incl);
        self.t0_perpasses.push(e.t0_perpass);
    }
}

/// Cartesian time series of one body, aligned with the requested times
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodySeries {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub zs: Vec<f64>,
    pub vxs: Vec<f64>,
    pub vys: Vec<f64>,
    pub vzs: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub euler: Option<EulerSeries>,
}

impl BodySeries {
    fn push(&mut self, state: &BodyState) {
        self.xs.push(state.position.x);
        self.ys.push(state.position.y);
        self.zs.push(state.position.z);
        self.vxs.push(state.velocity.x);
        self.vys.push(state.velocity.y);
        self.vzs.push(state.velocity.z);
    }
}

/// Result of one dynamics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsOutput {
    pub times: Vec<f64>,
    pub bodies: Vec<BodySeries>,
}

impl DynamicsOutput {
    fn with_capacity(times: Vec<f64>, n_bodies: usize, euler: bool) -> Self {
        let bodies = (0..n_bodies)
            .map(|_| BodySeries {
                euler: euler.then(EulerSeries::default),
                ..Default::default()
            })
            .collect();
        Self { times, bodies }
    }

    /// Append one output time: states (after LTTE) and optional Euler elements
    fn push_row(&mut self, states: &[BodyState], euler: Option<&[EulerElements]>) {
        for (j, (series, state)) in self.bodies.iter_mut().zip(states).enumerate() {
            series.push(state);
            if let (Some(target), Some(row)) = (series.euler.as_mut(), euler) {
                target.push(&row[j]);
            }
        }
    }
}

/// Validated dynamics run
#[derive(Debug, Clone)]
pub struct DynamicsOrchestrator {
    request: DynamicsRequest,
    propagator: KeplerianPropagator,
    ltte: Option<LightTravelTime>,
}

impl DynamicsOrchestrator {
    /// Validate a request
    ///
    /// Every check that can fail happens here, before any propagation, so a
    /// run either completes or produces nothing.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `InvalidOrbit`, `UnsupportedConfiguration` or
    /// `SequenceOrder` as described on [`DynamicsError`].
    pub fn new(request: DynamicsRequest) -> Result<Self, DynamicsError> {
        let n_bodies = request.masses.len();
        let orbits = request.orbit_parameters()?;

        if !(request.gravitational_constant > 0.0) || !request.gravitational_constant.is_finite() {
            return Err(DynamicsError::invalid_input(format!(
                "gravitational constant must be positive, got {}",
                request.gravitational_constant
            )));
        }
        if let Some((i, t)) = request
            .times
            .iter()
            .chain(std::iter::once(&request.t0))
            .enumerate()
            .find(|(_, t)| !t.is_finite())
        {
            return Err(DynamicsError::invalid_input(format!(
                "time {} is not finite: {}",
                i, t
            )));
        }

        let hierarchy = match &request.hierarchy {
            Some(orbits) => Hierarchy::new(n_bodies, orbits.clone())?,
            None => Hierarchy::jacobi(n_bodies)?,
        };

        let propagator = KeplerianPropagator::new(
            hierarchy,
            request.masses.clone(),
            &orbits,
            request.t0,
            request.gravitational_constant,
        )?;

        if request.return_roche_euler {
            let periods = request.rotation_periods.as_deref().ok_or_else(|| {
                DynamicsError::invalid_input("Euler elements requested without rotation periods")
            })?;
            validate_rotation_periods(periods, n_bodies)?;
        }

        let ltte = if request.ltte {
            Some(
                LightTravelTime::new(request.speed_of_light)?
                    .with_tolerance(request.ltte_tolerance)
                    .with_max_iterations(request.ltte_max_iterations),
            )
        } else {
            None
        };

        if let PropagationMode::Nbody(settings) = &request.mode {
            let integrator = settings.validate()?;
            let shortest_period = propagator
                .elements()
                .iter()
                .map(|e| e.period)
                .fold(f64::INFINITY, f64::min);
            if !integrator.is_adaptive() && settings.step_size > shortest_period / LEAPFROG_STEPS_PER_ORBIT {
                log::warn!(
                    "Fixed step {} resolves the shortest orbit (P={}) with fewer than {} steps",
                    settings.step_size,
                    shortest_period,
                    LEAPFROG_STEPS_PER_ORBIT
                );
            }
            if settings.gr && !(request.speed_of_light > 0.0 && request.speed_of_light.is_finite()) {
                return Err(DynamicsError::invalid_input(format!(
                    "speed of light must be positive and finite, got {}",
                    request.speed_of_light
                )));
            }
            check_strictly_increasing(&request.times)?;
        }

        log::debug!(
            "Validated request: {} bodies, {} times, mode={:?}, ltte={}, euler={}",
            n_bodies,
            request.times.len(),
            request.mode,
            request.ltte,
            request.return_roche_euler
        );

        Ok(Self {
            request,
            propagator,
            ltte,
        })
    }

    pub fn request(&self) -> &DynamicsRequest {
        &self.request
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        self.propagator.hierarchy()
    }

    pub fn propagator(&self) -> &KeplerianPropagator {
        &self.propagator
    }

    /// Run the request
    pub fn compute(&self) -> Result<DynamicsOutput, DynamicsError> {
        self.compute_with_progress(&mut |_, _| {})
    }

    /// Run the request, reporting (completed, total) output times
    pub fn compute_with_progress(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<DynamicsOutput, DynamicsError> {
        log::info!(
            "Computing dynamics for {} bodies at {} times",
            self.request.masses.len(),
            self.request.times.len()
        );

        let output = match &self.request.mode {
            PropagationMode::Keplerian => self.compute_keplerian(progress)?,
            PropagationMode::Nbody(settings) => self.compute_nbody(settings, progress)?,
        };

        log::info!("Dynamics complete");
        Ok(output)
    }

    fn rotation_periods(&self) -> Option<&[f64]> {
        if self.request.return_roche_euler {
            self.request.rotation_periods.as_deref()
        } else {
            None
        }
    }

    /// Euler elements and LTTE for one output time of the Keplerian solution
    fn keplerian_row(
        &self,
        time: f64,
        states: Vec<BodyState>,
    ) -> Result<(Vec<BodyState>, Option<Vec<EulerElements>>), DynamicsError> {
        // Euler elements describe the instantaneous geometry, before LTTE
        let euler = self
            .rotation_periods()
            .map(|periods| {
                compute_euler(
                    self.propagator.hierarchy(),
                    &states,
                    periods,
                    self.request.gravitational_constant,
                    time,
                )
            })
            .transpose()?;

        let states = match &self.ltte {
            Some(ltte) => (0..states.len())
                .map(|j| {
                    let mut view = &self.propagator;
                    ltte.correct(&mut view, j, time)
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => states,
        };

        Ok((states, euler))
    }

    fn compute_keplerian(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<DynamicsOutput, DynamicsError> {
        let times = &self.request.times;
        let total = times.len();
        let mut output = DynamicsOutput::with_capacity(
            times.clone(),
            self.request.masses.len(),
            self.request.return_roche_euler,
        );

        let mut done = 0;
        for batch in times.chunks(KEPLERIAN_BATCH) {
            let grid = self.propagator.states_at_times(batch);
            let rows = batch
                .par_iter()
                .zip(grid)
                .map(|(&t, states)| self.keplerian_row(t, states))
                .collect::<Result<Vec<_>, _>>()?;

            for (states, euler) in &rows {
                output.push_row(states, euler.as_deref());
            }

            done += batch.len();
            progress(done, total);
        }

        Ok(output)
    }

    fn compute_nbody(
        &self,
        settings: &NBodySettings,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<DynamicsOutput, DynamicsError> {
        let times = &self.request.times;
        let total = times.len();
        let mut output = DynamicsOutput::with_capacity(
            times.clone(),
            self.request.masses.len(),
            self.request.return_roche_euler,
        );

        let mut session = IntegratorSession::new(
            settings.clone(),
            self.request.gravitational_constant,
            self.request.speed_of_light,
            self.request.t0,
        )?;
        for state in self.propagator.states_at(self.request.t0) {
            session.add_body(state.mass, state.position, state.velocity);
        }

        log::info!(
            "Integrating {} bodies with {} from t={}",
            session.body_count(),
            session.integrator_type().name(),
            self.request.t0
        );

        for (i, &t) in times.iter().enumerate() {
            session.integrate_to(t)?;
            let states = session.states();

            let euler = self
                .rotation_periods()
                .map(|periods| {
                    compute_euler(
                        self.propagator.hierarchy(),
                        &states,
                        periods,
                        self.request.gravitational_constant,
                        t,
                    )
                })
                .transpose()?;

            // Root-finds run on private copies so the main integration is untouched
            let states = match &self.ltte {
                Some(ltte) => (0..states.len())
                    .map(|j| {
                        let mut scratch = session.clone();
                        ltte.correct(&mut scratch, j, t)
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => states,
            };

            output.push_row(&states, euler.as_deref());
            progress(i + 1, total);
        }

        log::info!("Integration finished after {} steps", session.steps_taken());
        Ok(output)
    }
}

/// N-body output times must be strictly increasing
fn check_strictly_increasing(times: &[f64]) -> Result<(), DynamicsError> {
    for (index, pair) in times.windows(2).enumerate() {
        if !(pair[1] > pair[0]) {
            return Err(DynamicsError::SequenceOrder {
                index: index + 1,
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(())
}
