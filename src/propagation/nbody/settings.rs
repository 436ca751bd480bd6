//! Configuration for N-body integration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::integrator::{DormandPrince54, Integrator, Leapfrog, RungeKutta4};
use crate::propagation::error::DynamicsError;

/// Integrator backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegratorType {
    /// Dormand-Prince 5(4), adaptive high order
    #[default]
    DormandPrince,
    /// Classic RK4 with step doubling
    Rk4,
    /// Fixed-step kick-drift-kick leapfrog
    Leapfrog,
}

impl IntegratorType {
    /// Parse a backend name as used in requests
    ///
    /// # Errors
    ///
    /// `UnsupportedConfiguration` for any name that is not a known backend.
    pub fn from_name(name: &str) -> Result<Self, DynamicsError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dopri5" | "dormand-prince" => Ok(Self::DormandPrince),
            "rk4" => Ok(Self::Rk4),
            "leapfrog" => Ok(Self::Leapfrog),
            other => Err(DynamicsError::unsupported(format!(
                "unknown integrator '{}' (available: {})",
                other,
                Self::all()
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Name accepted by [`IntegratorType::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DormandPrince => "dopri5",
            Self::Rk4 => "rk4",
            Self::Leapfrog => "leapfrog",
        }
    }

    /// Short description of when to use this integrator
    pub fn description(&self) -> &'static str {
        match self {
            Self::DormandPrince => "Adaptive 5th order. Best accuracy per force evaluation.",
            Self::Rk4 => "Adaptive 4th order via step doubling. Simple and robust.",
            Self::Leapfrog => "Fixed-step symplectic. Bounded energy error over long runs.",
        }
    }

    pub fn all() -> &'static [IntegratorType] {
        &[
            IntegratorType::DormandPrince,
            IntegratorType::Rk4,
            IntegratorType::Leapfrog,
        ]
    }

    /// Whether the backend adapts its step to the tolerance
    pub fn is_adaptive(&self) -> bool {
        !matches!(self, Self::Leapfrog)
    }

    pub fn create(&self) -> Arc<dyn Integrator> {
        match self {
            Self::DormandPrince => Arc::new(DormandPrince54::new()),
            Self::Rk4 => Arc::new(RungeKutta4::new()),
            Self::Leapfrog => Arc::new(Leapfrog),
        }
    }
}

/// N-body integration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NBodySettings {
    /// Integrator backend name ("dopri5", "rk4", "leapfrog")
    pub integrator: String,

    /// Initial step for adaptive backends, fixed step for leapfrog
    pub step_size: f64,

    /// Scaled local error tolerance for adaptive stepping
    pub tolerance: f64,

    /// Maximum number of steps in a single integrate_to call
    pub max_steps: usize,

    /// Add the first-order post-Newtonian correction
    pub gr: bool,
}

impl Default for NBodySettings {
    fn default() -> Self {
        Self {
            integrator: IntegratorType::DormandPrince.name().to_string(),
            step_size: 0.01,
            tolerance: 1e-10,
            max_steps: 1_000_000,
            gr: false,
        }
    }
}

impl NBodySettings {
    /// Quick integration settings (lower accuracy, faster)
    pub fn fast() -> Self {
        Self {
            step_size: 0.05,
            tolerance: 1e-8,
            max_steps: 100_000,
            ..Default::default()
        }
    }

    /// High-precision settings
    pub fn high_precision() -> Self {
        Self {
            step_size: 0.001,
            tolerance: 1e-13,
            max_steps: 10_000_000,
            ..Default::default()
        }
    }

    pub fn with_integrator(mut self, integrator: IntegratorType) -> Self {
        self.integrator = integrator.name().to_string();
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_gr(mut self, gr: bool) -> Self {
        self.gr = gr;
        self
    }

    /// Resolve the backend and check the numeric settings
    ///
    /// # Errors
    ///
    /// `UnsupportedConfiguration` for an unknown backend or a GR request in
    /// a build without relativity support; `InvalidInput` for non-positive
    /// step size, tolerance or step budget.
    pub fn validate(&self) -> Result<IntegratorType, DynamicsError> {
        let integrator = IntegratorType::from_name(&self.integrator)?;

        if self.gr && !cfg!(feature = "relativity") {
            return Err(DynamicsError::unsupported(
                "general relativity requested but this build lacks the `relativity` feature",
            ));
        }
        if !(self.step_size > 0.0) || !self.step_size.is_finite() {
            return Err(DynamicsError::invalid_input(format!(
                "step size must be positive, got {}",
                self.step_size
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(DynamicsError::invalid_input(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_steps == 0 {
            return Err(DynamicsError::invalid_input("max_steps must be at least 1"));
        }

        Ok(integrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrator_names_round_trip() {
        for ty in IntegratorType::all() {
            assert_eq!(IntegratorType::from_name(ty.name()).unwrap(), *ty);
            assert_eq!(ty.create().name(), ty.name());
        }
        assert_eq!(
            IntegratorType::from_name("DOPRI5").unwrap(),
            IntegratorType::DormandPrince
        );
    }

    #[test]
    fn test_unknown_integrator_is_unsupported() {
        let err = IntegratorType::from_name("whfast").unwrap_err();
        assert!(matches!(err, DynamicsError::UnsupportedConfiguration { .. }));
        assert!(err.to_string().contains("whfast"));

        let settings = NBodySettings {
            integrator: "ias15".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(DynamicsError::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_presets_are_valid() {
        for settings in [
            NBodySettings::default(),
            NBodySettings::fast(),
            NBodySettings::high_precision(),
        ] {
            assert_eq!(settings.validate().unwrap(), IntegratorType::DormandPrince);
        }
        assert!(NBodySettings::fast().tolerance > NBodySettings::high_precision().tolerance);
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(NBodySettings::default().with_step_size(0.0).validate().is_err());
        assert!(NBodySettings::default().with_tolerance(-1.0).validate().is_err());
        assert!(NBodySettings::default().with_max_steps(0).validate().is_err());
    }

    #[cfg(not(feature = "relativity"))]
    #[test]
    fn test_gr_without_feature_is_unsupported() {
        let settings = NBodySettings::default().with_gr(true);
        assert!(matches!(
            settings.validate(),
            Err(DynamicsError::UnsupportedConfiguration { .. })
        ));
    }

    #[cfg(feature = "relativity")]
    #[test]
    fn test_gr_with_feature_is_accepted() {
        let settings = NBodySettings::default().with_gr(true);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: NBodySettings =
            serde_json::from_str(r#"{"integrator": "leapfrog", "step_size": 0.002}"#).unwrap();
        assert_eq!(settings.validate().unwrap(), IntegratorType::Leapfrog);
        assert_eq!(settings.max_steps, NBodySettings::default().max_steps);
        assert!(!settings.gr);
    }
}
