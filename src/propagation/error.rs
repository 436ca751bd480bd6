//! Error types for the dynamics engine

/// Dynamics error types
///
/// Every failure in the engine is fatal to the call that raised it and is
/// propagated unchanged to the caller. Nothing is retried: the engine is
/// deterministic, so the same inputs produce the same failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicsError {
    /// Orbit is not a bound ellipse (e >= 1, or a non-positive semi-major axis)
    InvalidOrbit { eccentricity: f64 },

    /// N-body mode was given times that are not strictly increasing
    SequenceOrder {
        index: usize,
        previous: f64,
        next: f64,
    },

    /// Requested integrator or perturbation is not available in this build
    UnsupportedConfiguration { message: String },

    /// Light travel time root-find did not converge
    Convergence {
        body: usize,
        time: f64,
        iterations: usize,
    },

    /// Integrator rejected a step or ran out of its step budget
    IntegrationFailure { message: String },

    /// Request is internally inconsistent
    InvalidInput { message: String },
}

impl DynamicsError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DynamicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOrbit { eccentricity } => {
                write!(
                    f,
                    "Invalid orbit: eccentricity {} is not a closed ellipse",
                    eccentricity
                )
            }
            Self::SequenceOrder {
                index,
                previous,
                next,
            } => {
                write!(
                    f,
                    "N-body times must be strictly increasing: times[{}] = {} follows {}",
                    index, next, previous
                )
            }
            Self::UnsupportedConfiguration { message } => {
                write!(f, "Unsupported configuration: {}", message)
            }
            Self::Convergence {
                body,
                time,
                iterations,
            } => {
                write!(
                    f,
                    "Light travel time for body {} at t={} did not converge after {} iterations",
                    body, time, iterations
                )
            }
            Self::IntegrationFailure { message } => {
                write!(f, "Integration failed: {}", message)
            }
            Self::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
        }
    }
}

impl std::error::Error for DynamicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_offending_values() {
        let err = DynamicsError::SequenceOrder {
            index: 3,
            previous: 2.0,
            next: 1.5,
        };
        let text = err.to_string();
        assert!(text.contains("times[3]"));
        assert!(text.contains("1.5"));

        let err = DynamicsError::InvalidOrbit { eccentricity: 1.2 };
        assert!(err.to_string().contains("1.2"));
    }
}
