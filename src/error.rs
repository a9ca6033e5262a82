//! Error types.

use itertools::Itertools;
use thiserror::Error;

use crate::solvers::SolverError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the orientation core.
///
/// Every failure kind is its own variant so callers can branch on it,
/// e.g. keep scanning on [`Error::NoForwardSolutions`] but abort on anything else.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation needed the axis cross-reference before it was built.
    #[error("axes have not been assigned: did you forget to call assign_axes()?")]
    AxesNotAssigned,

    /// A value failed validation.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A name was looked up that does not exist.
    #[error("unknown {kind} {key:?}, expected one of [{known}]")]
    UnknownKey {
        /// What was looked up, e.g. `"sample"`.
        kind: &'static str,
        /// The name that was not found.
        key: String,
        /// Known names, comma separated.
        known: String,
    },

    /// Invalid lattice parameters.
    #[error("lattice error: {0}")]
    Lattice(String),

    /// Invalid reflection or reflection collection.
    #[error("reflection error: {0}")]
    Reflection(String),

    /// Invalid sample or orientation matrix.
    #[error("sample error: {0}")]
    Sample(String),

    /// Invalid constraint or constraint evaluation.
    #[error("constraints error: {0}")]
    Constraints(String),

    /// Malformed configuration document.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Configuration document does not describe the live diffractometer.
    #[error("configuration mismatch in {field}: incoming {incoming:?}, existing {existing:?}")]
    ConfigurationMismatch {
        /// Document field, e.g. `"solver.geometry"`.
        field: &'static str,
        /// Value in the document.
        incoming: String,
        /// Value of the live diffractometer.
        existing: String,
    },

    /// No forward solution survived the solver and the real-axis constraints.
    #[error("no forward solutions found for {0}")]
    NoForwardSolutions(String),

    /// Diffractometer-level usage error.
    #[error("diffractometer error: {0}")]
    Diffractometer(String),

    /// Error surfaced by the solver backend.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Failed to read or write a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or emit YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Build an [`Error::UnknownKey`] listing the known names.
    pub(crate) fn unknown<I, S>(kind: &'static str, key: impl Into<String>, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Error::UnknownKey {
            kind,
            key: key.into(),
            known: known.into_iter().map(|s| s.as_ref().to_string()).join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_lists_choices() {
        let e = Error::unknown("reflection", "r9", ["r1", "r2"]);
        assert_eq!(
            e.to_string(),
            "unknown reflection \"r9\", expected one of [r1, r2]"
        );
    }

    #[test]
    fn mismatch_names_both_values() {
        let e = Error::ConfigurationMismatch {
            field: "geometry",
            incoming: "E6C".into(),
            existing: "E4CV".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("E6C"));
        assert!(msg.contains("E4CV"));
    }

    #[test]
    fn solver_error_is_wrapped() {
        let e: Error = SolverError::UnknownMode {
            mode: "sideways".into(),
            choices: "bissector".into(),
        }
        .into();
        assert!(matches!(e, Error::Solver(_)));
        assert!(e.to_string().contains("sideways"));
    }
}
