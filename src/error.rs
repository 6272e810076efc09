//! Crate-wide error type.

use crate::config::ConfigError;
use crate::source::CellModelKind;

/// Errors raised while configuring or running a simulation.
///
/// Configuration problems surface at setup time; range problems surface on
/// the offending query. Numeric edge cases inside a cycle are never errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The source was queried before `setup_model` chose a cell model.
    #[error("no cell model is defined for the PV source")]
    NoCellModel,

    /// A name did not match any variant of a closed set.
    #[error("unknown {kind} \"{name}\", expected one of: {expected}")]
    UnknownKind {
        /// What was being named (e.g. `"local algorithm"`).
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Comma separated list of accepted names.
        expected: String,
    },

    /// A module name is not part of the configured source.
    #[error("module \"{0}\" is not defined in the environment")]
    UnknownModule(String),

    /// The environment profile is structurally valid JSON but unusable.
    #[error("invalid environment profile: {0}")]
    InvalidProfile(String),

    /// Attempted to move the environment outside `[0, max]`.
    #[error("cycle {cycle} is outside [0, {max}]")]
    CycleOutOfRange {
        /// Requested cycle.
        cycle: usize,
        /// Last valid cycle.
        max: usize,
    },

    /// A lookup query fell outside the table grid.
    #[error("lookup {axis} = {value} maps to index {index}, table holds {count}")]
    LookupOutOfBounds {
        /// Axis name.
        axis: &'static str,
        /// Queried value.
        value: f64,
        /// Computed index on that axis.
        index: i64,
        /// Number of entries on that axis.
        count: usize,
    },

    /// A table built for one cell model was paired with another.
    #[error("lookup table was built for the {table} model, source uses {model}")]
    LookupModelMismatch {
        /// Model the table was generated from.
        table: CellModelKind,
        /// Model of the source.
        model: CellModelKind,
    },

    /// Lookups were requested but no table was supplied.
    #[error("lookup requested without a lookup table")]
    NoLookupTable,

    /// Malformed lookup table contents.
    #[error("invalid lookup table: {0}")]
    InvalidLookup(String),

    /// Scenario configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Builds an [`SimError::UnknownKind`] from the list of accepted names.
    pub(crate) fn unknown(kind: &'static str, name: &str, expected: &[&str]) -> Self {
        Self::UnknownKind {
            kind,
            name: name.to_string(),
            expected: expected.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_lists_alternatives() {
        let err = SimError::unknown("stride", "huge", &["fixed", "adaptive"]);
        let msg = err.to_string();
        assert!(msg.contains("\"huge\""));
        assert!(msg.contains("fixed, adaptive"));
    }

    #[test]
    fn model_mismatch_names_both_models() {
        let err = SimError::LookupModelMismatch {
            table: CellModelKind::Ideal,
            model: CellModelKind::Nonideal,
        };
        assert_eq!(
            err.to_string(),
            "lookup table was built for the Ideal model, source uses Nonideal"
        );
    }

    #[test]
    fn cycle_range_message() {
        let err = SimError::CycleOutOfRange { cycle: 12, max: 10 };
        assert_eq!(err.to_string(), "cycle 12 is outside [0, 10]");
    }
}
