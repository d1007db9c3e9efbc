use std::io;

use thiserror::Error;

/// The comfort model rejected its input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{field} = {value} is not a finite number")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} = {value} outside the valid range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("clothing surface temperature did not converge after {0} iterations")]
    NoConvergence(usize),
}

/// A field needed for evaluation could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("{field} is not numeric: '{raw}'")]
    NotNumeric { field: &'static str, raw: String },
}

impl CoercionError {
    pub fn field(&self) -> &'static str {
        match self {
            CoercionError::Missing(field) => field,
            CoercionError::NotNumeric { field, .. } => field,
        }
    }
}

/// Conditions that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{table} table has no usable rows after cleaning")]
    EmptyInput { table: &'static str },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
