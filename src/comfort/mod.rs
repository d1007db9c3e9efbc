//! Thermal comfort evaluation.
//!
//! Resolved records are coerced to numbers ([`numeric`]), then handed to a
//! [`ComfortModel`] one record at a time by the [`Evaluator`].

pub mod evaluator;
pub mod model;
pub mod numeric;

pub use evaluator::{Evaluation, Evaluator, EvaluatorConfig, Outcome, Tally};
pub use model::{ComfortModel, Iso7730, Standard};
pub use numeric::{Validation, coerce, validate};
