//! PMV/PPD comfort model.
//!
//! [`ComfortModel`] is the seam the evaluator calls through; [`Iso7730`] is
//! the ISO 7730:2005 implementation used by the CLI.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::records::{ComfortInput, ComfortResult};

/// Comfort standard a model should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Standard {
    /// ISO 7730:2005.
    #[default]
    Iso7730,
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standard::Iso7730 => f.write_str("7730-2005"),
        }
    }
}

impl FromStr for Standard {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7730-2005" | "iso" | "iso7730" => Ok(Standard::Iso7730),
            other => Err(anyhow::anyhow!("unknown comfort standard '{other}'")),
        }
    }
}

/// A thermal comfort model evaluated one record at a time.
///
/// Implementations must be pure: the same input always gives the same answer.
pub trait ComfortModel: Send + Sync {
    fn evaluate(&self, input: &ComfortInput, standard: Standard) -> Result<ComfortResult, ModelError>;
}

/// Upper bound on clothing surface temperature iterations.
pub const MAX_ITERATIONS: usize = 150;
const EPSILON: f64 = 0.00015;

/// ISO 7730 applicability limits as `(field, min, max)`.
static ISO_LIMITS: &[(&str, f64, f64)] = &[
    ("tdb", 10.0, 30.0),
    ("tr", 10.0, 40.0),
    ("vr", 0.0, 1.0),
    ("met", 0.8, 4.0),
    ("clo", 0.0, 2.0),
];

/// ISO 7730:2005 Predicted Mean Vote and Predicted Percentage Dissatisfied.
#[derive(Debug, Clone, Copy)]
pub struct Iso7730 {
    /// Reject inputs (and PMV values) outside the standard's applicability range.
    pub limit_inputs: bool,
    /// Round PMV to 2 decimals and PPD to 1.
    pub round_output: bool,
}

impl Default for Iso7730 {
    fn default() -> Self {
        Self {
            limit_inputs: true,
            round_output: true,
        }
    }
}

impl ComfortModel for Iso7730 {
    fn evaluate(&self, input: &ComfortInput, _standard: Standard) -> Result<ComfortResult, ModelError> {
        check_domain(input, self.limit_inputs)?;

        let pmv = pmv(input)?;
        if self.limit_inputs && !(-2.0..=2.0).contains(&pmv) {
            return Err(ModelError::OutOfRange {
                field: "pmv",
                value: pmv,
                min: -2.0,
                max: 2.0,
            });
        }
        let ppd = ppd(pmv);

        Ok(if self.round_output {
            ComfortResult {
                pmv: round_to(pmv, 2),
                ppd: round_to(ppd, 1),
            }
        } else {
            ComfortResult { pmv, ppd }
        })
    }
}

fn fields(input: &ComfortInput) -> [(&'static str, f64); 6] {
    [
        ("tdb", input.tdb),
        ("tr", input.tr),
        ("vr", input.vr),
        ("rh", input.rh),
        ("met", input.met),
        ("clo", input.clo),
    ]
}

fn check_domain(input: &ComfortInput, limit_inputs: bool) -> Result<(), ModelError> {
    for (field, value) in fields(input) {
        if !value.is_finite() {
            return Err(ModelError::NonFinite { field, value });
        }
    }

    let mut limits = vec![("rh", 0.0, 100.0)];
    if limit_inputs {
        limits.extend_from_slice(ISO_LIMITS);
    } else {
        // the heat balance needs non-negative air speed, insulation and activity
        limits.extend_from_slice(&[("vr", 0.0, f64::MAX), ("clo", 0.0, f64::MAX), ("met", 0.0, f64::MAX)]);
    }

    for (field, value) in fields(input) {
        for &(name, min, max) in &limits {
            if name == field && !(min..=max).contains(&value) {
                return Err(ModelError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
    }

    Ok(())
}

/// Predicted Mean Vote from the ISO 7730 heat balance, external work = 0.
fn pmv(input: &ComfortInput) -> Result<f64, ModelError> {
    let ComfortInput {
        tdb,
        tr,
        vr,
        rh,
        met,
        clo,
    } = *input;

    // water vapour partial pressure, Pa
    let pa = rh * 10.0 * (16.6536 - 4030.183 / (tdb + 235.0)).exp();

    let icl = 0.155 * clo;
    let m = met * 58.15;
    let mw = m;

    let f_cl = if icl <= 0.078 {
        1.0 + 1.29 * icl
    } else {
        1.05 + 0.645 * icl
    };

    // forced convection
    let hcf = 12.1 * vr.sqrt();
    let taa = tdb + 273.0;
    let tra = tr + 273.0;
    let t_cla = taa + (35.5 - tdb) / (3.5 * icl + 0.1);

    let p1 = icl * f_cl;
    let p2 = p1 * 3.96;
    let p3 = p1 * 100.0;
    let p4 = p1 * taa;
    let p5 = 308.7 - 0.028 * mw + p2 * (tra / 100.0).powi(4);

    let mut xn = t_cla / 100.0;
    let mut xf = t_cla / 50.0;
    let mut hc = hcf;
    let mut iterations = 0;

    while (xn - xf).abs() > EPSILON {
        xf = (xf + xn) / 2.0;
        let hcn = 2.38 * (100.0 * xf - taa).abs().powf(0.25);
        hc = hcf.max(hcn);
        xn = (p5 + p4 * hc - p2 * xf.powi(4)) / (100.0 + p3 * hc);
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(ModelError::NoConvergence(MAX_ITERATIONS));
        }
    }

    let tcl = 100.0 * xn - 273.0;

    // heat loss components
    let skin_diffusion = 3.05 * 0.001 * (5733.0 - 6.99 * mw - pa);
    let sweating = if mw > 58.15 { 0.42 * (mw - 58.15) } else { 0.0 };
    let latent_respiration = 1.7 * 0.00001 * m * (5867.0 - pa);
    let dry_respiration = 0.0014 * m * (34.0 - tdb);
    let radiation = 3.96 * f_cl * (xn.powi(4) - (tra / 100.0).powi(4));
    let convection = f_cl * hc * (tcl - tdb);

    let ts = 0.303 * (-0.036 * m).exp() + 0.028;
    let pmv = ts
        * (mw
            - skin_diffusion
            - sweating
            - latent_respiration
            - dry_respiration
            - radiation
            - convection);

    if pmv.is_finite() {
        Ok(pmv)
    } else {
        Err(ModelError::NonFinite {
            field: "pmv",
            value: pmv,
        })
    }
}

/// Predicted Percentage Dissatisfied for a PMV value, always within [5, 100].
pub fn ppd(pmv: f64) -> f64 {
    100.0 - 95.0 * (-0.03353 * pmv.powi(4) - 0.2179 * pmv.powi(2)).exp()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
