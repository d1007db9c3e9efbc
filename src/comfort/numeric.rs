//! Numeric validation between resolution and evaluation.

use tracing::{debug, info};

use crate::error::CoercionError;
use crate::records::{ComfortInput, ResolvedRecord};

fn parse_field(field: &'static str, raw: Option<&str>) -> Result<f64, CoercionError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(CoercionError::Missing(field));
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CoercionError::NotNumeric {
            field,
            raw: raw.to_string(),
        }),
    }
}

fn value_field(field: &'static str, value: Option<f64>) -> Result<f64, CoercionError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(CoercionError::NotNumeric {
            field,
            raw: v.to_string(),
        }),
        None => Err(CoercionError::Missing(field)),
    }
}

/// Turns a resolved record into model input, or says which field failed.
pub fn coerce(record: &ResolvedRecord) -> Result<ComfortInput, CoercionError> {
    let env = record.aligned.environment.as_ref();

    Ok(ComfortInput {
        tdb: parse_field("tdb", env.map(|e| e.tdb.as_str()))?,
        tr: parse_field("tr", env.map(|e| e.tr.as_str()))?,
        vr: parse_field("vr", env.map(|e| e.vr.as_str()))?,
        rh: parse_field("rh", env.map(|e| e.rh.as_str()))?,
        met: value_field("met_value", record.met)?,
        clo: value_field("clo_value", record.clo)?,
    })
}

/// Records that passed validation, and why the others did not.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub inputs: Vec<ComfortInput>,
    /// Position in the resolved sequence and the first failing field.
    pub rejected: Vec<(usize, CoercionError)>,
}

/// Keeps only records whose six model inputs are all finite numbers.
pub fn validate(records: &[ResolvedRecord]) -> Validation {
    let mut validation = Validation::default();

    for (position, record) in records.iter().enumerate() {
        match coerce(record) {
            Ok(input) => validation.inputs.push(input),
            Err(e) => {
                debug!(position, partition = %record.aligned.partition_key, error = %e, "Excluding record from evaluation");
                validation.rejected.push((position, e));
            }
        }
    }

    info!(
        accepted = validation.inputs.len(),
        rejected = validation.rejected.len(),
        "Numeric validation complete"
    );

    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AlignedRecord, Measurement, SurveyResponse};
    use chrono::NaiveDate;

    fn resolved(env: Option<[&str; 4]>, clo: Option<f64>, met: Option<f64>) -> ResolvedRecord {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        ResolvedRecord {
            aligned: AlignedRecord {
                partition_key: "A".into(),
                survey_time: t,
                survey: SurveyResponse::default(),
                matched_time: env.map(|_| t),
                environment: env.map(|[tdb, tr, vr, rh]| Measurement {
                    tdb: tdb.into(),
                    tr: tr.into(),
                    vr: vr.into(),
                    rh: rh.into(),
                }),
            },
            clo,
            met,
        }
    }

    #[test]
    fn test_coerce_complete_record() {
        let record = resolved(Some(["22", " 22.5 ", "0.1", "50"]), Some(0.5), Some(1.2));
        let input = coerce(&record).unwrap();

        assert_eq!(input.tr, 22.5);
        assert_eq!(input.clo, 0.5);
        assert_eq!(input.met, 1.2);
    }

    #[test]
    fn test_coerce_join_miss_is_missing() {
        let record = resolved(None, Some(0.5), Some(1.2));
        assert_eq!(coerce(&record), Err(CoercionError::Missing("tdb")));
    }

    #[test]
    fn test_coerce_rejects_text_and_non_finite() {
        let record = resolved(Some(["22", "22", "n/a", "50"]), Some(0.5), Some(1.2));
        let err = coerce(&record).unwrap_err();
        assert_eq!(err.field(), "vr");

        let record = resolved(Some(["inf", "22", "0.1", "50"]), Some(0.5), Some(1.2));
        assert_eq!(coerce(&record).unwrap_err().field(), "tdb");

        let record = resolved(Some(["22", "22", "0.1", "NaN"]), Some(0.5), Some(1.2));
        assert_eq!(coerce(&record).unwrap_err().field(), "rh");
    }

    #[test]
    fn test_coerce_rejects_decimal_comma() {
        let record = resolved(Some(["21,5", "22", "0.1", "50"]), Some(0.5), Some(1.2));
        assert!(matches!(
            coerce(&record),
            Err(CoercionError::NotNumeric { field: "tdb", .. })
        ));
    }

    #[test]
    fn test_coerce_unmapped_descriptor() {
        let record = resolved(Some(["22", "22", "0.1", "50"]), None, Some(1.2));
        assert_eq!(coerce(&record), Err(CoercionError::Missing("clo_value")));
    }

    #[test]
    fn test_validate_filters_and_keeps_order() {
        let records = vec![
            resolved(Some(["20", "20", "0.1", "40"]), Some(0.5), Some(1.2)),
            resolved(Some(["", "20", "0.1", "40"]), Some(0.5), Some(1.2)),
            resolved(Some(["24", "24", "0.1", "40"]), Some(0.5), Some(1.2)),
        ];

        let validation = validate(&records);

        assert_eq!(validation.inputs.len(), 2);
        assert_eq!(validation.inputs[0].tdb, 20.0);
        assert_eq!(validation.inputs[1].tdb, 24.0);
        assert_eq!(validation.rejected, vec![(1, CoercionError::Missing("tdb"))]);
    }
}
