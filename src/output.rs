//! Artifact persistence.
//!
//! Artifacts are `;`-separated UTF-8 CSV with a byte-order mark so they open
//! cleanly in spreadsheet software. Absent values are empty cells.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::comfort::Evaluation;
use crate::records::{AlignedRecord, ResolvedRecord};
use crate::stats::RunStats;

pub const MERGED_FILE: &str = "merged_data.csv";
pub const CLO_MET_FILE: &str = "merged_data_clo_met.csv";
pub const RESULTS_FILE: &str = "comfort_results.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

pub const DELIMITER: u8 = b';';
const BOM: &[u8] = "\u{feff}".as_bytes();

pub const MERGED_HEADERS: &[&str] = &["clothing", "activity", "tdb", "tr", "vr", "rh"];
pub const CLO_MET_HEADERS: &[&str] = &[
    "clothing",
    "clo_value",
    "activity",
    "met_value",
    "tdb",
    "tr",
    "vr",
    "rh",
];
pub const RESULTS_HEADERS: &[&str] = &[
    "tdb",
    "tr",
    "vr",
    "rh",
    "met_value",
    "clo_value",
    "pmv",
    "ppd",
];

#[derive(Serialize)]
struct MergedRow<'a> {
    clothing: &'a str,
    activity: &'a str,
    tdb: Option<&'a str>,
    tr: Option<&'a str>,
    vr: Option<&'a str>,
    rh: Option<&'a str>,
}

impl<'a> From<&'a AlignedRecord> for MergedRow<'a> {
    fn from(record: &'a AlignedRecord) -> Self {
        let env = record.environment.as_ref();
        MergedRow {
            clothing: &record.survey.clothing,
            activity: &record.survey.activity,
            tdb: env.map(|e| e.tdb.as_str()),
            tr: env.map(|e| e.tr.as_str()),
            vr: env.map(|e| e.vr.as_str()),
            rh: env.map(|e| e.rh.as_str()),
        }
    }
}

#[derive(Serialize)]
struct CloMetRow<'a> {
    clothing: &'a str,
    clo_value: Option<f64>,
    activity: &'a str,
    met_value: Option<f64>,
    tdb: Option<&'a str>,
    tr: Option<&'a str>,
    vr: Option<&'a str>,
    rh: Option<&'a str>,
}

impl<'a> From<&'a ResolvedRecord> for CloMetRow<'a> {
    fn from(record: &'a ResolvedRecord) -> Self {
        let merged = MergedRow::from(&record.aligned);
        CloMetRow {
            clothing: merged.clothing,
            clo_value: record.clo,
            activity: merged.activity,
            met_value: record.met,
            tdb: merged.tdb,
            tr: merged.tr,
            vr: merged.vr,
            rh: merged.rh,
        }
    }
}

#[derive(Serialize)]
struct ResultRow {
    tdb: f64,
    tr: f64,
    vr: f64,
    rh: f64,
    met_value: f64,
    clo_value: f64,
    pmv: Option<f64>,
    ppd: Option<f64>,
}

impl From<&Evaluation> for ResultRow {
    fn from(evaluation: &Evaluation) -> Self {
        let input = evaluation.input;
        let result = evaluation.outcome.result();
        ResultRow {
            tdb: input.tdb,
            tr: input.tr,
            vr: input.vr,
            rh: input.rh,
            met_value: input.met,
            clo_value: input.clo,
            pmv: result.map(|r| r.pmv),
            ppd: result.map(|r| r.ppd),
        }
    }
}

/// Writes rows to `path`, replacing any existing file.
///
/// The header is always written, even for an empty artifact.
pub fn write_artifact<T, I>(path: &Path, headers: &[&str], rows: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(BOM)?;

    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(file);

    writer.write_record(headers)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = count, "Artifact written");
    Ok(count)
}

/// Artifact 1: aligned records.
pub fn write_merged(path: &Path, records: &[AlignedRecord]) -> Result<usize> {
    let rows = write_artifact(path, MERGED_HEADERS, records.iter().map(MergedRow::from))?;
    info!(path = %path.display(), rows, "Merged file generated");
    Ok(rows)
}

/// Artifact 2: aligned records with clo and met values.
pub fn write_clo_met(path: &Path, records: &[ResolvedRecord]) -> Result<usize> {
    let rows = write_artifact(path, CLO_MET_HEADERS, records.iter().map(CloMetRow::from))?;
    info!(path = %path.display(), rows, "CLO/MET file generated");
    Ok(rows)
}

/// Artifact 3: numeric inputs with PMV and PPD (empty where evaluation failed).
pub fn write_results(path: &Path, evaluations: &[Evaluation]) -> Result<usize> {
    let rows = write_artifact(path, RESULTS_HEADERS, evaluations.iter().map(ResultRow::from))?;
    info!(path = %path.display(), rows, "Comfort results file generated");
    Ok(rows)
}

/// Writes the run statistics as pretty-printed JSON.
pub fn write_summary(path: &Path, stats: &RunStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Logs run statistics as pretty-printed JSON.
pub fn print_json(stats: &RunStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comfort::Outcome;
    use crate::error::ModelError;
    use crate::records::{ComfortInput, ComfortResult, Measurement, SurveyResponse};
    use chrono::NaiveDate;
    use std::fs;

    fn aligned(with_env: bool) -> AlignedRecord {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        AlignedRecord {
            partition_key: "101".into(),
            survey_time: t,
            survey: SurveyResponse {
                clothing: "Caleçon, combinaison, chaussettes, chaussures".into(),
                activity: "Repos, assis".into(),
            },
            matched_time: with_env.then_some(t),
            environment: with_env.then(|| Measurement {
                tdb: "21.5".into(),
                tr: "21".into(),
                vr: "0.1".into(),
                rh: "45".into(),
            }),
        }
    }

    fn read(path: &Path) -> String {
        let bytes = fs::read(path).unwrap();
        assert!(bytes.starts_with(BOM));
        String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap()
    }

    #[test]
    fn test_write_merged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MERGED_FILE);

        let rows = write_merged(&path, &[aligned(true), aligned(false)]).unwrap();
        assert_eq!(rows, 2);

        let content = read(&path);
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "clothing;activity;tdb;tr;vr;rh");
        assert_eq!(
            lines[1],
            "Caleçon, combinaison, chaussettes, chaussures;Repos, assis;21.5;21;0.1;45"
        );
        assert_eq!(
            lines[2],
            "Caleçon, combinaison, chaussettes, chaussures;Repos, assis;;;;"
        );
    }

    #[test]
    fn test_write_clo_met_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLO_MET_FILE);

        let record = ResolvedRecord {
            aligned: aligned(true),
            clo: Some(0.7),
            met: None,
        };
        write_clo_met(&path, &[record]).unwrap();

        let content = read(&path);
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], CLO_MET_HEADERS.join(";"));
        assert_eq!(
            lines[1],
            "Caleçon, combinaison, chaussettes, chaussures;0.7;Repos, assis;;21.5;21;0.1;45"
        );
    }

    #[test]
    fn test_write_results_blank_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        let input = ComfortInput {
            tdb: 22.0,
            tr: 22.0,
            vr: 0.1,
            rh: 50.0,
            met: 1.2,
            clo: 0.5,
        };
        let evaluations = vec![
            Evaluation {
                input,
                outcome: Outcome::Ok(ComfortResult {
                    pmv: -0.5,
                    ppd: 10.2,
                }),
            },
            Evaluation {
                input: ComfortInput { rh: 150.0, ..input },
                outcome: Outcome::DomainFailure(ModelError::OutOfRange {
                    field: "rh",
                    value: 150.0,
                    min: 0.0,
                    max: 100.0,
                }),
            },
        ];
        write_results(&path, &evaluations).unwrap();

        let content = read(&path);
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "22.0;22.0;0.1;50.0;1.2;0.5;-0.5;10.2");
        assert_eq!(lines[2], "22.0;22.0;0.1;150.0;1.2;0.5;;");
    }

    #[test]
    fn test_empty_artifact_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        let rows = write_results(&path, &[]).unwrap();

        assert_eq!(rows, 0);
        assert_eq!(read(&path).trim_end(), RESULTS_HEADERS.join(";"));
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MERGED_FILE);

        write_merged(&path, &[aligned(true), aligned(true)]).unwrap();
        write_merged(&path, &[aligned(true)]).unwrap();

        assert_eq!(read(&path).lines().count(), 2);
    }

    #[test]
    fn test_write_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);

        let stats = RunStats {
            survey_rows: 3,
            ..Default::default()
        };
        write_summary(&path, &stats).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["survey_rows"], 3);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&RunStats::default()).unwrap();
    }
}
