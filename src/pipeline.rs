//! Run orchestration.
//!
//! LOADED → ALIGNED → RESOLVED → NUMERIC-VALIDATED → EVALUATED → PERSISTED.
//! Only an empty table after cleaning, or I/O at the edges, ends a run early;
//! per-record problems are carried forward as absent values and counted.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::align::{self, Prepared};
use crate::comfort::{self, ComfortModel, Evaluation, Evaluator, Tally};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::loader::{self, Loaded};
use crate::output;
use crate::records::{AlignedRecord, Measurement, ResolvedRecord, SurveyResponse};
use crate::resolve;
use crate::stats::RunStats;

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    Aligned,
    Resolved,
    NumericValidated,
    Evaluated,
    Persisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "LOADED",
            Stage::Aligned => "ALIGNED",
            Stage::Resolved => "RESOLVED",
            Stage::NumericValidated => "NUMERIC-VALIDATED",
            Stage::Evaluated => "EVALUATED",
            Stage::Persisted => "PERSISTED",
        };
        f.write_str(name)
    }
}

/// In-memory output of every stage.
#[derive(Debug, Clone)]
pub struct Processed {
    pub aligned: Vec<AlignedRecord>,
    pub resolved: Vec<ResolvedRecord>,
    pub evaluations: Vec<Evaluation>,
    pub stats: RunStats,
}

/// Paths of the files a run wrote.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub merged: PathBuf,
    pub clo_met: PathBuf,
    pub results: PathBuf,
    pub summary: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    pub artifacts: Artifacts,
}

pub struct Pipeline {
    config: PipelineConfig,
    model: Arc<dyn ComfortModel>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, model: Arc<dyn ComfortModel>) -> Self {
        Self { config, model }
    }

    /// Loads both tables, processes them and writes every artifact.
    #[tracing::instrument(skip(self), fields(data_dir = %self.config.data_dir.display(), output_dir = %self.config.output_dir.display()))]
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let surveys = loader::load_survey(&self.config.survey_path(), self.config.has_headers)?;
        let environment =
            loader::load_environment(&self.config.environment_path(), self.config.has_headers)?;

        let processed = self.process(surveys, environment).await?;
        let artifacts = self.persist(&processed)?;

        Ok(RunReport {
            stats: processed.stats,
            artifacts,
        })
    }

    /// Runs every stage up to EVALUATED on already loaded rows.
    pub async fn process(
        &self,
        surveys: Loaded<SurveyResponse>,
        environment: Loaded<Measurement>,
    ) -> Result<Processed, PipelineError> {
        let mut stats = RunStats::new();
        stats.survey_rows = surveys.rows_read();
        stats.environment_rows = environment.rows_read();

        let format = &self.config.timestamp_format;
        let survey_prepared: Prepared<SurveyResponse> = align::prepare(surveys.records, format);
        let env_prepared: Prepared<Measurement> = align::prepare(environment.records, format);

        stats.survey_dropped = surveys.short_rows + survey_prepared.malformed;
        stats.environment_dropped = environment.short_rows + env_prepared.malformed;
        info!(
            stage = %Stage::Loaded,
            surveys = survey_prepared.records.len(),
            measurements = env_prepared.records.len(),
            survey_dropped = stats.survey_dropped,
            environment_dropped = stats.environment_dropped,
            "Tables cleaned"
        );

        if survey_prepared.records.is_empty() {
            return Err(PipelineError::EmptyInput { table: "survey" });
        }
        if env_prepared.records.is_empty() {
            return Err(PipelineError::EmptyInput {
                table: "environment",
            });
        }

        let alignment = align::align(
            survey_prepared.records,
            env_prepared.records,
            self.config.tolerance,
        )
        .await?;
        stats.aligned = alignment.records.len();
        stats.partitions = alignment.partitions;
        stats.unmatched_partitions = alignment.unmatched_partitions;
        stats.join_misses = alignment.join_misses;
        info!(stage = %Stage::Aligned, records = stats.aligned, "Stage reached");

        let resolution = resolve::resolve(&alignment.records);
        stats.unmapped_clothing = resolution.unmapped_clothing;
        stats.unmapped_activity = resolution.unmapped_activity;
        info!(stage = %Stage::Resolved, records = resolution.records.len(), "Stage reached");

        let validation = comfort::validate(&resolution.records);
        stats.coercion_failures = validation.rejected.len();
        stats.evaluated = validation.inputs.len();
        info!(stage = %Stage::NumericValidated, records = stats.evaluated, "Stage reached");

        let evaluator = Evaluator::new(Arc::clone(&self.model), self.config.evaluator);
        let evaluations = evaluator.evaluate_batch(&validation.inputs).await;
        let stats = stats.with_tally(Tally::of(&evaluations));
        info!(stage = %Stage::Evaluated, succeeded = stats.succeeded, "Stage reached");

        Ok(Processed {
            aligned: alignment.records,
            resolved: resolution.records,
            evaluations,
            stats,
        })
    }

    /// Writes the three artifacts and the run summary.
    pub fn persist(&self, processed: &Processed) -> Result<Artifacts, PipelineError> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let artifacts = Artifacts {
            merged: self.config.output_path(output::MERGED_FILE),
            clo_met: self.config.output_path(output::CLO_MET_FILE),
            results: self.config.output_path(output::RESULTS_FILE),
            summary: self.config.output_path(output::SUMMARY_FILE),
        };

        output::write_merged(&artifacts.merged, &processed.aligned)?;
        output::write_clo_met(&artifacts.clo_met, &processed.resolved)?;
        output::write_results(&artifacts.results, &processed.evaluations)?;
        output::write_summary(&artifacts.summary, &processed.stats)?;

        info!(stage = %Stage::Persisted, output_dir = %self.config.output_dir.display(), "Stage reached");
        Ok(artifacts)
    }
}
