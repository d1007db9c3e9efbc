//! CLI entry point for the comfort rater.
//!
//! Aligns comfort survey responses with room measurements and computes
//! PMV/PPD for every complete record.

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfort_rater::comfort::{ComfortModel, EvaluatorConfig, Iso7730, Standard};
use comfort_rater::config::PipelineConfig;
use comfort_rater::output::print_json;
use comfort_rater::pipeline::Pipeline;
use comfort_rater::error::ModelError;
use comfort_rater::records::{ComfortInput, ComfortResult};
use comfort_rater::resolve::{ACTIVITY_METABOLIC_RATE, CLOTHING_INSULATION};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "comfort_rater")]
#[command(about = "Match comfort surveys to room measurements and compute PMV/PPD", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align, resolve, evaluate and write all artifacts
    Run {
        /// Directory holding the input tables
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory the artifacts are written to
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Survey table file name inside the data directory
        #[arg(long, default_value = "survey_responses.csv")]
        survey_file: String,

        /// Environment table file name inside the data directory
        #[arg(long, default_value = "physical_parameters.csv")]
        environment_file: String,

        /// Input tables start with a header row
        #[arg(long, default_value_t = false)]
        with_headers: bool,

        /// chrono format of the time column
        #[arg(long, default_value = "%m/%d/%Y %H:%M:%S")]
        timestamp_format: String,

        /// Reject matches further apart than this many minutes
        #[arg(long)]
        tolerance_minutes: Option<i64>,

        /// Maximum number of concurrent model evaluations
        #[arg(short, long, default_value_t = 8)]
        concurrency: usize,

        /// Time budget for a single model evaluation, in milliseconds
        #[arg(long, default_value_t = 1000)]
        budget_ms: u64,

        /// Comfort standard to evaluate against
        #[arg(long, default_value = "7730-2005")]
        standard: Standard,

        /// Evaluate outside the ISO 7730 applicability limits
        #[arg(long, default_value_t = false)]
        no_limit_inputs: bool,
    },
    /// Evaluate PMV/PPD for a single set of conditions
    Pmv {
        /// Dry-bulb air temperature, °C
        #[arg(long)]
        tdb: f64,
        /// Mean radiant temperature, °C
        #[arg(long)]
        tr: f64,
        /// Relative air velocity, m/s
        #[arg(long)]
        vr: f64,
        /// Relative humidity, %
        #[arg(long)]
        rh: f64,
        /// Metabolic rate, met
        #[arg(long)]
        met: f64,
        /// Clothing insulation, clo
        #[arg(long)]
        clo: f64,
        #[arg(long, default_value_t = false)]
        no_limit_inputs: bool,
    },
    /// List the clothing and activity lookup tables
    Lookup,
}

/// Evaluates one set of conditions against ISO 7730.
fn evaluate_point(input: &ComfortInput, limit_inputs: bool) -> Result<ComfortResult, ModelError> {
    let model = Iso7730 {
        limit_inputs,
        ..Iso7730::default()
    };
    model.evaluate(input, Standard::Iso7730)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/comfort_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("comfort_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data_dir,
            output_dir,
            survey_file,
            environment_file,
            with_headers,
            timestamp_format,
            tolerance_minutes,
            concurrency,
            budget_ms,
            standard,
            no_limit_inputs,
        } => {
            let config = PipelineConfig {
                data_dir,
                output_dir,
                survey_file,
                environment_file,
                has_headers: with_headers,
                timestamp_format,
                tolerance: tolerance_minutes.map(chrono::Duration::minutes),
                evaluator: EvaluatorConfig {
                    concurrency,
                    budget: Duration::from_millis(budget_ms),
                    standard,
                },
            };
            let model = Iso7730 {
                limit_inputs: !no_limit_inputs,
                ..Iso7730::default()
            };

            let pipeline = Pipeline::new(config, Arc::new(model));
            let report = match pipeline.run().await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Run aborted");
                    return Err(e.into());
                }
            };

            print_json(&report.stats)?;
            info!(
                success_pct = report.stats.success_pct(),
                join_miss_pct = report.stats.join_miss_pct(),
                results = %report.artifacts.results.display(),
                "Run complete"
            );
        }
        Commands::Pmv {
            tdb,
            tr,
            vr,
            rh,
            met,
            clo,
            no_limit_inputs,
        } => {
            let input = ComfortInput {
                tdb,
                tr,
                vr,
                rh,
                met,
                clo,
            };

            match evaluate_point(&input, !no_limit_inputs) {
                Ok(result) => info!(pmv = result.pmv, ppd = result.ppd, "Comfort evaluated"),
                Err(e) => {
                    error!(error = %e, "Input outside model domain");
                    return Err(e.into());
                }
            }
        }
        Commands::Lookup => {
            for (descriptor, clo) in CLOTHING_INSULATION {
                info!(clo, descriptor, "Clothing");
            }
            for (descriptor, met) in ACTIVITY_METABOLIC_RATE {
                info!(met, descriptor, "Activity");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral() -> ComfortInput {
        ComfortInput {
            tdb: 22.0,
            tr: 22.0,
            vr: 0.1,
            rh: 50.0,
            met: 1.2,
            clo: 0.5,
        }
    }

    #[test]
    fn test_evaluate_point_neutral_conditions() {
        let result = evaluate_point(&neutral(), true).unwrap();
        assert!((0.0..=100.0).contains(&result.ppd));
    }

    #[test]
    fn test_evaluate_point_out_of_domain_is_error() {
        let input = ComfortInput {
            rh: 150.0,
            ..neutral()
        };
        assert!(evaluate_point(&input, true).is_err());
        assert!(evaluate_point(&input, false).is_err());
    }
}
