//! Library-side run configuration.

use chrono::Duration;
use std::path::PathBuf;

use crate::align::DEFAULT_TIMESTAMP_FORMAT;
use crate::comfort::EvaluatorConfig;

/// Where to read, where to write, and how to align and evaluate.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub survey_file: String,
    pub environment_file: String,
    /// Whether the source tables start with a header row.
    pub has_headers: bool,
    pub timestamp_format: String,
    /// Largest accepted survey/measurement time gap; `None` accepts any.
    pub tolerance: Option<Duration>,
    pub evaluator: EvaluatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            survey_file: "survey_responses.csv".to_string(),
            environment_file: "physical_parameters.csv".to_string(),
            has_headers: false,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            tolerance: None,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn survey_path(&self) -> PathBuf {
        self.data_dir.join(&self.survey_file)
    }

    pub fn environment_path(&self) -> PathBuf {
        self.data_dir.join(&self.environment_file)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig::default();
        assert_eq!(config.survey_path(), PathBuf::from("data/survey_responses.csv"));
        assert_eq!(
            config.environment_path(),
            PathBuf::from("data/physical_parameters.csv")
        );
        assert_eq!(
            config.output_path("merged_data.csv"),
            PathBuf::from("output/merged_data.csv")
        );
        assert!(config.tolerance.is_none());
    }
}
