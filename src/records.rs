//! Record types flowing through the pipeline.
//!
//! Each stage produces a new sequence of its own record type; nothing is
//! mutated across stage boundaries.

use chrono::NaiveDateTime;

/// A row as read from a source table, before its timestamp is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord<T> {
    pub time: String,
    pub partition_key: String,
    pub payload: T,
}

/// A record with a valid parsed timestamp and a canonical partition key.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRecord<T> {
    pub timestamp: NaiveDateTime,
    pub partition_key: String,
    pub payload: T,
}

/// Free-text answers from one survey respondent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyResponse {
    pub clothing: String,
    pub activity: String,
}

/// One physical measurement, kept as source text until numeric validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub tdb: String,
    pub tr: String,
    pub vr: String,
    pub rh: String,
}

pub type SurveyRecord = TimedRecord<SurveyResponse>;
pub type EnvironmentRecord = TimedRecord<Measurement>;

/// A survey response paired with its nearest measurement, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    pub partition_key: String,
    pub survey_time: NaiveDateTime,
    pub survey: SurveyResponse,
    /// `None` when the partition has no candidate (or none within tolerance).
    pub matched_time: Option<NaiveDateTime>,
    pub environment: Option<Measurement>,
}

impl AlignedRecord {
    pub fn is_join_miss(&self) -> bool {
        self.environment.is_none()
    }
}

/// An aligned record with clothing insulation and metabolic rate looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub aligned: AlignedRecord,
    pub clo: Option<f64>,
    pub met: Option<f64>,
}

/// Fully numeric input to the comfort model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortInput {
    pub tdb: f64,
    pub tr: f64,
    pub vr: f64,
    pub rh: f64,
    pub met: f64,
    pub clo: f64,
}

/// PMV/PPD pair returned by a comfort model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortResult {
    pub pmv: f64,
    pub ppd: f64,
}
