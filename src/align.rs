//! Partitioned nearest-time join of survey responses onto measurements.
//!
//! Both sides are cleaned (malformed timestamps dropped, partition keys
//! canonicalized), stably sorted by timestamp and grouped by partition. Each
//! survey record is then matched to the measurement of the same partition with
//! the smallest absolute time distance, ties going to the earliest candidate.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::records::{AlignedRecord, EnvironmentRecord, RawRecord, SurveyRecord, TimedRecord};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Records that survived timestamp parsing, sorted ascending by time.
#[derive(Debug, Clone)]
pub struct Prepared<T> {
    pub records: Vec<TimedRecord<T>>,
    pub malformed: usize,
}

/// Parses a timestamp cell, returning `None` on any format mismatch.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), format).ok()
}

/// Canonical text form of a partition key.
///
/// Integral numbers render without a fractional part so `101`, `101.0` and
/// ` 101 ` compare equal. Anything else is kept as trimmed text.
pub fn canonical_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        _ => trimmed.to_string(),
    }
}

/// Drops rows with unparseable timestamps, canonicalizes keys and stably
/// sorts by timestamp.
pub fn prepare<T>(raw: Vec<RawRecord<T>>, format: &str) -> Prepared<T> {
    let mut malformed = 0;
    let mut records: Vec<TimedRecord<T>> = raw
        .into_iter()
        .filter_map(|row| match parse_timestamp(&row.time, format) {
            Some(timestamp) => Some(TimedRecord {
                timestamp,
                partition_key: canonical_key(&row.partition_key),
                payload: row.payload,
            }),
            None => {
                malformed += 1;
                debug!(time = %row.time, partition = %row.partition_key, "Dropping row with malformed timestamp");
                None
            }
        })
        .collect();

    // sort_by_key is stable: equal timestamps keep file order
    records.sort_by_key(|r| r.timestamp);

    Prepared { records, malformed }
}

fn distance(a: NaiveDateTime, b: NaiveDateTime) -> Duration {
    if a >= b { a - b } else { b - a }
}

/// For each survey time, the index of the nearest environment time.
///
/// Both slices must be sorted ascending. Runs as a single merge-style sweep.
/// On equal distance the earlier candidate wins, and among duplicate
/// timestamps the first in sort order is chosen. Candidates farther than
/// `tolerance` are rejected.
fn nearest_indices(
    survey_times: &[NaiveDateTime],
    env_times: &[NaiveDateTime],
    tolerance: Option<Duration>,
) -> Vec<Option<usize>> {
    debug_assert!(survey_times.is_sorted());
    debug_assert!(env_times.is_sorted());

    let mut out = Vec::with_capacity(survey_times.len());
    // first index with env time > t
    let mut upper = 0;
    // first index of the duplicate run that ends at upper - 1
    let mut run_start = 0;

    for &t in survey_times {
        while upper < env_times.len() && env_times[upper] <= t {
            if upper == 0 || env_times[upper] != env_times[upper - 1] {
                run_start = upper;
            }
            upper += 1;
        }

        let before = (upper > 0).then_some(run_start);
        let after = (upper < env_times.len()).then_some(upper);

        let best = match (before, after) {
            (Some(b), Some(a)) => {
                if t - env_times[b] <= env_times[a] - t {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        };

        out.push(best.filter(|&i| tolerance.is_none_or(|tol| distance(env_times[i], t) <= tol)));
    }

    out
}

/// Aligns one partition. Both sides must already be sorted by timestamp.
fn align_partition(
    surveys: &[SurveyRecord],
    environment: &[EnvironmentRecord],
    tolerance: Option<Duration>,
) -> Vec<AlignedRecord> {
    let survey_times: Vec<_> = surveys.iter().map(|s| s.timestamp).collect();
    let env_times: Vec<_> = environment.iter().map(|e| e.timestamp).collect();

    nearest_indices(&survey_times, &env_times, tolerance)
        .into_iter()
        .zip(surveys)
        .map(|(hit, survey)| {
            let matched = hit.map(|i| &environment[i]);
            AlignedRecord {
                partition_key: survey.partition_key.clone(),
                survey_time: survey.timestamp,
                survey: survey.payload.clone(),
                matched_time: matched.map(|e| e.timestamp),
                environment: matched.map(|e| e.payload.clone()),
            }
        })
        .collect()
}

/// Aligned output together with join bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub records: Vec<AlignedRecord>,
    pub partitions: usize,
    pub unmatched_partitions: usize,
    pub join_misses: usize,
}

/// Aligns every survey record, one blocking task per partition.
///
/// Each partition is stably sorted by timestamp before matching, so callers
/// may pass records in any order. Output holds exactly one record per input
/// survey record, in input order.
#[tracing::instrument(skip_all, fields(surveys = surveys.len(), measurements = environment.len()))]
pub async fn align(
    surveys: Vec<SurveyRecord>,
    environment: Vec<EnvironmentRecord>,
    tolerance: Option<Duration>,
) -> Result<Alignment> {
    let total = surveys.len();

    let mut survey_groups: BTreeMap<String, Vec<(usize, SurveyRecord)>> = BTreeMap::new();
    for (position, record) in surveys.into_iter().enumerate() {
        survey_groups
            .entry(record.partition_key.clone())
            .or_default()
            .push((position, record));
    }

    let mut env_groups: HashMap<String, Vec<EnvironmentRecord>> = HashMap::new();
    for record in environment {
        env_groups
            .entry(record.partition_key.clone())
            .or_default()
            .push(record);
    }

    let partitions = survey_groups.len();
    let mut unmatched_partitions = 0;
    let mut tasks = Vec::with_capacity(partitions);

    for (key, mut group) in survey_groups {
        let mut candidates = env_groups.remove(&key).unwrap_or_default();
        if candidates.is_empty() {
            unmatched_partitions += 1;
            debug!(partition = %key, surveys = group.len(), "No measurements for partition");
        }

        let task = tokio::task::spawn_blocking(move || {
            // stable: equal timestamps keep input order
            group.sort_by_key(|(_, record)| record.timestamp);
            candidates.sort_by_key(|record| record.timestamp);

            let (positions, group): (Vec<usize>, Vec<SurveyRecord>) = group.into_iter().unzip();
            let aligned = align_partition(&group, &candidates, tolerance);
            (key, positions, aligned)
        });
        tasks.push(task);
    }

    let mut slots: Vec<Option<AlignedRecord>> = vec![None; total];
    let mut join_misses = 0;

    for task in tasks {
        let (key, positions, aligned) = task.await.context("partition alignment task failed")?;
        let misses = aligned.iter().filter(|r| r.is_join_miss()).count();
        debug!(partition = %key, records = aligned.len(), misses, "Partition aligned");
        join_misses += misses;
        for (position, record) in positions.into_iter().zip(aligned) {
            slots[position] = Some(record);
        }
    }

    let records: Vec<AlignedRecord> = slots.into_iter().flatten().collect();
    debug_assert_eq!(records.len(), total);

    info!(
        records = records.len(),
        partitions,
        unmatched_partitions,
        join_misses,
        "Alignment complete"
    );

    Ok(Alignment {
        records,
        partitions,
        unmatched_partitions,
        join_misses,
    })
}
