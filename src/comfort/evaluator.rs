//! Batch evaluation with per-record fault isolation.
//!
//! Every record runs as its own blocking task under a concurrency limit and a
//! time budget. A domain error, panic or overrun in one record turns into an
//! absent result for that record and nothing else.
//!
//! The budget clock starts when the model call starts running, not when it is
//! queued. A concurrency permit stays taken until the call really returns, so
//! an overrunning call that is still burning a blocking thread keeps its slot.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, warn};

use crate::comfort::model::{ComfortModel, Standard};
use crate::error::ModelError;
use crate::records::{ComfortInput, ComfortResult};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(1000);

/// How a single evaluation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(ComfortResult),
    DomainFailure(ModelError),
    TimedOut,
    Panicked(String),
}

impl Outcome {
    /// The result, present only for a successful evaluation.
    pub fn result(&self) -> Option<ComfortResult> {
        match self {
            Outcome::Ok(result) => Some(*result),
            _ => None,
        }
    }
}

/// One evaluated input.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub input: ComfortInput,
    pub outcome: Outcome,
}

/// Per-outcome counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub succeeded: usize,
    pub domain_failures: usize,
    pub timed_out: usize,
    pub panicked: usize,
}

impl Tally {
    pub fn of(evaluations: &[Evaluation]) -> Self {
        let mut tally = Tally::default();
        for evaluation in evaluations {
            match evaluation.outcome {
                Outcome::Ok(_) => tally.succeeded += 1,
                Outcome::DomainFailure(_) => tally.domain_failures += 1,
                Outcome::TimedOut => tally.timed_out += 1,
                Outcome::Panicked(_) => tally.panicked += 1,
            }
        }
        tally
    }

    pub fn failed(&self) -> usize {
        self.domain_failures + self.timed_out + self.panicked
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    pub concurrency: usize,
    /// Wall-clock budget for one model call, counted from when it starts.
    pub budget: Duration,
    pub standard: Standard,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            budget: DEFAULT_BUDGET,
            standard: Standard::default(),
        }
    }
}

/// Runs a [`ComfortModel`] over a batch of inputs.
#[derive(Clone)]
pub struct Evaluator {
    model: Arc<dyn ComfortModel>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(model: Arc<dyn ComfortModel>, config: EvaluatorConfig) -> Self {
        Self { model, config }
    }

    /// Evaluates every input independently. Results come back in input order.
    ///
    /// Nothing is retried: the model is deterministic, so a failure would
    /// just repeat.
    #[tracing::instrument(skip_all, fields(inputs = inputs.len(), standard = %self.config.standard))]
    pub async fn evaluate_batch(&self, inputs: &[ComfortInput]) -> Vec<Evaluation> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(inputs.len());

        for &input in inputs {
            let sem = semaphore.clone();
            let model = Arc::clone(&self.model);
            let EvaluatorConfig {
                budget, standard, ..
            } = self.config;

            tasks.push(tokio::spawn(async move {
                let permit = sem.acquire_owned().await.ok();
                let (started_tx, started_rx) = oneshot::channel();
                let call = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _ = started_tx.send(());
                    model.evaluate(&input, standard)
                });

                // a closed channel means the call never ran; the join result says why
                let _ = started_rx.await;
                match tokio::time::timeout(budget, call).await {
                    Ok(Ok(Ok(result))) => Outcome::Ok(result),
                    Ok(Ok(Err(e))) => Outcome::DomainFailure(e),
                    Ok(Err(e)) => Outcome::Panicked(e.to_string()),
                    Err(_) => Outcome::TimedOut,
                }
            }));
        }

        let mut evaluations = Vec::with_capacity(inputs.len());
        for (position, (&input, task)) in inputs.iter().zip(tasks).enumerate() {
            let outcome = task
                .await
                .unwrap_or_else(|e| Outcome::Panicked(e.to_string()));

            match &outcome {
                Outcome::Ok(_) => {}
                Outcome::DomainFailure(e) => {
                    debug!(position, error = %e, "Input outside model domain")
                }
                Outcome::TimedOut => {
                    warn!(position, budget_ms = self.config.budget.as_millis() as u64, "Model call exceeded budget")
                }
                Outcome::Panicked(msg) => warn!(position, error = %msg, "Model call panicked"),
            }

            evaluations.push(Evaluation { input, outcome });
        }

        let tally = Tally::of(&evaluations);
        info!(
            succeeded = tally.succeeded,
            failed = tally.failed(),
            domain_failures = tally.domain_failures,
            timed_out = tally.timed_out,
            panicked = tally.panicked,
            "Evaluation complete"
        );

        evaluations
    }
}
