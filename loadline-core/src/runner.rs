//! Journey execution
//!
//! [`JourneyRunner`] walks one session through one journey: steps run
//! strictly in order, think time is inserted before every request but the
//! first, and the run's stop flag is honoured at every step boundary. Failed
//! checks never end an iteration; only a request that yields no response
//! does.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::check::check;
use crate::control::RunControl;
use crate::error::EngineError;
use crate::harvest::IdHarvester;
use crate::journey::{Journey, Step};
use crate::metrics::{names, MetricsRegistry, Tags};
use crate::request::{RequestDescriptor, RequestExecutor, Response};
use crate::session::Session;
use crate::template::{BuildContext, DataPools};
use crate::think_time::ThinkTime;

/// How an iteration ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IterationOutcome {
    /// Every step ran
    Completed,
    /// A step produced no response; the remaining steps were skipped
    Incomplete { step: String, error: String },
    /// The run began stopping; `after_step` steps had fully run
    Truncated { after_step: usize },
}

/// Result of one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub journey: String,
    pub outcome: IterationOutcome,
    pub steps_executed: usize,
    /// Failed check predicates across all steps
    pub checks_failed: usize,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl IterationResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == IterationOutcome::Completed
    }
}

/// Executes journeys against a [`RequestExecutor`]
pub struct JourneyRunner {
    executor: Arc<dyn RequestExecutor>,
    metrics: MetricsRegistry,
    control: RunControl,
    harvester: IdHarvester,
    think_time: ThinkTime,
    pools: Arc<DataPools>,
    slow_request: Option<Duration>,
    host: String,
    default_headers: Vec<(String, String)>,
}

impl JourneyRunner {
    /// Create a new runner with think time disabled and no data pools
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        metrics: MetricsRegistry,
        control: RunControl,
        harvester: IdHarvester,
    ) -> Self {
        Self {
            executor,
            metrics,
            control,
            harvester,
            think_time: ThinkTime::disabled(),
            pools: Arc::new(DataPools::new()),
            slow_request: None,
            host: "default".to_string(),
            default_headers: Vec::new(),
        }
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn with_pools(mut self, pools: Arc<DataPools>) -> Self {
        self.pools = pools;
        self
    }

    /// Flag responses slower than `bound` in the degradation rate
    pub fn with_slow_request(mut self, bound: Option<Duration>) -> Self {
        self.slow_request = bound;
        self
    }

    /// Logical host cookies are scoped to
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Headers added to every request that does not set them itself
    pub fn with_default_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.default_headers = headers;
        self
    }

    /// Replace the static identifier list
    pub fn with_fallback_ids(mut self, ids: Vec<String>) -> Self {
        self.harvester = self.harvester.with_fallback(ids);
        self
    }

    pub fn fallback_ids(&self) -> &[String] {
        self.harvester.fallback()
    }

    /// Walk `session` through `journey`
    pub async fn run_journey<R: Rng + Send>(
        &self,
        journey: &Journey,
        session: &mut Session,
        rng: &mut R,
    ) -> IterationResult {
        let started = Instant::now();
        let mut journey_tags = Tags::new();
        journey_tags.insert(names::TAG_JOURNEY.to_string(), journey.name.clone());

        let mut requests_sent = 0usize;
        let mut steps_executed = 0usize;
        let mut checks_failed = 0usize;

        for step in &journey.steps {
            let repetitions = match step.repeat {
                Some(repeat) => rng.random_range(repeat.min..=repeat.max),
                None => 1,
            };

            for _ in 0..repetitions {
                if self.control.is_stopping() {
                    return self.finish(
                        journey,
                        IterationOutcome::Truncated {
                            after_step: steps_executed,
                        },
                        steps_executed,
                        checks_failed,
                        started,
                        &journey_tags,
                    );
                }

                if requests_sent > 0
                    && step.think_time_eligible
                    && !self.think_time.pause(rng, &self.control).await
                {
                    return self.finish(
                        journey,
                        IterationOutcome::Truncated {
                            after_step: steps_executed,
                        },
                        steps_executed,
                        checks_failed,
                        started,
                        &journey_tags,
                    );
                }

                match self.execute_step(step, &journey_tags, session, rng).await {
                    Ok(failed) => {
                        checks_failed += failed;
                        requests_sent += 1;
                    }
                    Err(error) => {
                        return self.finish(
                            journey,
                            IterationOutcome::Incomplete {
                                step: step.label.clone(),
                                error,
                            },
                            steps_executed,
                            checks_failed,
                            started,
                            &journey_tags,
                        );
                    }
                }
            }
            steps_executed += 1;
        }

        self.finish(
            journey,
            IterationOutcome::Completed,
            steps_executed,
            checks_failed,
            started,
            &journey_tags,
        )
    }

    /// Issue one request for `step` and score it.
    /// Returns the number of failed checks, or the transport error.
    async fn execute_step<R: Rng + Send>(
        &self,
        step: &Step,
        journey_tags: &Tags,
        session: &mut Session,
        rng: &mut R,
    ) -> Result<usize, String> {
        let mut step_tags = journey_tags.clone();
        step_tags.extend(step.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        step_tags.insert(names::TAG_STEP.to_string(), step.label.clone());

        let request = match self.build_request(step, session, rng) {
            Ok(request) => request.with_tags(step_tags.clone()),
            Err(err) => {
                self.record_unreachable(step, &step_tags, "template");
                warn!(step = %step.label, error = %err, "Could not build request, ending iteration");
                return Err(err.to_string());
            }
        };

        let sent = Instant::now();
        let result = self.executor.execute(request).await;
        let latency = sent.elapsed();
        self.metrics.add_counter(names::HTTP_REQS, 1.0, &step_tags);

        match result {
            Ok(response) => Ok(self.score(step, &step_tags, session, &response, latency)),
            Err(err) => {
                self.record_unreachable(step, &step_tags, err.kind());
                warn!(step = %step.label, error = %err, "Request failed, ending iteration");
                Err(err.to_string())
            }
        }
    }

    fn build_request<R: Rng>(
        &self,
        step: &Step,
        session: &mut Session,
        rng: &mut R,
    ) -> Result<RequestDescriptor, EngineError> {
        let mut ctx = BuildContext {
            host: &self.host,
            pools: &self.pools,
            fallback_ids: self.harvester.fallback(),
            rng,
        };
        let mut request = step.request.build(session, &mut ctx)?;
        for (name, value) in &self.default_headers {
            if request.header(name).is_none() {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        Ok(request)
    }

    fn score(
        &self,
        step: &Step,
        step_tags: &Tags,
        session: &mut Session,
        response: &Response,
        latency: Duration,
    ) -> usize {
        session.cookies_mut().absorb(&self.host, &response.set_cookies);

        let millis = latency.as_secs_f64() * 1000.0;
        self.metrics.add_trend(names::HTTP_REQ_DURATION, millis, step_tags);
        self.metrics
            .add_rate(names::HTTP_REQ_FAILED, !response.is_success(), step_tags);
        if let Some(bound) = self.slow_request {
            self.metrics
                .add_rate(names::DEGRADATION_RATE, latency > bound, step_tags);
        }

        if step.harvest_ids {
            let harvest = self.harvester.harvest(&response.body, session);
            debug!(
                step = %step.label,
                found = harvest.found,
                added = harvest.added,
                used_fallback = harvest.used_fallback,
                "Harvested identifiers"
            );
        }

        let outcome = check(response, &step.label, &step.checks, &self.metrics, step_tags);
        self.metrics
            .add_rate(names::STEP_SUCCESS, outcome.passed, step_tags);
        if let Some(metric) = &step.timing_metric {
            self.metrics.add_trend(metric, millis, step_tags);
        }
        outcome.failed()
    }

    fn record_unreachable(&self, step: &Step, step_tags: &Tags, kind: &str) {
        let mut error_tags = step_tags.clone();
        error_tags.insert(names::TAG_KIND.to_string(), kind.to_string());
        self.metrics.add_counter(names::TRANSPORT_ERRORS, 1.0, &error_tags);
        self.metrics.add_rate(names::HTTP_REQ_FAILED, true, step_tags);
        self.metrics.add_rate(names::STEP_SUCCESS, false, step_tags);
        step.checks.record_unreachable(&self.metrics, step_tags);
    }

    fn finish(
        &self,
        journey: &Journey,
        outcome: IterationOutcome,
        steps_executed: usize,
        checks_failed: usize,
        started: Instant,
        journey_tags: &Tags,
    ) -> IterationResult {
        let duration = started.elapsed();
        match &outcome {
            IterationOutcome::Completed => {
                self.metrics.add_counter(names::ITERATIONS, 1.0, journey_tags);
                self.metrics.add_trend(
                    names::ITERATION_DURATION,
                    duration.as_secs_f64() * 1000.0,
                    journey_tags,
                );
            }
            IterationOutcome::Incomplete { .. } => {
                self.metrics
                    .add_counter(names::INCOMPLETE_ITERATIONS, 1.0, journey_tags);
            }
            IterationOutcome::Truncated { .. } => {
                self.metrics
                    .add_counter(names::TRUNCATED_ITERATIONS, 1.0, journey_tags);
            }
        }

        debug!(
            journey = %journey.name,
            outcome = ?outcome,
            steps_executed,
            checks_failed,
            duration_ms = duration.as_millis() as u64,
            "Iteration finished"
        );

        IterationResult {
            journey: journey.name.clone(),
            outcome,
            steps_executed,
            checks_failed,
            duration,
        }
    }

    /// Run `step` once outside of any iteration and return the identifiers
    /// found in its response. Nothing is recorded in the metrics.
    pub async fn preload_identifiers<R: Rng + Send>(&self, step: &Step, rng: &mut R) -> Vec<String> {
        let mut session = Session::new();
        let request = match self.build_request(step, &mut session, rng) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Setup request could not be built");
                return Vec::new();
            }
        };

        match self.executor.execute(request).await {
            Ok(response) if response.is_success() => self.harvester.extract(&response.body),
            Ok(response) => {
                warn!(status = response.status, "Setup request was not served");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "Setup request failed");
                Vec::new()
            }
        }
    }
}
