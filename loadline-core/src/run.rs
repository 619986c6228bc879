//! One load run from start to report
//!
//! [`LoadRun`] wires a [`ScenarioProfile`] to a [`RequestExecutor`]: it runs
//! the optional setup step, starts the threshold monitor, drives the
//! scheduler, drains in-flight iterations within the graceful stop window and
//! finally evaluates every threshold into a [`RunReport`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::control::{RunControl, StopReason};
use crate::error::EngineResult;
use crate::harvest::IdHarvester;
use crate::metrics::MetricsRegistry;
use crate::profile::ScenarioProfile;
use crate::report::RunReport;
use crate::request::RequestExecutor;
use crate::runner::JourneyRunner;
use crate::scheduler::{drain, SchedulePlan, Scheduler};
use crate::selector::WeightedSelector;
use crate::session::Session;
use crate::state::RunState;
use crate::threshold::{evaluate_all, ThresholdSpec};

/// A prepared run
pub struct LoadRun {
    run_id: Uuid,
    profile: ScenarioProfile,
    executor: Arc<dyn RequestExecutor>,
    control: RunControl,
}

impl LoadRun {
    /// Create a new run; fails if the profile is invalid
    pub fn new(profile: ScenarioProfile, executor: Arc<dyn RequestExecutor>) -> EngineResult<Self> {
        profile.validate()?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            profile,
            executor,
            control: RunControl::new(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn profile(&self) -> &ScenarioProfile {
        &self.profile
    }

    /// Handle for stopping the run from outside
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Execute the run to completion
    pub async fn execute(self) -> EngineResult<RunReport> {
        let Self {
            run_id,
            profile,
            executor,
            control,
        } = self;

        let mut master = match profile.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let metrics = MetricsRegistry::new();
        let selector = WeightedSelector::new(&profile.catalog)?;
        let harvester = IdHarvester::new(&profile.id_pattern, profile.fallback_ids.clone())?;

        let mut runner = JourneyRunner::new(executor, metrics.clone(), control.clone(), harvester)
            .with_think_time(profile.think_time)
            .with_pools(Arc::new(profile.pools.clone()))
            .with_slow_request(profile.slow_request)
            .with_host(profile.host.clone())
            .with_default_headers(profile.default_headers.clone());

        if let Some(step) = &profile.setup {
            let ids = runner.preload_identifiers(step, &mut master).await;
            if ids.is_empty() {
                info!(
                    fallback = runner.fallback_ids().len(),
                    "Setup found no identifiers, using the static list"
                );
            } else {
                info!(count = ids.len(), "Setup discovered identifiers");
                runner = runner.with_fallback_ids(ids);
            }
        }

        let runner = Arc::new(runner);
        let catalog = Arc::new(profile.catalog.clone());
        let target_end = match &profile.scheduler.plan {
            SchedulePlan::Arrival { profile: rate } => Some(rate.total_duration()),
            SchedulePlan::Iterations { .. } => None,
        };
        let state = Arc::new(RunState::new(metrics, target_end));

        info!(
            %run_id,
            profile = %profile.name,
            journeys = ?catalog.names(),
            thresholds = profile.thresholds.len(),
            "Run started"
        );

        let monitor = spawn_threshold_monitor(
            &profile.thresholds,
            profile.threshold_interval,
            Arc::clone(&state),
            control.clone(),
        );

        let started = Instant::now();
        let scheduler = Scheduler::new(profile.scheduler.clone(), control.clone(), Arc::clone(&state))?;
        let mut tasks = scheduler
            .run(|_| {
                let journey_index = selector.select_index(&mut master);
                let seed: u64 = master.random();
                let runner = Arc::clone(&runner);
                let catalog = Arc::clone(&catalog);
                let state = Arc::clone(&state);
                async move {
                    let journey = &catalog.journeys()[journey_index];
                    let mut rng = StdRng::seed_from_u64(seed);
                    let mut session = Session::new();
                    let result = runner.run_journey(journey, &mut session, &mut rng).await;
                    state.record_iteration(&result);
                }
            })
            .await;

        match &profile.scheduler.plan {
            SchedulePlan::Arrival { .. } => {
                control.stop(StopReason::DurationElapsed);
            }
            SchedulePlan::Iterations { max_duration, .. } => {
                await_iterations(&mut tasks, &control, started + *max_duration).await;
            }
        }

        let interrupted = drain(tasks, profile.graceful_stop, &state).await;
        if interrupted > 0 {
            warn!(interrupted, "Iterations were interrupted after the graceful stop");
        }
        if let Some(monitor) = monitor {
            monitor.abort();
        }

        let outcomes = evaluate_all(&profile.thresholds, state.metrics(), state.elapsed());
        let report = RunReport::build(
            run_id,
            profile.name.clone(),
            &state,
            control.reason(),
            &profile.thresholds,
            outcomes,
        );

        info!(
            %run_id,
            verdict = %report.verdict,
            issued = report.counters.issued,
            completed = report.counters.completed,
            duration_secs = report.duration_secs,
            "Run finished"
        );
        Ok(report)
    }
}

/// Wait until every issued iteration of a fixed plan has finished, the
/// deadline passes or the run is stopped
async fn await_iterations(tasks: &mut JoinSet<()>, control: &RunControl, deadline: Instant) {
    loop {
        tokio::select! {
            biased;
            _ = control.cancelled() => return,
            _ = sleep_until(deadline) => {
                control.stop(StopReason::DurationElapsed);
                return;
            }
            next = tasks.join_next() => match next {
                None => {
                    control.stop(StopReason::IterationsExhausted);
                    return;
                }
                Some(Err(err)) if err.is_panic() => error!("Iteration task panicked: {}", err),
                Some(_) => {}
            },
        }
    }
}

/// Periodically evaluate abort-on-fail thresholds; the first violation
/// marks the run aborted and stops it
fn spawn_threshold_monitor(
    thresholds: &[ThresholdSpec],
    interval: Duration,
    state: Arc<RunState>,
    control: RunControl,
) -> Option<JoinHandle<()>> {
    let aborting: Vec<ThresholdSpec> = thresholds
        .iter()
        .filter(|threshold| threshold.abort_on_fail)
        .cloned()
        .collect();
    if aborting.is_empty() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = control.cancelled() => return,
                _ = ticker.tick() => {}
            }

            for threshold in &aborting {
                let outcome = threshold.evaluate(state.metrics(), state.elapsed());
                if outcome.passed {
                    continue;
                }

                warn!(
                    threshold = %threshold.key,
                    expression = %threshold.expression,
                    observed = ?outcome.observed,
                    "Abort-on-fail threshold breached"
                );
                let reason = StopReason::ThresholdBreached {
                    threshold: format!("{} {}", threshold.key, threshold.expression),
                };
                if control.stop(reason) {
                    state.set_aborted();
                }
                return;
            }
        }
    }))
}
