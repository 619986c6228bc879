//! Open-model arrival scheduler
//!
//! Iterations are started on a timeline computed from the target rate, never
//! from iteration completions: iteration `k` is due at the moment the
//! cumulative number of arrivals `N(t) = ∫ rate` reaches `k`. The timeline is
//! evaluated analytically per ramp segment, so stage transitions change the
//! spacing smoothly and a late loop never bursts to catch up.
//!
//! Concurrency is bounded by a semaphore of `max_concurrency` permits. The
//! pool starts at `pre_allocated` workers and grows on demand up to the cap;
//! once saturated, due iterations are dropped or delayed per the overflow
//! policy and counted either way.

use loadline_config::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::control::{RunControl, StopReason};
use crate::error::{EngineError, EngineResult};
use crate::metrics::{names, Tags};
use crate::state::RunState;

/// Minimum spacing between "pool saturated" warnings
const DROP_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// One ramp stage: move linearly to `target` over `duration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Iterations per second reached at the end of the stage
    pub target: f64,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: f64, duration: Duration) -> Self {
        Self { target, duration }
    }
}

/// Target arrival rate as a function of elapsed time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateProfile {
    /// Fixed iterations per second
    Constant {
        rate: f64,
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Piecewise-linear ramp through `stages`, starting at `start_rate`
    Ramping { start_rate: f64, stages: Vec<Stage> },
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    duration: f64,
    from: f64,
    to: f64,
}

impl Segment {
    fn arrivals(&self) -> f64 {
        (self.from + self.to) / 2.0 * self.duration
    }

    /// Arrivals in the first `offset` seconds of the segment
    fn arrivals_until(&self, offset: f64) -> f64 {
        let slope = (self.to - self.from) / self.duration;
        self.from * offset + slope * offset * offset / 2.0
    }

    /// Seconds into the segment at which `count` arrivals have accumulated.
    /// Solves `a·τ² + b·τ = count` with the cancellation-free root.
    fn offset_of(&self, count: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        let a = (self.to - self.from) / (2.0 * self.duration);
        let b = self.from;
        let offset = if a.abs() < 1e-12 {
            count / b
        } else {
            let discriminant = (b * b + 4.0 * a * count).max(0.0);
            2.0 * count / (b + discriminant.sqrt())
        };
        offset.clamp(0.0, self.duration)
    }
}

impl RateProfile {
    pub fn constant(rate: f64, duration: Duration) -> Self {
        RateProfile::Constant { rate, duration }
    }

    pub fn ramping(start_rate: f64, stages: Vec<Stage>) -> Self {
        RateProfile::Ramping { start_rate, stages }
    }

    fn segments(&self) -> Vec<Segment> {
        match self {
            RateProfile::Constant { rate, duration } => vec![Segment {
                start: 0.0,
                duration: duration.as_secs_f64(),
                from: *rate,
                to: *rate,
            }],
            RateProfile::Ramping { start_rate, stages } => {
                let mut segments = Vec::with_capacity(stages.len());
                let mut start = 0.0;
                let mut from = *start_rate;
                for stage in stages {
                    let duration = stage.duration.as_secs_f64();
                    segments.push(Segment {
                        start,
                        duration,
                        from,
                        to: stage.target,
                    });
                    start += duration;
                    from = stage.target;
                }
                segments
            }
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let valid_rate = |rate: f64| rate.is_finite() && rate >= 0.0;
        match self {
            RateProfile::Constant { rate, duration } => {
                if !rate.is_finite() || *rate <= 0.0 {
                    return Err(EngineError::InvalidSchedule(format!(
                        "constant rate must be positive, got {}",
                        rate
                    )));
                }
                if duration.is_zero() {
                    return Err(EngineError::InvalidSchedule("duration must be positive".to_string()));
                }
            }
            RateProfile::Ramping { start_rate, stages } => {
                if !valid_rate(*start_rate) {
                    return Err(EngineError::InvalidSchedule(format!(
                        "start rate must be non-negative, got {}",
                        start_rate
                    )));
                }
                if stages.is_empty() {
                    return Err(EngineError::InvalidSchedule("ramping profile has no stages".to_string()));
                }
                for (index, stage) in stages.iter().enumerate() {
                    if !valid_rate(stage.target) {
                        return Err(EngineError::InvalidSchedule(format!(
                            "stage {} target must be non-negative, got {}",
                            index, stage.target
                        )));
                    }
                    if stage.duration.is_zero() {
                        return Err(EngineError::InvalidSchedule(format!(
                            "stage {} has zero duration",
                            index
                        )));
                    }
                }
                if self.expected_iterations() <= 0.0 {
                    return Err(EngineError::InvalidSchedule(
                        "ramping profile never issues an iteration".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            RateProfile::Constant { duration, .. } => *duration,
            RateProfile::Ramping { stages, .. } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// Target rate at `elapsed`; zero past the end
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        let t = elapsed.as_secs_f64();
        for segment in self.segments() {
            if t < segment.start + segment.duration {
                let offset = (t - segment.start).max(0.0);
                return segment.from + (segment.to - segment.from) * offset / segment.duration;
            }
        }
        0.0
    }

    /// Cumulative target arrivals over `[0, elapsed]`
    pub fn cumulative(&self, elapsed: Duration) -> f64 {
        let t = elapsed.as_secs_f64();
        let mut total = 0.0;
        for segment in self.segments() {
            if t >= segment.start + segment.duration {
                total += segment.arrivals();
            } else {
                total += segment.arrivals_until((t - segment.start).max(0.0));
                break;
            }
        }
        total
    }

    /// Area under the whole rate curve
    pub fn expected_iterations(&self) -> f64 {
        self.segments().iter().map(Segment::arrivals).sum()
    }

    /// Offset from the run start at which iteration `index` is due, or
    /// `None` if the schedule ends first
    pub fn due_time(&self, index: u64) -> Option<Duration> {
        let target = index as f64;
        let mut accumulated = 0.0;
        for segment in self.segments() {
            let arrivals = segment.arrivals();
            if target < accumulated + arrivals {
                let offset = segment.offset_of(target - accumulated);
                return Some(Duration::from_secs_f64(segment.start + offset));
            }
            accumulated += arrivals;
        }
        None
    }
}

/// How iterations are issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum SchedulePlan {
    /// Open model driven by a rate profile
    Arrival { profile: RateProfile },
    /// A fixed number of iterations shared by the workers, bounded in time
    Iterations {
        count: u64,
        #[serde(with = "humantime_serde")]
        max_duration: Duration,
    },
}

/// Scheduler parameters of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub plan: SchedulePlan,
    /// Workers available from the start
    pub pre_allocated: usize,
    /// Hard cap on concurrent iterations
    pub max_concurrency: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl SchedulerConfig {
    pub fn arrival(profile: RateProfile, pre_allocated: usize, max_concurrency: usize) -> Self {
        Self {
            plan: SchedulePlan::Arrival { profile },
            pre_allocated,
            max_concurrency,
            overflow: OverflowPolicy::Drop,
        }
    }

    pub fn iterations(count: u64, max_duration: Duration, max_concurrency: usize) -> Self {
        Self {
            plan: SchedulePlan::Iterations {
                count,
                max_duration,
            },
            pre_allocated: max_concurrency,
            max_concurrency,
            overflow: OverflowPolicy::Drop,
        }
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::InvalidSchedule("max_concurrency must be positive".to_string()));
        }
        if self.pre_allocated > self.max_concurrency {
            return Err(EngineError::InvalidSchedule(format!(
                "pre_allocated ({}) exceeds max_concurrency ({})",
                self.pre_allocated, self.max_concurrency
            )));
        }
        match &self.plan {
            SchedulePlan::Arrival { profile } => profile.validate(),
            SchedulePlan::Iterations {
                count,
                max_duration,
            } => {
                if *count == 0 || max_duration.is_zero() {
                    return Err(EngineError::InvalidSchedule(
                        "iteration plan needs a positive count and duration".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Longest the issuing phase can last
    pub fn total_duration(&self) -> Duration {
        match &self.plan {
            SchedulePlan::Arrival { profile } => profile.total_duration(),
            SchedulePlan::Iterations { max_duration, .. } => *max_duration,
        }
    }
}

/// Mutable pool bookkeeping owned by the issuing loop
struct Pool {
    permits: Arc<Semaphore>,
    capacity: usize,
    max: usize,
    /// Delayed starts waiting for a permit
    pending: Arc<AtomicUsize>,
    last_drop_log: Option<Instant>,
    suppressed_drops: u64,
}

/// Issues iterations according to a [`SchedulerConfig`]
pub struct Scheduler {
    config: SchedulerConfig,
    control: RunControl,
    state: Arc<RunState>,
}

impl Scheduler {
    /// Create a new scheduler; fails on an invalid configuration
    pub fn new(config: SchedulerConfig, control: RunControl, state: Arc<RunState>) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            control,
            state,
        })
    }

    /// Run the issuing loop until the plan is exhausted or a stop is requested.
    ///
    /// `spawn_iteration(index)` is called at each iteration's start time and
    /// must return the iteration's work; the loop never awaits it. The
    /// returned set holds every iteration still in flight.
    pub async fn run<F, Fut>(&self, spawn_iteration: F) -> JoinSet<()>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pool = Pool {
            permits: Arc::new(Semaphore::new(self.config.max_concurrency)),
            capacity: self.config.pre_allocated,
            max: self.config.max_concurrency,
            pending: Arc::new(AtomicUsize::new(0)),
            last_drop_log: None,
            suppressed_drops: 0,
        };
        self.state.set_pool_size(pool.capacity);

        info!(
            pre_allocated = self.config.pre_allocated,
            max_concurrency = self.config.max_concurrency,
            overflow = %self.config.overflow,
            "Scheduler started"
        );

        let tasks = match &self.config.plan {
            SchedulePlan::Arrival { profile } => {
                self.run_arrival(profile, &mut pool, spawn_iteration).await
            }
            SchedulePlan::Iterations {
                count,
                max_duration,
            } => {
                self.run_iterations(*count, *max_duration, &mut pool, spawn_iteration)
                    .await
            }
        };

        info!(
            issued = self.state.issued(),
            in_flight = tasks.len(),
            "Scheduler finished issuing"
        );
        tasks
    }

    async fn run_arrival<F, Fut>(
        &self,
        profile: &RateProfile,
        pool: &mut Pool,
        mut spawn_iteration: F,
    ) -> JoinSet<()>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let start = Instant::now();
        let mut tasks = JoinSet::new();
        let mut index = 0u64;

        loop {
            reap(&mut tasks);

            let Some(due) = profile.due_time(index) else {
                // Nothing left to issue; hold until the schedule's end
                tokio::select! {
                    biased;
                    _ = self.control.cancelled() => {}
                    _ = sleep_until(start + profile.total_duration()) => {}
                }
                break;
            };

            tokio::select! {
                biased;
                _ = self.control.cancelled() => break,
                _ = sleep_until(start + due) => {}
            }

            self.issue(index, &mut spawn_iteration, pool, &mut tasks);
            index += 1;
        }

        tasks
    }

    async fn run_iterations<F, Fut>(
        &self,
        count: u64,
        max_duration: Duration,
        pool: &mut Pool,
        mut spawn_iteration: F,
    ) -> JoinSet<()>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + max_duration;
        let mut tasks = JoinSet::new();

        for index in 0..count {
            reap(&mut tasks);

            let permit = tokio::select! {
                biased;
                _ = self.control.cancelled() => break,
                _ = sleep_until(deadline) => {
                    self.control.stop(StopReason::DurationElapsed);
                    break;
                }
                permit = pool.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            self.grow_pool(pool);
            let iteration = spawn_iteration(index);
            let guard = self.state.begin_iteration();
            tasks.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                iteration.await;
            });
        }

        tasks
    }

    /// Start (or delay, or drop) the iteration that is due now
    fn issue<F, Fut>(&self, index: u64, spawn_iteration: &mut F, pool: &mut Pool, tasks: &mut JoinSet<()>)
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Ok(permit) = pool.permits.clone().try_acquire_owned() {
            self.grow_pool(pool);
            let iteration = spawn_iteration(index);
            let guard = self.state.begin_iteration();
            tasks.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                iteration.await;
            });
            return;
        }

        match self.config.overflow {
            OverflowPolicy::Drop => self.record_drop(pool),
            OverflowPolicy::Delay => {
                if pool.pending.load(Ordering::SeqCst) >= pool.max {
                    self.record_drop(pool);
                    return;
                }

                pool.pending.fetch_add(1, Ordering::SeqCst);
                self.state.record_delayed();
                self.state
                    .metrics()
                    .add_counter(names::DELAYED_ITERATIONS, 1.0, &Tags::new());
                debug!(index, "Worker pool saturated, delaying iteration");

                let iteration = spawn_iteration(index);
                let permits = Arc::clone(&pool.permits);
                let pending = Arc::clone(&pool.pending);
                let state = Arc::clone(&self.state);
                let control = self.control.clone();
                tasks.spawn(async move {
                    let permit = tokio::select! {
                        biased;
                        _ = control.cancelled() => None,
                        permit = permits.acquire_owned() => permit.ok(),
                    };
                    pending.fetch_sub(1, Ordering::SeqCst);

                    // The run ended before a worker freed up
                    let Some(permit) = permit else {
                        state.record_dropped();
                        state
                            .metrics()
                            .add_counter(names::DROPPED_ITERATIONS, 1.0, &Tags::new());
                        return;
                    };
                    let _permit = permit;
                    let _guard = state.begin_iteration();
                    iteration.await;
                });
            }
        }
    }

    /// Account for the permit just taken, growing the pool if needed
    fn grow_pool(&self, pool: &mut Pool) {
        let in_flight = pool.max - pool.permits.available_permits();
        if in_flight > pool.capacity {
            let added = in_flight - pool.capacity;
            pool.capacity = in_flight;
            self.state.set_pool_size(pool.capacity);
            self.state
                .metrics()
                .add_counter(names::POOL_GROWTH, added as f64, &Tags::new());
            debug!(pool_size = pool.capacity, "Worker pool grew");
        }
    }

    fn record_drop(&self, pool: &mut Pool) {
        self.state.record_dropped();
        self.state
            .metrics()
            .add_counter(names::DROPPED_ITERATIONS, 1.0, &Tags::new());

        let now = Instant::now();
        match pool.last_drop_log {
            Some(last) if now.duration_since(last) < DROP_LOG_INTERVAL => {
                pool.suppressed_drops += 1;
            }
            _ => {
                warn!(
                    max_concurrency = pool.max,
                    dropped_total = self.state.counters().dropped,
                    suppressed = pool.suppressed_drops,
                    "Worker pool saturated, dropping due iteration"
                );
                pool.last_drop_log = Some(now);
                pool.suppressed_drops = 0;
            }
        }
    }
}

/// Collect finished iteration tasks without waiting
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(err) = result {
            if err.is_panic() {
                error!("Iteration task panicked: {}", err);
            }
        }
    }
}

/// Give in-flight iterations up to `grace` to finish, then abort the rest.
/// Returns how many were aborted.
pub async fn drain(mut tasks: JoinSet<()>, grace: Duration, state: &RunState) -> u64 {
    let deadline = Instant::now() + grace;

    loop {
        tokio::select! {
            next = tasks.join_next() => match next {
                None => return 0,
                Some(Err(err)) if err.is_panic() => error!("Iteration task panicked: {}", err),
                Some(_) => {}
            },
            _ = sleep_until(deadline) => break,
        }
    }

    warn!(
        remaining = tasks.len(),
        grace_secs = grace.as_secs_f64(),
        "Graceful stop expired, interrupting iterations"
    );
    tasks.abort_all();

    let mut interrupted = 0;
    while let Some(result) = tasks.join_next().await {
        if matches!(&result, Err(err) if err.is_cancelled()) {
            interrupted += 1;
        }
    }
    state.record_interrupted(interrupted);
    interrupted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use parking_lot::Mutex;

    fn state() -> Arc<RunState> {
        Arc::new(RunState::new(MetricsRegistry::new(), None))
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let delta = if actual > expected { actual - expected } else { expected - actual };
        assert!(delta <= Duration::from_millis(2), "expected {:?}, got {:?}", expected, actual);
    }

    #[test]
    fn test_constant_due_times() {
        let profile = RateProfile::constant(10.0, Duration::from_secs(1));
        assert_eq!(profile.due_time(0), Some(Duration::ZERO));
        assert_close(profile.due_time(5).unwrap(), Duration::from_millis(500));
        assert_close(profile.due_time(9).unwrap(), Duration::from_millis(900));
        assert_eq!(profile.due_time(10), None);
        assert_eq!(profile.expected_iterations(), 10.0);
    }

    #[test]
    fn test_linear_ramp_due_times() {
        // rate(t) = t, so N(t) = t²/2 and iteration k is due at sqrt(2k)
        let profile = RateProfile::ramping(0.0, vec![Stage::new(10.0, Duration::from_secs(10))]);
        assert_close(profile.due_time(2).unwrap(), secs(2.0));
        assert_close(profile.due_time(8).unwrap(), secs(4.0));
        assert_close(profile.due_time(32).unwrap(), secs(8.0));
        assert_eq!(profile.due_time(50), None);
        assert!((profile.rate_at(secs(2.5)) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_ramp_down_and_stage_transitions() {
        let profile = RateProfile::ramping(
            0.0,
            vec![
                Stage::new(20.0, Duration::from_secs(2)),
                Stage::new(20.0, Duration::from_secs(2)),
                Stage::new(0.0, Duration::from_secs(2)),
            ],
        );
        // 20 + 40 + 20 arrivals
        assert_eq!(profile.expected_iterations(), 80.0);

        let due: Vec<Duration> = (0..).map_while(|k| profile.due_time(k)).collect();
        assert_eq!(due.len(), 80);
        assert!(due.windows(2).all(|w| w[0] <= w[1]));

        // Spacing on the plateau is exactly 1/rate, including across its edges
        let plateau: Vec<f64> = due[20..60].iter().map(Duration::as_secs_f64).collect();
        for pair in plateau.windows(2) {
            assert!((pair[1] - pair[0] - 0.05).abs() < 1e-6);
        }
        assert!((profile.cumulative(secs(3.0)) - 40.0).abs() < 1e-9);
        assert_eq!(profile.rate_at(secs(10.0)), 0.0);
    }

    #[test]
    fn test_invalid_schedules() {
        assert!(RateProfile::constant(0.0, Duration::from_secs(1)).validate().is_err());
        assert!(RateProfile::constant(1.0, Duration::ZERO).validate().is_err());
        assert!(RateProfile::ramping(0.0, vec![]).validate().is_err());
        assert!(RateProfile::ramping(0.0, vec![Stage::new(0.0, Duration::from_secs(5))])
            .validate()
            .is_err());

        let config = SchedulerConfig::arrival(RateProfile::constant(1.0, Duration::from_secs(1)), 10, 5);
        assert!(config.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_issuance_is_independent_of_latency() {
        let state = state();
        let config = SchedulerConfig::arrival(RateProfile::constant(10.0, Duration::from_secs(1)), 5, 20);
        let scheduler = Scheduler::new(config, RunControl::new(), Arc::clone(&state)).unwrap();

        let start = Instant::now();
        let issued = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = scheduler
            .run(|_| {
                issued.lock().push(start.elapsed());
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    finished.lock().push(start.elapsed());
                }
            })
            .await;
        while tasks.join_next().await.is_some() {}

        let issued = issued.lock().clone();
        assert_eq!(issued.len(), 10);
        for (i, at) in issued.iter().enumerate() {
            assert_close(*at, Duration::from_millis(100 * i as u64));
        }

        let finished = finished.lock().clone();
        assert_eq!(finished.len(), 10);
        assert_close(finished[0], Duration::from_secs(3));
        assert_eq!(state.counters().issued, 10);
        assert_eq!(state.counters().dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_pool_drops_and_grows() {
        let state = state();
        let config = SchedulerConfig::arrival(RateProfile::constant(10.0, Duration::from_secs(2)), 2, 5);
        let scheduler = Scheduler::new(config, RunControl::new(), Arc::clone(&state)).unwrap();

        let mut tasks = scheduler
            .run(|_| async { tokio::time::sleep(Duration::from_secs(10)).await })
            .await;

        let counters = state.counters();
        assert_eq!(counters.issued, 5);
        assert_eq!(counters.dropped, 15);
        assert_eq!(counters.peak_pool_size, 5);
        assert_eq!(state.metrics().counter_total(names::DROPPED_ITERATIONS), 15.0);
        assert_eq!(state.metrics().counter_total(names::POOL_GROWTH), 3.0);

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        assert_eq!(state.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_policy_waits_for_workers() {
        let state = state();
        let config = SchedulerConfig::arrival(RateProfile::constant(10.0, Duration::from_secs(1)), 1, 2)
            .with_overflow(OverflowPolicy::Delay);
        let scheduler = Scheduler::new(config, RunControl::new(), Arc::clone(&state)).unwrap();

        let mut tasks = scheduler
            .run(|_| async { tokio::time::sleep(Duration::from_millis(250)).await })
            .await;
        while tasks.join_next().await.is_some() {}

        let counters = state.counters();
        assert!(counters.delayed >= 1);
        assert_eq!(counters.issued + counters.dropped, 10);
        assert_eq!(
            state.metrics().counter_total(names::DELAYED_ITERATIONS),
            counters.delayed as f64
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_issuance() {
        let state = state();
        let control = RunControl::new();
        let config = SchedulerConfig::arrival(RateProfile::constant(10.0, Duration::from_secs(10)), 5, 50);
        let scheduler = Scheduler::new(config, control.clone(), Arc::clone(&state)).unwrap();

        let stopper = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1050)).await;
            stopper.stop(StopReason::Interrupted);
        });

        let started = Instant::now();
        let mut tasks = scheduler.run(|_| async {}).await;
        while tasks.join_next().await.is_some() {}

        // Due at 0, 100, ..., 1000 ms
        assert_eq!(state.counters().issued, 11);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_plan_shares_workers() {
        let state = state();
        let config = SchedulerConfig::iterations(7, Duration::from_secs(60), 2);
        let scheduler = Scheduler::new(config, RunControl::new(), Arc::clone(&state)).unwrap();

        let start = Instant::now();
        let issued = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = scheduler
            .run(|_| {
                issued.lock().push(start.elapsed());
                async { tokio::time::sleep(Duration::from_secs(1)).await }
            })
            .await;
        while tasks.join_next().await.is_some() {}

        let issued = issued.lock().clone();
        assert_eq!(issued.len(), 7);
        assert_close(issued[6], Duration::from_secs(3));
        assert_eq!(state.counters().peak_active, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_interrupts_stragglers() {
        let state = state();
        let mut tasks = JoinSet::new();
        tasks.spawn(async { tokio::time::sleep(Duration::from_millis(100)).await });
        tasks.spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });

        let interrupted = drain(tasks, Duration::from_secs(1), &state).await;

        assert_eq!(interrupted, 1);
        assert_eq!(state.counters().interrupted, 1);
    }
}
