//! # loadline-core
//!
//! The load-generation engine: an open-model arrival scheduler that starts
//! journey iterations at a target rate, a journey runner that carries session
//! state across steps, weighted journey selection, a check engine, a metrics
//! registry with threshold evaluation, and the scenario profiles that bind
//! them into a run.
//!
//! ## Architecture
//!
//! - [`scheduler`]: arrival timeline, worker pool and overflow handling
//! - [`runner`]: executes one journey for one session
//! - [`journey`], [`template`], [`check`]: journeys as plain data
//! - [`metrics`], [`threshold`], [`report`]: aggregation and verdicts
//! - [`profile`], [`storefront`]: the smoke/load/stress/soak profiles
//! - [`run`]: ties everything together
//!
//! The transport is injected through [`RequestExecutor`].

pub mod check;
pub mod control;
pub mod error;
pub mod harvest;
pub mod journey;
pub mod metrics;
pub mod profile;
pub mod report;
pub mod request;
pub mod run;
pub mod runner;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod state;
pub mod storefront;
pub mod template;
pub mod think_time;
pub mod threshold;

// Re-export commonly used types
pub use check::{check, Check, CheckOutcome, CheckResult, CheckSet, Predicate};
pub use control::{RunControl, StopReason};
pub use error::{EngineError, EngineResult};
pub use harvest::{HarvestOutcome, IdHarvester};
pub use journey::{Journey, JourneyCatalog, Repeat, Step};
pub use metrics::{tags, Aggregate, MetricKind, MetricSample, MetricsRegistry, Tags};
pub use profile::{ProfileKind, ScenarioProfile};
pub use report::{CheckSummary, MetricSummary, RunReport, Verdict};
pub use request::{
    HttpMethod, RequestDescriptor, RequestExecutor, Response, StatusClass, TransportError,
};
pub use run::LoadRun;
pub use runner::{IterationOutcome, IterationResult, JourneyRunner};
pub use scheduler::{RateProfile, SchedulePlan, Scheduler, SchedulerConfig, Stage};
pub use selector::{select_journey, WeightedSelector};
pub use session::{CookieJar, Session};
pub use state::{RunCounters, RunState};
pub use template::{DataPools, RequestTemplate, Value};
pub use think_time::ThinkTime;
pub use threshold::{evaluate_all, Comparison, Condition, Statistic, ThresholdOutcome, ThresholdSpec};
