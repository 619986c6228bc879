//! Names of the built-in metrics and tag keys

/// Requests sent (counter)
pub const HTTP_REQS: &str = "http_reqs";
/// Request latency in milliseconds (trend)
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Status outside 2xx/3xx or no response at all (rate)
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
/// Individual check outcomes, tagged with `check` (rate)
pub const CHECKS: &str = "checks";
/// All checks of a step passed (rate)
pub const STEP_SUCCESS: &str = "step_success";
/// Completed iterations (counter)
pub const ITERATIONS: &str = "iterations";
/// Completed iteration wall time in milliseconds (trend)
pub const ITERATION_DURATION: &str = "iteration_duration";
/// Iterations ended by a transport failure (counter)
pub const INCOMPLETE_ITERATIONS: &str = "incomplete_iterations";
/// Iterations stopped at a step boundary because the run was ending (counter)
pub const TRUNCATED_ITERATIONS: &str = "truncated_iterations";
/// Transport failures, tagged with `kind` (counter)
pub const TRANSPORT_ERRORS: &str = "transport_errors";
/// Due iterations skipped because the pool was saturated (counter)
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
/// Due iterations that waited for a free worker (counter)
pub const DELAYED_ITERATIONS: &str = "delayed_iterations";
/// Workers added beyond the pre-allocated pool (counter)
pub const POOL_GROWTH: &str = "pool_growth";
/// Responses slower than the slow-request bound (rate)
pub const DEGRADATION_RATE: &str = "degradation_rate";

pub const TAG_STEP: &str = "step";
pub const TAG_JOURNEY: &str = "journey";
pub const TAG_CHECK: &str = "check";
pub const TAG_KIND: &str = "kind";
