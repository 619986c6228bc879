//! `loadline profiles`

use anyhow::Result;
use colored::Colorize;
use loadline_config::LoadlineConfig;
use loadline_core::{ProfileKind, ScenarioProfile, SchedulePlan};
use std::fmt::Write;

/// Describe one profile as resolved from the configuration
pub fn describe_profile(kind: ProfileKind, config: &LoadlineConfig) -> Result<String> {
    let profile = ScenarioProfile::from_config(kind, config)?;
    let scheduler = &profile.scheduler;
    let mut out = String::new();

    writeln!(out, "{} - {}", kind.as_str().bold(), kind.description())?;
    writeln!(
        out,
        "  duration     {}",
        humantime::format_duration(scheduler.total_duration())
    )?;
    if let SchedulePlan::Arrival { profile: rate } = &scheduler.plan {
        writeln!(out, "  iterations   ~{:.0}", rate.expected_iterations())?;
    }
    writeln!(
        out,
        "  workers      {} pre-allocated, {} max ({} on overflow)",
        scheduler.pre_allocated, scheduler.max_concurrency, scheduler.overflow
    )?;

    let total: f64 = profile.catalog.journeys().iter().map(|j| j.weight).sum();
    let mix: Vec<String> = profile
        .catalog
        .journeys()
        .iter()
        .map(|journey| format!("{} {:.0}%", journey.name, journey.weight / total * 100.0))
        .collect();
    writeln!(out, "  journeys     {}", mix.join(", "))?;

    for threshold in &profile.thresholds {
        let abort = if threshold.abort_on_fail { " (abort)" } else { "" };
        writeln!(out, "  threshold    {} {}{}", threshold.key, threshold.expression, abort)?;
    }
    Ok(out)
}

pub fn profiles_command(config: &LoadlineConfig) -> Result<()> {
    for kind in ProfileKind::all() {
        println!("{}", describe_profile(kind, config)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_profile_description() {
        colored::control::set_override(false);
        let text = describe_profile(ProfileKind::Load, &LoadlineConfig::default()).unwrap();

        assert!(text.starts_with("load - "));
        assert!(text.contains("duration     5m"));
        assert!(text.contains("iterations   ~3000"));
        assert!(text.contains("browse 40%, add_to_cart 30%, checkout 20%, currency 10%"));
        assert!(text.contains("threshold    http_req_failed rate<0.01 (abort)"));
    }

    #[test]
    fn test_smoke_weights_are_equal() {
        colored::control::set_override(false);
        let text = describe_profile(ProfileKind::Smoke, &LoadlineConfig::default()).unwrap();
        assert!(text.contains("browse 25%, add_to_cart 25%, checkout 25%, currency 25%"));
    }
}
