//! `loadline run`

use crate::cli::RunArgs;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use loadline_config::LoadlineConfig;
use loadline_core::{
    LoadRun, ProfileKind, RequestExecutor, RunReport, ScenarioProfile, StopReason, Verdict,
};
use loadline_http::{HttpConfig, HttpExecutor, OfflineExecutor};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Time limit of `--iterations` runs without `--duration`
const DEFAULT_ITERATION_LIMIT: Duration = Duration::from_secs(600);

/// Simulated response time of the offline storefront
const OFFLINE_LATENCY: Duration = Duration::from_millis(20);

/// Fold command line overrides into the loaded configuration
pub fn apply_overrides(config: &mut LoadlineConfig, args: &RunArgs) -> Result<()> {
    if let Some(base_url) = &args.base_url {
        config.target.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    if args.no_think_time {
        config.think_time.enabled = false;
    }

    let profiles = &mut config.profiles;
    if let Some(rate) = args.rate {
        match args.profile {
            ProfileKind::Smoke => profiles.smoke.rate = rate,
            ProfileKind::Load => profiles.load.rate = rate,
            ProfileKind::Stress => profiles.stress.peak_rate = rate,
            ProfileKind::Soak => profiles.soak.rate = rate,
        }
    }
    if let (Some(duration), None) = (args.duration, args.iterations) {
        match args.profile {
            ProfileKind::Smoke => profiles.smoke.duration = duration,
            ProfileKind::Load => profiles.load.duration = duration,
            ProfileKind::Soak => profiles.soak.duration = duration,
            ProfileKind::Stress => {
                bail!("--duration does not apply to the stress profile; edit its stages instead")
            }
        }
    }

    config
        .validate_all()
        .context("Invalid configuration after command line overrides")
}

/// Build the scenario profile the run executes
pub fn build_profile(config: &LoadlineConfig, args: &RunArgs) -> Result<ScenarioProfile> {
    let mut profile = ScenarioProfile::from_config(args.profile, config)
        .with_context(|| format!("Failed to build the {} profile", args.profile))?;

    if let Some(journey) = &args.journey {
        profile = profile.restrict_to_journey(journey)?;
    }
    if let Some(count) = args.iterations {
        profile = profile.with_iterations(count, args.duration.unwrap_or(DEFAULT_ITERATION_LIMIT));
    }
    Ok(profile)
}

fn build_executor(config: &LoadlineConfig, offline: bool) -> Result<Arc<dyn RequestExecutor>> {
    if offline {
        info!("Offline mode: serving canned storefront pages");
        let executor = OfflineExecutor::storefront_with_ids(&config.data.fallback_ids)
            .with_latency(OFFLINE_LATENCY);
        return Ok(Arc::new(executor));
    }

    let executor = HttpExecutor::new(HttpConfig::from(&config.target))
        .context("Failed to create HTTP executor")?;
    Ok(Arc::new(executor))
}

/// Execute a profile and print its summary
pub async fn run_command(mut config: LoadlineConfig, args: &RunArgs) -> Result<Verdict> {
    apply_overrides(&mut config, args)?;
    let profile = build_profile(&config, args)?;
    let executor = build_executor(&config, args.offline)?;

    let run = LoadRun::new(profile, executor)?;
    let target = if args.offline {
        "offline"
    } else {
        config.target.base_url.as_str()
    };
    info!(run_id = %run.run_id(), profile = %args.profile, target, "Starting load run");

    let control = run.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping issuance");
            control.stop(StopReason::Interrupted);
        }
    });

    let report = run.execute().await?;
    interrupt.abort();

    print_summary(&report);

    if let Some(path) = &args.summary_export {
        let json = report.to_json().context("Failed to serialize run report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {:?}", path))?;
        println!("📝 Report written to {:?}", path);
    }

    Ok(report.verdict)
}

fn print_summary(report: &RunReport) {
    println!();
    for line in report.render_text().lines() {
        if line.contains("[FAILED]") {
            println!("{}", line.red());
        } else if line.contains("[ok]") {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    println!();

    match report.verdict {
        Verdict::Pass => println!("{}", "✅ PASS: all thresholds held".green().bold()),
        Verdict::Fail => {
            let failed = report.failed_thresholds().count();
            println!("{}", format!("❌ FAIL: {} threshold(s) crossed", failed).red().bold());
        }
        Verdict::Aborted => {
            let reason = report
                .stop_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "aborted".to_string());
            println!("{}", format!("⛔ ABORTED: {}", reason).yellow().bold());
        }
    }
}
