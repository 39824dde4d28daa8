//! PerfTier CLI - hardware-aware performance tiering
//!
//! Profiles the host, classifies it, and replays FPS samples or precision
//! workloads through the library.

use clap::Parser;
use perftier::config::{CliArgs, Commands, TuningConfig};
use perftier::error::{PerfTierError, Result};
use perftier::notify::TracingSink;
use perftier::perf::{EvaluationOutcome, PerformanceController};
use perftier::precision::{precision_name, PrecisionManager, BYTES_PER_GB};
use perftier::system::{
    CapabilityClassifier, GpuVendorClass, HardwareProfile, HardwareProfiler, PerformanceTier,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(args.verbose, args.log_json);

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => TuningConfig::load(path)?,
        None => TuningConfig::default(),
    };

    handle_command(&args.command, &config)
}

fn handle_command(command: &Commands, config: &TuningConfig) -> Result<()> {
    match command {
        Commands::Detect { json } => cmd_detect(config, *json),
        Commands::Classify { memory_gb, gpu } => cmd_classify(*memory_gb, *gpu),
        Commands::Simulate {
            samples,
            tier,
            cadence,
        } => cmd_simulate(config, samples, *tier, *cadence),
        Commands::Precision { cells, target_gb } => cmd_precision(config, *cells, *target_gb),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PerfTierError::config(format!("Failed to create runtime: {}", e)))
}

fn cmd_detect(config: &TuningConfig, json: bool) -> Result<()> {
    let profiler = HardwareProfiler::new(config);
    let profile = runtime()?.block_on(profiler.detect());
    let assessment = CapabilityClassifier::classify(&profile);

    if json {
        let report = serde_json::json!({
            "profile": profile,
            "assessment": assessment,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        profile.print_summary();
        assessment.print_summary();
    }

    Ok(())
}

fn cmd_classify(memory_gb: f64, gpu: GpuVendorClass) -> Result<()> {
    let profile = HardwareProfile {
        memory_gb,
        gpu_vendor: gpu,
        ..Default::default()
    };

    let assessment = CapabilityClassifier::classify(&profile);
    assessment.print_summary();
    Ok(())
}

fn cmd_simulate(
    config: &TuningConfig,
    samples: &[f64],
    tier: Option<PerformanceTier>,
    cadence: Option<Duration>,
) -> Result<()> {
    let rt = runtime()?;

    let profile = match tier {
        Some(_) => None,
        None => Some(rt.block_on(HardwareProfiler::new(config).detect())),
    };

    let mut controller = PerformanceController::new(config).with_sink(Arc::new(TracingSink));
    controller.initialize(profile.clone());
    if let Some(tier) = tier {
        controller.set_tier(tier);
    }

    let mut precision = PrecisionManager::new(config)
        .with_fps_source(Arc::new(controller.fps_ratio_handle()))
        .with_sink(Arc::new(TracingSink));
    if let Some(profile) = &profile {
        precision = precision.with_profile(profile);
    }

    println!("Starting tier: {}\n", controller.current_tier());
    println!("{:>4}  {:>8}  {:>8}  {:>6}  {:<10}  {}", "#", "sample", "average", "ratio", "tier", "precision");

    rt.block_on(async {
        for (i, sample) in samples.iter().enumerate() {
            if let Some(cadence) = cadence {
                if i > 0 {
                    tokio::time::sleep(cadence).await;
                }
            }

            controller.record_sample(*sample);
            let outcome = controller.evaluate();
            precision.auto_adjust_precision();

            let ratio = match outcome {
                EvaluationOutcome::NoData => None,
                EvaluationOutcome::Hold { ratio }
                | EvaluationOutcome::Changed { ratio, .. }
                | EvaluationOutcome::Saturated { ratio, .. } => Some(ratio),
            };

            println!(
                "{:>4}  {:>8.1}  {:>8.1}  {:>6}  {:<10}  {}",
                i + 1,
                sample,
                controller.history().average().unwrap_or(0.0),
                ratio.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "-".into()),
                controller.current_tier().name(),
                precision.precision_name(),
            );
        }
    });

    let metrics = controller.metrics();
    println!("\n=== Simulation Summary ===");
    println!("Final tier:   {}", controller.current_tier());
    println!("Target FPS:   {}", controller.state().target_fps);
    println!("Evaluations:  {}", metrics.evaluations);
    println!("Upgrades:     {}", metrics.upgrades);
    println!("Downgrades:   {}", metrics.downgrades);
    println!("Precision:    {}", precision.precision_name());

    Ok(())
}

fn cmd_precision(config: &TuningConfig, cells: usize, target_gb: Option<f64>) -> Result<()> {
    let mut store = PrecisionManager::new(config);

    // Spread synthetic values over layers 1-12 so every table row is used
    for i in 0..cells {
        let value = i as f64 * 0.123_456_7;
        store.encode(&format!("cell-{}", i), value, (i % 12) as u32 + 1);
    }

    println!("=== Precision Store ===");
    println!("Cells:        {}", store.cell_count());
    println!("Residues:     {}", store.residues().len());
    println!("Level:        {}", store.precision_name());
    println!();
    println!("{:<6}  {:>12}  {:>8}  {:>8}", "Level", "Estimated", "Savings", "Loss");

    for level in (0..=store.level()).rev() {
        let bytes = (store.estimated_memory_gb(level) * BYTES_PER_GB) as u64;
        println!(
            "{:<6}  {:>12}  {:>7.2}%  {:>8}",
            precision_name(level),
            humansize::format_size(bytes, humansize::BINARY),
            store.estimate_memory_savings(level),
            store.estimate_precision_loss(level),
        );
    }

    if let Some(target) = target_gb {
        let result = store.optimize_for_memory(target);
        result.print_summary();
        if !result.success {
            std::process::exit(1);
        }
    }

    Ok(())
}
