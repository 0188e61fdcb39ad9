use std::path::PathBuf;

use clap::Parser;
use mcsim::{OutputFormat, Overrides, Scenario, init_logging};
use mcsim_core::{SamplingMethod, Workers};

fn parse_workers(value: &str) -> Result<Workers, String> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(Workers::Auto);
    }
    match value.parse::<usize>() {
        Ok(0) => Err("worker count must be at least 1".into()),
        Ok(n) => Ok(Workers::Count(n)),
        Err(_) => Err(format!("expected \"auto\" or a number, got {value:?}")),
    }
}

fn parse_sampling(value: &str) -> Result<SamplingMethod, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "random" => Ok(SamplingMethod::Random),
        "stratified" => Ok(SamplingMethod::Stratified),
        _ => Err(format!("expected \"random\" or \"stratified\", got {value:?}")),
    }
}

#[derive(Parser, Debug)]
#[command(name = "mcsim")]
#[command(about = "Monte Carlo simulation over probabilistic models")]
struct Args {
    /// Path to the scenario file (YAML)
    scenario: PathBuf,

    /// Number of iterations (overrides the scenario)
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Random seed (overrides the scenario)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads: "auto" or a number (overrides the scenario)
    #[arg(short, long, value_parser = parse_workers)]
    workers: Option<Workers>,

    /// Sampling method: "random" or "stratified" (overrides the scenario)
    #[arg(long, value_parser = parse_sampling)]
    sampling: Option<SamplingMethod>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut scenario = Scenario::load(&args.scenario)?;
    scenario.apply(&Overrides {
        iterations: args.iterations,
        seed: args.seed,
        workers: args.workers,
        sampling: args.sampling,
    });
    tracing::info!(
        "loaded scenario {} ({} variables)",
        args.scenario.display(),
        scenario.variables.len()
    );

    let report = scenario.run()?;
    println!("{}", report.render(args.format)?);

    Ok(())
}
