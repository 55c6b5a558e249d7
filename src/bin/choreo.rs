use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use choreo::{
    config::MissionConfig,
    link::SimulatedConnector,
    resources::{CsvTelemetryLog, MemoryTelemetryLog, TelemetryLogger},
    systems::{FailurePolicy, Fleet},
};

#[derive(Parser)]
#[command(name = "choreo")]
#[command(about = "Fly a drone fleet through a scripted sequence in lockstep", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fly the mission against simulated vehicles
    Fly(FlyArgs),

    /// Print the planned pattern waypoints
    Plan(PlanArgs),

    /// Write the default mission config
    Init(InitArgs),
}

#[derive(Args)]
struct FlyArgs {
    /// Mission config (YAML); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Telemetry CSV, overrides the config
    #[arg(long)]
    log: Option<PathBuf>,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Write the fleet report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Args)]
struct PlanArgs {
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct InitArgs {
    #[arg(default_value = "mission.yaml")]
    out: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Isolate,
    AbortAll,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Isolate => FailurePolicy::Isolate,
            PolicyArg::AbortAll => FailurePolicy::AbortAll,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Fly(args) => fly(args),
        Commands::Plan(args) => plan(args),
        Commands::Init(args) => init(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MissionConfig> {
    match path {
        Some(path) => MissionConfig::load(path)
            .with_context(|| format!("loading mission config {}", path.display())),
        None => {
            let config = MissionConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn fly(args: FlyArgs) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(log) = args.log {
        config.telemetry_log = Some(log);
    }
    if let Some(policy) = args.policy {
        config.failure_policy = policy.into();
    }

    let logger: Arc<dyn TelemetryLogger> = match &config.telemetry_log {
        Some(path) => Arc::new(
            CsvTelemetryLog::create(path)
                .with_context(|| format!("creating telemetry log {}", path.display()))?,
        ),
        None => Arc::new(MemoryTelemetryLog::new()),
    };

    let connector = SimulatedConnector::new(config.simulation.clone());
    let fleet = Fleet::connect(
        &connector,
        config.drones.clone(),
        config.plan,
        config.failure_policy,
        logger,
    )?;
    let sequence = config.plan.phase_sequence();
    let report = fleet.run_sequence(&sequence)?;

    for line in report.summary_lines() {
        println!("{}", line);
    }
    if let Some(path) = args.json {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating report {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        info!(path = %path.display(), "fleet report written");
    }

    Ok(ExitCode::from(report.exit_code()))
}

fn plan(args: PlanArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    let pattern = &config.plan.pattern;
    println!(
        "# radius {} m, {} samples, move {:.3} s + pause {:.3} s per step",
        pattern.radius,
        pattern.sample_count(),
        pattern.move_time_per_step(),
        pattern.pause_duration
    );
    println!("angle,x,y,vx,vy");
    for wp in pattern.waypoints() {
        println!(
            "{},{:.4},{:.4},{:.4},{:.4}",
            wp.angle_degrees, wp.x, wp.y, wp.vx, wp.vy
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn init(args: InitArgs) -> anyhow::Result<ExitCode> {
    if args.out.exists() && !args.force {
        anyhow::bail!("{} already exists, pass --force to overwrite", args.out.display());
    }
    MissionConfig::default().save(&args.out)?;
    println!("wrote {}", args.out.display());
    Ok(ExitCode::SUCCESS)
}
