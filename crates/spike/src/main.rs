use anyhow::{bail, Context, Result};
use boids_core::boundary::ArenaBounds;
use boids_core::config::{NeighborStrategy, SimConfig};
use boids_core::world::World;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "boids", version, about = "Run headless flocking simulations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Default,
    Schooling,
}

impl Preset {
    fn config(self) -> SimConfig {
        match self {
            Preset::Default => SimConfig::default(),
            Preset::Schooling => SimConfig::schooling(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Spawn a flock, run it for a number of steps and print a JSON summary.
    Run {
        /// JSON config file; missing fields take the preset's defaults.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,
        #[arg(long, default_value_t = 1000)]
        agents: usize,
        #[arg(long, default_value_t = 500)]
        steps: usize,
        /// Overrides the config seed.
        #[arg(long)]
        seed: Option<u64>,
        /// naive, uniform-grid, incremental-grid, quad-tree or r-tree.
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long, default_value_t = 25.0)]
        half_width: f64,
        #[arg(long, default_value_t = 25.0)]
        half_height: f64,
        #[arg(long, default_value_t = 50)]
        sample_every: usize,
        /// Write the summary here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a preset config as JSON.
    Config {
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: Option<&PathBuf>, preset: Preset) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(preset.config());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    // Overlay the file on the preset so partial files keep preset values.
    let mut merged = serde_json::to_value(preset.config())?;
    let overlay: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("config {} is not valid JSON", path.display()))?;
    if let (Some(base), Some(fields)) = (merged.as_object_mut(), overlay.as_object()) {
        for (key, value) in fields {
            base.insert(key.clone(), value.clone());
        }
    } else {
        bail!("config {} must be a JSON object", path.display());
    }
    let config = SimConfig::from_json_str(&merged.to_string())?;
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn run_command(
    config_path: Option<PathBuf>,
    preset: Preset,
    agents: usize,
    steps: usize,
    seed: Option<u64>,
    strategy: Option<String>,
    arena: ArenaBounds,
    sample_every: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_ref(), preset)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(name) = strategy {
        config.neighbor_strategy = NeighborStrategy::from_name(&name)
            .with_context(|| format!("unknown neighbor strategy '{name}'"))?;
    }

    let mut world = World::spawn(agents, config, arena)?;
    info!(
        agents,
        steps,
        strategy = world.config().neighbor_strategy.name(),
        "running flock"
    );
    let summary = world.try_run_experiment(steps, sample_every)?;
    let json = serde_json::to_string_pretty(&summary)?;
    match output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "summary written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            preset,
            agents,
            steps,
            seed,
            strategy,
            half_width,
            half_height,
            sample_every,
            output,
        } => run_command(
            config,
            preset,
            agents,
            steps,
            seed,
            strategy,
            ArenaBounds::new(half_width, half_height),
            sample_every,
            output,
        )?,
        Command::Config { preset } => println!("{}", preset.config().to_json_pretty()?),
    }
    Ok(())
}
