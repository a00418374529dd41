use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use snake_swarm::game::WorldConfig;
use snake_swarm::modes::{BenchmarkMode, HeadlessMode};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snake_swarm")]
#[command(version, about = "Grid simulation of autonomous snakes competing for food")]
struct Cli {
    /// Run mode
    #[arg(long, default_value = "run")]
    mode: Mode,

    /// JSON configuration file; command-line options override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid width
    #[arg(long)]
    width: Option<usize>,

    /// Grid height
    #[arg(long)]
    height: Option<usize>,

    /// Number of snakes to spawn
    #[arg(long)]
    agents: Option<usize>,

    /// Fixed updates per second
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop a real-time run after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Ticks to simulate in benchmark mode
    #[arg(long, default_value = "1000")]
    ticks: u64,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    /// Real-time simulation paced at the tick rate
    Run,
    /// Simulate as fast as possible and report throughput
    Benchmark,
}

impl Cli {
    fn world_config(&self) -> Result<WorldConfig> {
        let mut config = match &self.config {
            Some(path) => WorldConfig::load(path)?,
            None => WorldConfig::default(),
        };

        if let Some(width) = self.width {
            config.grid_width = width;
        }
        if let Some(height) = self.height {
            config.grid_height = height;
        }
        if let Some(agents) = self.agents {
            config.snake_count = agents;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.world_config()?;

    match cli.mode {
        Mode::Run => {
            let mut headless = HeadlessMode::new(config, cli.max_ticks)?;
            headless.run().await?;
        }
        Mode::Benchmark => {
            let mut benchmark = BenchmarkMode::new(config, cli.ticks)?;
            let report = benchmark.run();
            info!("benchmark report\n{report}");
        }
    }

    Ok(())
}
