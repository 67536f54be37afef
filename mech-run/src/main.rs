//! Headless driver for the mechanics core.
//!
//! Builds a scene of randomly placed agents, runs the step loop and logs
//! per-phase timings. Set `RUST_LOG=debug` for per-step snapshot statistics.

mod stats;

use anyhow::{Context, Result, bail};
use clap::Parser;
use glam::{DVec2, DVec3};
use mech_core::{MechConfig, Serializer, Simulation, SpaceVector, StepTimings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stats::StatsSerializer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mech-run",
    version,
    about = "Run the cell mechanics core on a randomly seeded scene"
)]
struct Cli {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of timesteps to run.
    #[arg(long, default_value_t = 500)]
    steps: u64,

    /// Number of agents placed at random.
    #[arg(long, default_value_t = 2000)]
    agents: usize,

    /// Width of the agent-free band along every domain face.
    #[arg(long, default_value_t = 200.0)]
    margin: f64,

    /// Overrides the seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,

    /// Log the phase timings every N steps.
    #[arg(long, default_value_t = 50)]
    report_every: u64,

    /// Print the final step statistics as JSON on stdout.
    #[arg(long)]
    summary_json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate().context("invalid configuration")?;

    match config.dims {
        1 => run::<f64>(&cli, &config),
        2 => run::<DVec2>(&cli, &config),
        3 => run::<DVec3>(&cli, &config),
        dims => bail!("unsupported dimension count {dims}"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<MechConfig> {
    let Some(path) = path else {
        return Ok(MechConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

fn run<V: SpaceVector>(cli: &Cli, config: &MechConfig) -> Result<()> {
    let mut sim = Simulation::<V>::from_config(config)?;
    place_agents(&mut sim, config, cli.agents, cli.margin)?;
    sim.validate().context("scene failed validation")?;

    info!(
        agents = sim.environment().agents.len(),
        steps = cli.steps,
        voxels = sim.partitioner().voxels_count(),
        "starting"
    );

    let mut serializer = StatsSerializer::default();
    let mut total = StepTimings::default();
    for step in 1..=cli.steps {
        let timings = sim.step();
        serializer.serialize_one_timestep(&sim.snapshot())?;
        total += timings;

        if cli.report_every > 0 && step % cli.report_every == 0 {
            log_timings(step, &timings);
        }
    }

    if cli.steps > 0 {
        let per_step = |us: u64| us / cli.steps;
        info!(
            partition_us = per_step(total.partition_us),
            membrane_us = per_step(total.membrane_us),
            motility_us = per_step(total.motility_us),
            neighbors_us = per_step(total.neighbors_us),
            velocities_us = per_step(total.velocities_us),
            positions_us = per_step(total.positions_us),
            total_us = per_step(total.total_us),
            "average step timings"
        );
    }

    if let Some(stats) = serializer.last() {
        info!(
            agents = stats.agents,
            neighbor_edges = stats.neighbor_edges,
            springs = stats.springs,
            mean_pressure = stats.mean_pressure,
            "final state"
        );
        if cli.summary_json {
            println!("{}", serde_json::to_string_pretty(stats)?);
        }
    }
    Ok(())
}

/// Places `count` agents uniformly inside the domain shrunk by `margin`,
/// cycling through the configured agent types.
fn place_agents<V: SpaceVector>(
    sim: &mut Simulation<V>,
    config: &MechConfig,
    count: usize,
    margin: f64,
) -> Result<()> {
    let mut ranges = Vec::with_capacity(V::DIMS);
    for axis in 0..V::DIMS {
        let low = config.bounding_box_mins[axis] + margin;
        let high = config.bounding_box_maxs[axis] - margin;
        if !(low < high) {
            bail!("margin {margin} leaves no room on axis {axis}");
        }
        ranges.push(low..high);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let types_count = config.agent_types_count();
    for i in 0..count {
        let position = V::from_axes(|axis| rng.random_range(ranges[axis].clone()));
        sim.spawn_agent(position, i % types_count)?;
    }
    Ok(())
}

fn log_timings(step: u64, timings: &StepTimings) {
    info!(
        step,
        partition_us = timings.partition_us,
        membrane_us = timings.membrane_us,
        motility_us = timings.motility_us,
        neighbors_us = timings.neighbors_us,
        velocities_us = timings.velocities_us,
        positions_us = timings.positions_us,
        total_us = timings.total_us,
        "step timings"
    );
}
