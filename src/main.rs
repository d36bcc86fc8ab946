use quadsim::{ParticleSystem, SimulationConfig};
use quadsim::{bench_gravity, bench_threads};

use anyhow::Result;
use clap::Parser;
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, default_value = "uniform.yaml")]
    file_name: String,

    /// Override the step count from the scenario file
    #[arg(long)]
    steps: Option<u64>,

    /// Run the timing benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<SimulationConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(file_name);
    let file = File::open(&config_path)?;
    let reader = BufReader::new(file);
    let config: SimulationConfig = serde_yaml::from_reader(reader)?;

    Ok(config)
}

fn main() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let args = Args::parse();

    if args.bench {
        bench_gravity();
        bench_threads();
        return Ok(());
    }

    let config = load_scenario_from_yaml(&args.file_name)?;
    let steps = args.steps.unwrap_or(config.run.steps);
    let mut system = ParticleSystem::new(&config)?;

    let t0 = Instant::now();
    for _ in 0..steps {
        system.step();
    }
    let elapsed = t0.elapsed().as_secs_f64();

    info!(
        "{} steps in {:.3} s ({:.1} steps/s), t = {:.3}",
        steps,
        elapsed,
        steps as f64 / elapsed,
        system.time(),
    );
    info!(
        "tree: {} regions, total mass {:.3e}",
        system.extents().len(),
        system.tree_mass(),
    );

    Ok(())
}
