use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plaguesim::{
    config::Config,
    engine::Engine,
    runner::{AutoRun, sweep},
    stats::TrackedStat,
};
use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML configuration file (defaults are used when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one simulation and print a JSON record per round.
    Run {
        #[arg(long)]
        rounds: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_parser = clap::value_parser!(u64).range(10..=500))]
        vectors: Option<u64>,

        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print only this series.
        #[arg(long, value_enum)]
        series: Option<TrackedStat>,

        /// Print the final population and vectors after the last round.
        #[arg(long)]
        snapshot: bool,

        /// Stop as soon as nobody is infected.
        #[arg(long)]
        until_clear: bool,
    },

    /// Compare vector population sizes over repeated runs.
    Sweep {
        #[arg(long, value_delimiter = ',', required = true)]
        vectors: Vec<usize>,

        #[arg(long, default_value_t = 8)]
        reps: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let cfg = match &args.config {
        Some(file) => Config::from_file(file).context("failed to construct cfg")?,
        None => Config::default(),
    };

    match args.command {
        Command::Run {
            rounds,
            seed,
            vectors,
            interval_ms,
            series,
            snapshot,
            until_clear,
        } => {
            let mut cfg = cfg;
            if let Some(rounds) = rounds {
                cfg.output.n_rounds = rounds;
            }
            if let Some(vectors) = vectors {
                cfg.init.n_vectors = vectors as usize;
            }
            if let Some(interval_ms) = interval_ms {
                cfg.output.interval_ms = interval_ms;
            }
            run_simulation(cfg, seed, series, snapshot, until_clear)?
        }
        Command::Sweep {
            vectors,
            reps,
            seed,
        } => run_sweep(cfg, &vectors, reps, seed)?,
    }

    Ok(())
}

fn run_simulation(
    cfg: Config,
    seed: Option<u64>,
    series: Option<TrackedStat>,
    snapshot: bool,
    until_clear: bool,
) -> Result<()> {
    cfg.validate().context("failed to validate config")?;
    log::info!("{cfg:#?}");

    let auto_run = AutoRun::new(
        Duration::from_millis(cfg.output.interval_ms),
        cfg.output.n_rounds,
    );
    let handle = auto_run.handle();
    let mut engine = Engine::new(cfg, seed).context("failed to construct engine")?;
    log::info!("seed = {}", engine.seed());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    auto_run.run(&mut engine, |_, record| {
        let line = match series {
            Some(stat) => serde_json::json!({ "round": record.round, (stat.name()): record.get(stat) }),
            None => serde_json::to_value(record)?,
        };
        writeln!(out, "{line}")?;
        out.flush()?;
        if until_clear && record.infected == 0 {
            handle.stop();
        }
        Ok(())
    })?;

    if snapshot {
        writeln!(out, "{}", snapshot_json(&engine))?;
    }

    if let Some(peak) = engine.history().peak(TrackedStat::Infected) {
        log::info!(
            "{} peaked at {} in round {}",
            TrackedStat::Infected.label(),
            peak.infected,
            peak.round
        );
    }

    Ok(())
}

/// Final state of a run: humans with their status, vectors, and every tracked series.
fn snapshot_json(engine: &Engine) -> serde_json::Value {
    let threshold = engine.config().model.recovery_threshold_days;
    let humans: Vec<_> = engine
        .humans()
        .iter()
        .map(|hum| {
            serde_json::json!({
                "id": hum.id,
                "x": hum.x,
                "y": hum.y,
                "status": hum.status(threshold),
                "days_infected": hum.days_infected,
            })
        })
        .collect();
    let vectors: Vec<_> = engine
        .vectors()
        .iter()
        .map(|vec| serde_json::json!({ "id": vec.id, "infected": vec.infected() }))
        .collect();
    let mut series = serde_json::Map::new();
    for stat in TrackedStat::ALL {
        let vals: Vec<_> = engine.history().series(stat).collect();
        series.insert(stat.name().to_string(), serde_json::json!(vals));
    }
    serde_json::json!({
        "seed": engine.seed(),
        "humans": humans,
        "vectors": vectors,
        "series": series,
    })
}

fn run_sweep(cfg: Config, vectors: &[usize], reps: usize, seed: u64) -> Result<()> {
    log::info!("{cfg:#?}");

    let reports = sweep(&cfg, vectors, reps, seed).context("failed to perform sweep")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in &reports {
        let line = serde_json::to_string(report).context("failed to serialize report")?;
        writeln!(out, "{line}")?;
    }

    Ok(())
}
