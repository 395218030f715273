//! docbench workload driver
//!
//! Usage:
//!   docbench load --ops 100000 --size 2048          # populate a store
//!   docbench run --duration 60 --read-pct 80 \
//!       --update-pct 10 --create-pct 10             # timed mixed run
//!   docbench run --config run.toml --backend sqlite # config file + overrides
//!   docbench run --ops 50000 --query-pct 20 \
//!       --create-pct 80 --query by_category         # secondary-index queries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docbench::adapters::{MemoryStore, SqliteStore};
use docbench::engine::Engine;
use docbench::report;
use docbench::store::DocStore;
use docbench::BenchResult;
use docbench_core::{Mix, Phase, WorkloadConfig};

#[derive(Parser, Debug)]
#[command(name = "docbench", about = "Synthetic document workload driver")]
struct Cli {
    /// Log at debug level instead of info.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Populate a store with sequentially keyed documents.
    Load(LoadArgs),
    /// Drive a mixed workload against a store.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Number of documents to insert.
    #[arg(long)]
    ops: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Wall-clock bound in seconds. Takes precedence over --ops.
    #[arg(long)]
    duration: Option<u64>,

    /// Operation budget for count-bound runs.
    #[arg(long)]
    ops: Option<u64>,

    /// Create percentage of the mix.
    #[arg(long)]
    create_pct: Option<u32>,

    /// Read percentage of the mix.
    #[arg(long)]
    read_pct: Option<u32>,

    /// Update percentage of the mix.
    #[arg(long)]
    update_pct: Option<u32>,

    /// Delete percentage of the mix.
    #[arg(long)]
    delete_pct: Option<u32>,

    /// Query percentage of the mix.
    #[arg(long)]
    query_pct: Option<u32>,

    /// Secondary-index query to issue: by_category or by_local_group.
    #[arg(long)]
    query: Option<String>,

    /// Documents assumed present before the run starts.
    #[arg(long)]
    initial: Option<i64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parallel workers driving the store. Defaults to the CPU count.
    #[arg(long)]
    workers: Option<usize>,

    /// Target serialized document size in bytes.
    #[arg(long)]
    size: Option<usize>,

    /// Seed for deterministic sequencing and key draws.
    #[arg(long)]
    seed: Option<u64>,

    /// Store backend to drive.
    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    backend: Backend,

    /// SQLite database path (sqlite backend only).
    #[arg(long, default_value = "docbench.db")]
    db: PathBuf,

    /// Seconds between throughput report lines.
    #[arg(long)]
    report_interval: Option<u64>,

    /// Export directory for CSV + JSON results.
    #[arg(long)]
    export: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Memory,
    Sqlite,
}

fn main() -> BenchResult<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, common) = match &cli.command {
        Command::Load(args) => (resolve_load(args)?, &args.common),
        Command::Run(args) => (resolve_run(args)?, &args.common),
    };

    print_banner(&config, common.backend);

    let store = open_store(common, config.workers)?;
    let engine = Engine::new(config, store)?;
    let stats = engine.run()?;

    report::print_summary(&stats);

    if let Some(ref dir) = common.export {
        let export_dir = Path::new(dir);
        std::fs::create_dir_all(export_dir)?;
        report::export_csv(&stats, &export_dir.join("results.csv"))?;
        report::export_json(&stats, &export_dir.join("results.json"))?;
    }

    Ok(())
}

/// Load the config file if given, otherwise start from defaults with the
/// worker count matched to the machine.
fn base_config(common: &CommonArgs) -> BenchResult<WorkloadConfig> {
    let mut config = match &common.config {
        Some(path) => WorkloadConfig::load_toml(path)?,
        None => WorkloadConfig {
            workers: num_cpus::get(),
            ..WorkloadConfig::default()
        },
    };

    if let Some(workers) = common.workers {
        config.workers = workers;
    }
    if let Some(size) = common.size {
        config.size = size;
    }
    if let Some(seed) = common.seed {
        config.seed = seed;
    }
    if let Some(secs) = common.report_interval {
        config.report_interval_secs = secs;
    }
    Ok(config)
}

fn resolve_load(args: &LoadArgs) -> BenchResult<WorkloadConfig> {
    let mut config = base_config(&args.common)?;

    // Load is always a pure-create budget run.
    config.mix = Mix::create_only();
    config.duration_secs = None;
    if let Some(ops) = args.ops {
        config.operations = ops;
    } else if config.operations == 0 {
        config.operations = 10_000;
    }
    Ok(config)
}

fn resolve_run(args: &RunArgs) -> BenchResult<WorkloadConfig> {
    let mut config = base_config(&args.common)?;

    let mix_given = args.create_pct.is_some()
        || args.read_pct.is_some()
        || args.update_pct.is_some()
        || args.delete_pct.is_some()
        || args.query_pct.is_some();
    if mix_given {
        config.mix = Mix {
            create: args.create_pct.unwrap_or(0),
            read: args.read_pct.unwrap_or(0),
            update: args.update_pct.unwrap_or(0),
            delete: args.delete_pct.unwrap_or(0),
            query: args.query_pct.unwrap_or(0),
        };
    }
    if let Some(kind) = args.query.as_deref() {
        config.query_kind = Some(kind.parse()?);
    }
    if let Some(n) = args.initial {
        config.initial_documents = n;
    }
    if let Some(ops) = args.ops {
        config.operations = ops;
        if args.duration.is_none() {
            config.duration_secs = None;
        }
    }
    if let Some(secs) = args.duration {
        config.duration_secs = Some(secs);
    }
    Ok(config)
}

fn open_store(common: &CommonArgs, workers: usize) -> BenchResult<Arc<dyn DocStore>> {
    match common.backend {
        Backend::Memory => Ok(Arc::new(MemoryStore::new())),
        Backend::Sqlite => Ok(Arc::new(SqliteStore::open(&common.db, workers.max(1))?)),
    }
}

fn print_banner(config: &WorkloadConfig, backend: Backend) {
    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║              docbench workload driver                ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );

    let backend = match backend {
        Backend::Memory => "memory",
        Backend::Sqlite => "sqlite",
    };
    let phase = match config.phase() {
        Phase::Load { operations } => format!("{} ops", operations),
        Phase::Run { duration } => format!("{}s", duration.as_secs()),
    };
    println!(
        "  Backend: {}  Workers: {}  Size: {}B  Seed: {}",
        backend, config.workers, config.size, config.seed
    );
    println!(
        "  Mix: c{}/r{}/u{}/d{}/q{}  Bound: {}",
        config.mix.create,
        config.mix.read,
        config.mix.update,
        config.mix.delete,
        config.mix.query,
        phase
    );
}
