use std::env;
use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use wordfreq_source::{LoadMode, SourceFile, source_files};

use wordfreq::handlers::WordCount;
use wordfreq::worker::{EXIT_SOURCE_UNAVAILABLE, run_worker};
use wordfreq::{
    Aggregator, AppState, DEFAULT_CHUNKS, DEFAULT_TOP_K, EngineConfig, EngineError,
    FrequencyTable, MergeOrder, Ranking, router, top_k,
};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const MAX_TOP_K: usize = 1000;
const MAX_CHUNKS: usize = 64;

#[derive(Parser)]
#[command(name = "wordfreq", version)]
#[command(about = "Count the most frequent words across text files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count FILES and print the most frequent words.
    Count(CountArgs),
    /// Count FILES once, then serve the ranking over HTTP.
    Serve(ServeArgs),
    /// Count one file and write its table to stdout (used by --isolation process).
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args)]
struct EngineArgs {
    /// Concurrent chunks per source.
    #[arg(long, env = "WORDFREQ_CHUNKS", default_value_t = DEFAULT_CHUNKS, value_parser = parse_chunks)]
    chunks: usize,
    /// How source files are loaded: mmap or owned.
    #[arg(long, env = "WORDFREQ_LOAD_MODE", default_value_t = LoadMode::Mmap)]
    load_mode: LoadMode,
}

#[derive(Args)]
struct CountArgs {
    #[command(flatten)]
    engine: EngineArgs,
    /// Number of words to report.
    #[arg(long, env = "WORDFREQ_TOP", default_value_t = DEFAULT_TOP_K)]
    top: usize,
    #[arg(long, value_enum, default_value_t = Isolation::Thread)]
    isolation: Isolation,
    #[arg(long, value_enum, default_value_t = MergeArg::Input)]
    merge_order: MergeArg,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Files to count; defaults to the classic corpus in the current directory.
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, default_value_t = MAX_TOP_K)]
    max_top_k: usize,
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct WorkerArgs {
    #[command(flatten)]
    engine: EngineArgs,
    file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Isolation {
    /// One thread per source.
    Thread,
    /// One child process per source.
    Process,
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeArg {
    Input,
    Arrival,
}

impl From<MergeArg> for MergeOrder {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Input => MergeOrder::Input,
            MergeArg::Arrival => MergeOrder::Arrival,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Count(args) => count(args)?,
        Commands::Serve(args) => {
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("start tokio runtime")?
                .block_on(serve(args))?;
        }
        Commands::Worker(args) => return worker(args),
    }
    Ok(ExitCode::SUCCESS)
}

fn count(args: CountArgs) -> anyhow::Result<()> {
    let files = source_files(&args.files, args.engine.load_mode);
    let aggregator = Aggregator::new(EngineConfig {
        chunks_per_source: args.engine.chunks,
        merge_order: args.merge_order.into(),
    });

    let start = Instant::now();
    let table = match args.isolation {
        Isolation::Thread => {
            info!(
                "counting {} sources, {} chunks each, one thread per source",
                files.len(),
                args.engine.chunks
            );
            aggregator.aggregate(&files)?
        }
        Isolation::Process => {
            let program = env::current_exe().context("locate wordfreq executable")?;
            info!(
                "counting {} sources, {} chunks each, one process per source",
                files.len(),
                args.engine.chunks
            );
            aggregator.aggregate_processes(&program, &files)?
        }
    };
    info!("counted in {} ms", start.elapsed().as_millis());

    print_report(&table, args.top, args.json)
}

fn print_report(table: &FrequencyTable, k: usize, json: bool) -> anyhow::Result<()> {
    let top = top_k(table, k);
    let mut out = BufWriter::new(io::stdout().lock());
    if json {
        let items: Vec<WordCount> = top.iter().map(WordCount::from).collect();
        serde_json::to_writer_pretty(&mut out, &items)?;
        writeln!(out)?;
    } else {
        writeln!(out, "Top {k} words:")?;
        for entry in &top {
            writeln!(out, "{entry}")?;
        }
    }
    out.flush()?;
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let files = source_files(&args.files, args.engine.load_mode);
    let chunks = args.engine.chunks;
    info!("binding to {}:{}", args.host, args.port);

    let start = Instant::now();
    let sources = files.len();
    let table = tokio::task::spawn_blocking(move || {
        Aggregator::new(EngineConfig {
            chunks_per_source: chunks,
            ..EngineConfig::default()
        })
        .aggregate(&files)
    })
    .await??;
    let ranking = Ranking::from_table(&table);
    info!(
        "ranked {} distinct words from {} sources in {} ms",
        ranking.distinct(),
        sources,
        start.elapsed().as_millis()
    );

    let state = AppState {
        ranking: Arc::new(ranking),
        sources,
        max_top_k: args.max_top_k,
        default_chunks: chunks,
        max_chunks: MAX_CHUNKS,
    };
    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

fn worker(args: WorkerArgs) -> anyhow::Result<ExitCode> {
    let file = SourceFile::new(args.file, args.engine.load_mode);
    match run_worker(&file, args.engine.chunks, io::stdout().lock()) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(EngineError::SourceUnavailable { reason, .. }) => {
            eprintln!("{reason}");
            Ok(ExitCode::from(EXIT_SOURCE_UNAVAILABLE as u8))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_chunks(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("chunks must be >= 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
