use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use placenta_lit::app::{classify_entities, http_app};
use placenta_lit::config::{ConfigLoader, ResolvedConfig};
use placenta_lit::domain::Entity;
use placenta_lit::error::LitError;
use placenta_lit::extract::PdfTextExtractor;
use placenta_lit::output::{HumanOutput, JsonOutput, OutputMode, StderrProgress};
use placenta_lit::server::{ServerState, serve};
use placenta_lit::workspace::Workspace;

#[derive(Parser)]
#[command(name = "placenta-lit")]
#[command(about = "Placenta literature analyzer for genes, metabolites and PDF articles")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ./placenta-lit.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Analyze a spreadsheet column of genes or metabolites")]
    Analyze(AnalyzeArgs),
    #[command(about = "Extract entities from a folder of PDF articles and analyze them")]
    Scan(ScanArgs),
    #[command(about = "Show the pathway guess and Scholar link without network access")]
    Classify(ClassifyArgs),
    #[command(about = "Run the HTTP front end")]
    Serve(ServeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    input: PathBuf,

    #[arg(long)]
    column: Option<String>,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args)]
struct ScanArgs {
    dir: PathBuf,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    no_ocr: bool,

    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args)]
struct ClassifyArgs {
    #[arg(required = true)]
    entities: Vec<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    #[arg(long)]
    workspace: Option<PathBuf>,
}

/// `LitError` converts into a report with `?` so the exit code can be
/// recovered by downcasting.
fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<LitError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LitError) -> u8 {
    match error {
        LitError::InvalidEntity(_)
        | LitError::MissingColumn { .. }
        | LitError::EmptyInput { .. }
        | LitError::UnsupportedSheetFormat(_)
        | LitError::NoDocuments(_) => 2,
        LitError::PubmedHttp(_)
        | LitError::PubmedStatus { .. }
        | LitError::EuropePmcHttp(_)
        | LitError::EuropePmcStatus { .. }
        | LitError::MissingTool(_)
        | LitError::Ocr(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze(args) => run_analyze(args, config, output_mode),
        Commands::Scan(args) => run_scan(args, config, output_mode),
        Commands::Classify(args) => run_classify(args, &config, output_mode),
        Commands::Serve(args) => run_serve(args, config),
    }
}

fn run_analyze(
    args: AnalyzeArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(threads) = args.threads {
        config.max_threads = threads.max(1);
    }
    let column = args.column.unwrap_or_else(|| config.column.clone());
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output_file));

    let app = http_app(config)?;
    match output_mode {
        OutputMode::Json => {
            let result = app.run_spreadsheet(&args.input, &column, &output, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.run_spreadsheet(&args.input, &column, &output, &StderrProgress)?;
            HumanOutput::print_run(&result);
        }
    }
    Ok(())
}

fn run_scan(
    args: ScanArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(threads) = args.threads {
        config.max_threads = threads.max(1);
    }
    if args.no_ocr {
        config.ocr = false;
    }
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output_file));

    let extractor = PdfTextExtractor::from_environment(config.ocr);
    tracing::info!(dir = %args.dir.display(), ocr = extractor.ocr_enabled(), "starting scan");
    let app = http_app(config)?;
    match output_mode {
        OutputMode::Json => {
            let result = app.run_pdf_folder(&args.dir, &extractor, &output, &JsonOutput)?;
            JsonOutput::print_scan(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.run_pdf_folder(&args.dir, &extractor, &output, &StderrProgress)?;
            HumanOutput::print_scan(&result);
        }
    }
    Ok(())
}

fn run_classify(
    args: ClassifyArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let entities = args
        .entities
        .iter()
        .map(|value| value.parse::<Entity>())
        .collect::<Result<Vec<_>, _>>()?;
    let result = classify_entities(&entities, &config.query_terms);
    match output_mode {
        OutputMode::Json => JsonOutput::print_classify(&result).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_classify(&result),
    }
    Ok(())
}

fn run_serve(args: ServeArgs, config: ResolvedConfig) -> miette::Result<()> {
    let workspace = match args.workspace {
        Some(path) => Workspace::from_path(&path)?,
        None => Workspace::new()?,
    };
    let state = ServerState::new(config, workspace);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(serve(args.bind, state))?;
    Ok(())
}
