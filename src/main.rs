//! Rinse - Clean tabular CSV datasets from the command line
//!
//! Loads a CSV file, applies cleaning operations in order and writes the
//! result, or serves a cleaning session over JSON-RPC.

use anyhow::{Context, Result};
use argh::FromArgs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use rinse::config::CleanConfig;
use rinse::data::Upload;
use rinse::error::CleanError;
use rinse::export::write_csv;
use rinse::mcp::start_server;
use rinse::session::{LoadOutcome, Operation, Session};

/// Rinse - session-based CSV cleaning
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Clean(CleanArgs),
    Inspect(InspectArgs),
    Serve(ServeArgs),
}

/// apply cleaning operations to a CSV file and export the result
#[derive(FromArgs)]
#[argh(subcommand, name = "clean")]
struct CleanArgs {
    /// path to the CSV file, or "-" for stdin
    #[argh(positional)]
    file: String,

    /// operation to apply, e.g. "dedup", "fill:Age:mean", "rename:old=new"
    /// (repeatable, applied in order)
    #[argh(option, long = "op")]
    ops: Vec<Operation>,

    /// JSON file with a list of operations, applied before any --op
    #[argh(option)]
    script: Option<String>,

    /// output path (default: updated_data_web_app.csv)
    #[argh(option, short = 'o')]
    output: Option<String>,

    /// JSON config file
    #[argh(option)]
    config: Option<String>,

    /// strftime format used when converting text to timestamps
    #[argh(option)]
    date_format: Option<String>,

    /// report rejected operations and continue instead of aborting
    #[argh(switch)]
    keep_going: bool,
}

/// print shape, column types, duplicates and missing values of a CSV file
#[derive(FromArgs)]
#[argh(subcommand, name = "inspect")]
struct InspectArgs {
    /// path to the CSV file, or "-" for stdin
    #[argh(positional)]
    file: String,

    /// JSON config file
    #[argh(option)]
    config: Option<String>,
}

/// serve a cleaning session over JSON-RPC
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// port to listen on (default: 3917)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// JSON config file
    #[argh(option)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    // The CLI prints its own status lines; the server relies on the log
    let default_filter = match args.command {
        Command::Serve(_) => "rinse=info,tower_http=info",
        _ => "rinse=warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Clean(args) => run_clean(&args),
        Command::Inspect(args) => run_inspect(&args),
        Command::Serve(args) => run_serve(&args),
    }
}

fn load_config(path: Option<&str>) -> Result<CleanConfig> {
    match path {
        Some(path) => CleanConfig::from_file(path),
        None => Ok(CleanConfig::default()),
    }
}

/// Read the file (or stdin) and load it into a fresh session.
fn open_session(file: &str, config: CleanConfig) -> Result<Session> {
    if file == "-" {
        eprintln!("📂 Reading from stdin...");
    } else {
        eprintln!("📂 Opening {}...", file);
    }
    let upload =
        Upload::from_arg(file).with_context(|| format!("Failed to open dataset: {}", file))?;

    let mut session = Session::new(config);
    let outcome = session
        .load(&upload)
        .with_context(|| format!("Failed to parse {} as CSV", upload.name))?;
    if let LoadOutcome::Loaded { rows, columns } = outcome {
        eprintln!(
            "✓ Loaded {} rows x {} columns ({})",
            rows,
            columns,
            upload.size_human()
        );
    }
    Ok(session)
}

fn read_script(path: &str) -> Result<Vec<Operation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read operation script: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid operation script: {}", path))
}

/// Headless cleaning run.
fn run_clean(args: &CleanArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(format) = &args.date_format {
        config.timestamp_format = format.clone();
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.export_filename.clone());

    let mut operations = match &args.script {
        Some(path) => read_script(path)?,
        None => Vec::new(),
    };
    operations.extend(args.ops.iter().cloned());

    let mut session = open_session(&args.file, config)?;

    eprintln!("🔧 Applying {} operation(s)...", operations.len());
    let mut rejected = 0usize;
    for op in operations {
        let label = op.to_string();
        match session.apply(op) {
            Ok(report) => eprintln!("✓ {}", report),
            Err(e) if args.keep_going && e.is_warning() => {
                rejected += 1;
                eprintln!("⚠ {}: {} (skipped)", label, e);
            }
            Err(e) => return Err(e).with_context(|| format!("Operation failed: {}", label)),
        }
    }

    let dataset = session.dataset().ok_or(CleanError::NoDataset)?;
    write_csv(dataset, Path::new(&output))
        .with_context(|| format!("Failed to write output file: {}", output))?;

    eprintln!("\n📊 Summary:");
    eprintln!("   Rows:      {}", dataset.row_count());
    eprintln!("   Columns:   {}", dataset.column_count());
    eprintln!("   Applied:   {}", session.log().len() - rejected);
    if rejected > 0 {
        eprintln!("   Rejected:  {}", rejected);
    }
    eprintln!("\n✅ Output written to: {}", output);

    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let session = open_session(&args.file, config)?;
    print!("{}", session.overview()?);
    Ok(())
}

fn run_serve(args: &ServeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let port = args.port.unwrap_or(config.server_port);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(start_server(config, port))
}
