//! Transferpack: move hierarchies between repository instances.
//!
//! A project, dataset or image is packed on one instance into a single zip
//! packet holding a transfer graph (`transfer.json`) and every file the graph
//! depends on. Unpacking re-imports the files on another instance, matches
//! the freshly assigned image ids to the source ids through the files they
//! came from, and recreates the hierarchy with its annotations and ROIs.
//!
//! # Modules
//!
//! - [`graph`]: Transfer graph types, references and JSON I/O
//! - [`packet`]: Path handling, packet building and extraction
//! - [`importer`]: Sequential re-import of packet files
//! - [`reconcile`]: Source to destination image identity matching
//! - [`service`]: Session seams and the local filesystem instance
//! - [`transfer`]: `pack`, `unpack` and `inspect` orchestration
//! - [`validation`]: Graph validation and error reporting
//! - [`error`]: Error types for transferpack operations

pub mod error;
pub mod graph;
pub mod importer;
pub mod packet;
pub mod reconcile;
pub mod service;
pub mod transfer;
pub mod validation;

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub use error::TransferError;

use graph::ObjectRef;
use service::local::LocalInstance;
use service::{LinkMode, SessionGuard};

/// The transferpack CLI application.
#[derive(Parser)]
#[command(name = "transferpack")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory of the local instance to work on.
    #[arg(long, global = true, env = "TRANSFERPACK_INSTANCE", default_value = ".")]
    instance: PathBuf,

    /// Log verbosity ('error', 'warn', 'info', 'debug' or 'trace').
    #[arg(long, global = true, env = "TRANSFERPACK_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Pack a project, dataset or image into a zip packet.
    Pack(PackArgs),
    /// Recreate the contents of a packet on the instance.
    Unpack(UnpackArgs),
    /// Summarize and validate a packet without unpacking it.
    Inspect(InspectArgs),
}

/// Arguments for the pack subcommand.
#[derive(clap::Args)]
struct PackArgs {
    /// Object to pack: 'Project:<id>', 'Dataset:<id>', 'Image:<id>' or a bare project id.
    object: String,

    /// Archive to write; the extension is always set to '.zip'.
    archive: PathBuf,
}

/// Arguments for the unpack subcommand.
#[derive(clap::Args)]
struct UnpackArgs {
    /// Packet to unpack.
    archive: PathBuf,

    /// Directory to extract into (defaults to the archive path without extension).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Import files in place (linked) instead of copying them.
    #[arg(long = "ln_s_import")]
    ln_s_import: bool,

    /// Treat validation warnings as errors.
    #[arg(long)]
    strict: bool,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Packet to inspect.
    archive: PathBuf,

    /// Treat validation warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the summary ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the transferpack CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), TransferError> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Some(Commands::Pack(args)) => run_pack(cli.instance, args),
        Some(Commands::Unpack(args)) => run_unpack(cli.instance, args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("transferpack {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Move projects, datasets and images between repository instances.");
            println!();
            println!("Run 'transferpack --help' for usage information.");
            Ok(())
        }
    }
}

fn setup_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.to_string()))
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

/// Execute the pack subcommand.
fn run_pack(instance: PathBuf, args: PackArgs) -> Result<(), TransferError> {
    let root: ObjectRef = args.object.parse()?;
    let session = SessionGuard::new(LocalInstance::open(instance)?);

    let summary = transfer::pack(&*session, root, &args.archive)?;

    println!("Packed {} into {}", root, summary.archive.display());
    println!(
        "  {} image(s), {} annotation(s), {} ROI(s), {} file(s)",
        summary.images, summary.annotations, summary.rois, summary.files
    );
    Ok(())
}

/// Execute the unpack subcommand.
fn run_unpack(instance: PathBuf, args: UnpackArgs) -> Result<(), TransferError> {
    let mut session = SessionGuard::new(LocalInstance::open_or_create(instance)?);
    let opts = transfer::UnpackOptions {
        output: args.output,
        link_mode: if args.ln_s_import {
            LinkMode::InPlace
        } else {
            LinkMode::Copy
        },
        validate: validation::ValidateOptions {
            strict: args.strict,
        },
    };

    match transfer::unpack(&mut *session, &args.archive, &opts) {
        Ok(report) => {
            print!("{}", report);
            Ok(())
        }
        Err(err) => {
            if let TransferError::UnpackFailed { source, .. } = &err {
                if let TransferError::ValidationFailed { report, .. } = source.as_ref() {
                    print!("{}", report);
                }
            }
            Err(err)
        }
    }
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), TransferError> {
    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let summary = transfer::inspect(&args.archive, &opts)?;

    match args.output.as_str() {
        "json" => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &summary).map_err(io::Error::from)?;
            writeln!(stdout)?;
        }
        _ => {
            println!("Packet {}", args.archive.display());
            print!("{}", summary);
        }
    }

    if opts.is_blocking(&summary.validation) {
        Err(TransferError::ValidationFailed {
            error_count: summary.validation.error_count(),
            warning_count: summary.validation.warning_count(),
            report: summary.validation,
        })
    } else {
        Ok(())
    }
}
