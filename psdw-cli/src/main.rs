#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::doc_markdown,
    clippy::uninlined_format_args,
    clippy::match_same_arms,
    clippy::needless_pass_by_value
)]

mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use psdw::{Compression, Document, EncodeReport, PsdError};
use psdw_enc::{CompressionArg, EncodeError};

use crate::manifest::{Manifest, ManifestFormat};

/// psdw CLI tools
#[derive(Parser)]
#[command(name = "psdw")]
#[command(about = "psdw CLI tools - build layered PSD documents and report their layout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Number of worker threads (0 = all cores)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack images as layers of a PSD document, first image at the bottom
    Encode {
        /// Input images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output PSD file
        #[arg(short, long)]
        output: PathBuf,
        /// Channel compression
        #[arg(short, long, value_enum, default_value = "rle")]
        compression: CompressionArg,
        /// Canvas size as WIDTHxHEIGHT (defaults to the largest input)
        #[arg(long, value_parser = psdw_enc::parse_canvas)]
        canvas: Option<(u32, u32)>,
        /// Also save the flattened composite as an image
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Build a PSD document from a JSON, YAML or TOML manifest
    Compose {
        /// Manifest file
        manifest: PathBuf,
        /// Output PSD file
        #[arg(short, long)]
        output: PathBuf,
        /// Override the manifest's compression
        #[arg(short, long, value_enum)]
        compression: Option<CompressionArg>,
        /// Also save the flattened composite as an image
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Encode without writing a file and print the resulting layout
    Report {
        /// A manifest file, or one or more images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Compression (defaults to the manifest's, or RLE for images)
        #[arg(short, long, value_enum)]
        compression: Option<CompressionArg>,
        /// Canvas size for image inputs
        #[arg(long, value_parser = psdw_enc::parse_canvas)]
        canvas: Option<(u32, u32)>,
        /// Output format (json, yaml, toml)
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,
        /// Pretty print output
        #[arg(short, long)]
        pretty: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ReportFormat {
    Json,
    Yaml,
    Toml,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.quiet {
        log::LevelFilter::Error
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(args) {
        error!("Command failed: {:#}", e);

        process::exit(exit_code(&e));
    }
}

/// 1 for bad input or I/O failure, 2 for anything else
fn exit_code(error: &anyhow::Error) -> i32 {
    let psd_error = match error.downcast_ref::<EncodeError>() {
        Some(EncodeError::Psd(err)) => Some(err),
        Some(_) => return 1,
        None => error.downcast_ref::<PsdError>(),
    };

    match psd_error {
        Some(err) if err.is_validation_error() => 1,
        Some(PsdError::Io(_)) => 1,
        _ => 2,
    }
}

fn run(args: Args) -> Result<()> {
    if args.quiet && args.verbose {
        warn!("Both --quiet and --verbose specified, using --quiet");
    }

    if args.threads > 0 {
        psdw_enc::configure_threads(args.threads)?;
    }

    let quiet = args.quiet;
    match args.command {
        Commands::Encode {
            inputs,
            output,
            compression,
            canvas,
            preview,
        } => cmd_encode(&inputs, &output, compression, canvas, preview, quiet),
        Commands::Compose {
            manifest,
            output,
            compression,
            preview,
        } => cmd_compose(&manifest, &output, compression, preview, quiet),
        Commands::Report {
            inputs,
            compression,
            canvas,
            format,
            pretty,
        } => cmd_report(&inputs, compression, canvas, format, pretty),
    }
}

fn cmd_encode(
    inputs: &[PathBuf],
    output: &Path,
    compression: CompressionArg,
    canvas: Option<(u32, u32)>,
    preview: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    info!("Encoding {} images to {}", inputs.len(), output.display());
    check_output_dir(output)?;

    let progress = (!quiet).then(|| create_progress_bar(3));
    if let Some(ref pb) = progress {
        pb.set_message("Decoding inputs...");
    }

    let document = psdw_enc::document_from_images(inputs, canvas, compression.into())?;

    if let Some(ref pb) = progress {
        pb.set_message("Encoding document...");
        pb.inc(1);
    }

    finish_document(&document, output, preview.as_deref(), progress.as_ref())
}

fn cmd_compose(
    manifest_path: &Path,
    output: &Path,
    compression: Option<CompressionArg>,
    preview: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    info!("Composing {} to {}", manifest_path.display(), output.display());
    check_output_dir(output)?;

    let progress = (!quiet).then(|| create_progress_bar(3));
    if let Some(ref pb) = progress {
        pb.set_message("Building layers...");
    }

    let document = load_manifest(manifest_path, compression)?;

    if let Some(ref pb) = progress {
        pb.set_message("Encoding document...");
        pb.inc(1);
    }

    finish_document(&document, output, preview.as_deref(), progress.as_ref())
}

fn cmd_report(
    inputs: &[PathBuf],
    compression: Option<CompressionArg>,
    canvas: Option<(u32, u32)>,
    format: ReportFormat,
    pretty: bool,
) -> Result<()> {
    let document = match inputs {
        [single] if ManifestFormat::from_path(single).is_some() => {
            if canvas.is_some() {
                warn!("--canvas is ignored for manifests");
            }
            load_manifest(single, compression)?
        }
        _ => psdw_enc::document_from_images(
            inputs,
            canvas,
            compression.map_or(Compression::default(), Compression::from),
        )?,
    };

    let report = psdw::Encoder::new(std::io::sink()).encode(&document)?;
    println!("{}", render_report(&report, format, pretty)?);
    Ok(())
}

fn load_manifest(path: &Path, compression: Option<CompressionArg>) -> Result<Document> {
    let manifest = Manifest::load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut document = manifest.into_document(base_dir)?;

    if let Some(compression) = compression {
        document.compression = compression.into();
    }

    info!(
        "Manifest: {}x{} canvas, {} layers, {} compression",
        document.width,
        document.height,
        document.layers.len(),
        document.compression
    );
    Ok(document)
}

fn finish_document(
    document: &Document,
    output: &Path,
    preview: Option<&Path>,
    progress: Option<&ProgressBar>,
) -> Result<()> {
    let report = psdw_enc::write_document_file(output, document)?;

    if let Some(pb) = progress {
        pb.inc(1);
    }

    if let Some(preview) = preview {
        if let Some(pb) = progress {
            pb.set_message("Saving preview...");
        }
        document.flatten().save(preview)?;
        info!("Preview: {}", preview.display());
    }

    if let Some(pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Done!");
    }

    info!(
        "Output file: {} ({} bytes, {} layers, {} hidden)",
        output.display(),
        report.total_bytes,
        report.layers.len(),
        report.hidden_layers()
    );
    Ok(())
}

fn render_report(report: &EncodeReport, format: ReportFormat, pretty: bool) -> Result<String> {
    let output = match format {
        ReportFormat::Json => {
            if pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            }
        }
        ReportFormat::Yaml => serde_yaml::to_string(report)?,
        ReportFormat::Toml => {
            if pretty {
                toml::to_string_pretty(report)?
            } else {
                toml::to_string(report)?
            }
        }
    };
    Ok(output)
}

fn check_output_dir(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!("Output directory does not exist: {}", parent.display());
        }
    }
    Ok(())
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}
