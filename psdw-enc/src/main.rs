#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::doc_markdown,
    clippy::uninlined_format_args,
    clippy::needless_pass_by_value,
    clippy::cast_precision_loss
)]

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use psdw::{Compression, PsdError};
use psdw_enc::{CompressionArg, EncodeError};

/// psdw encoder
#[derive(Parser)]
#[command(name = "psdw-enc")]
#[command(about = "psdw encoder - stacks images as the layers of a PSD document")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Input images, bottom layer first
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output PSD file
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Channel compression for layers and composite
    #[arg(short, long, value_enum, default_value = "rle")]
    compression: CompressionArg,

    /// Canvas size as WIDTHxHEIGHT (defaults to the largest input)
    #[arg(long, value_parser = psdw_enc::parse_canvas)]
    canvas: Option<(u32, u32)>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,

    /// Number of threads for decoding and compression (0 = all cores)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
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
        error!("Encoding failed: {:#}", e);
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
    info!("psdw encoder v{}", env!("CARGO_PKG_VERSION"));
    info!("Inputs: {}", args.inputs.len());
    info!("Output: {}", args.output.display());

    validate_args(&args)?;

    if args.threads > 0 {
        psdw_enc::configure_threads(args.threads)?;
    }

    let progress = if args.quiet {
        None
    } else {
        Some(create_progress_bar(args.inputs.len() as u64 + 2))
    };

    let mut layers = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        if let Some(ref pb) = progress {
            pb.set_message(format!("Decoding {}", input.display()));
        }
        let layer = psdw_enc::load_layer(input)?;
        info!(
            "Layer '{}': {}x{} pixels",
            layer.name, layer.width, layer.height
        );
        layers.push(layer);
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    let compression = Compression::from(args.compression);
    let document = psdw_enc::document_from_layers(layers, args.canvas, compression)?;
    info!(
        "Canvas {}x{}, {} compression",
        document.width, document.height, compression
    );

    if let Some(ref pb) = progress {
        pb.set_message("Encoding document...");
        pb.inc(1);
    }

    let report = psdw_enc::write_document_file(&args.output, &document)?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Encoding complete!");
    }

    let raw_size = u64::from(document.width) * u64::from(document.height) * 3
        + document
            .layers
            .iter()
            .map(|layer| layer.pixels.len() as u64)
            .sum::<u64>();

    info!(
        "Output file: {} ({} bytes)",
        args.output.display(),
        report.total_bytes
    );
    info!(
        "Compression ratio: {:.2}x",
        raw_size as f64 / report.total_bytes as f64
    );
    info!("Encoding completed successfully");

    Ok(())
}

fn validate_args(args: &Args) -> Result<()> {
    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!("Output directory does not exist: {}", parent.display());
        }
    }

    if let Some((width, height)) = args.canvas {
        if width == 0 || height == 0 || width > psdw::MAX_DIMENSION || height > psdw::MAX_DIMENSION
        {
            anyhow::bail!(
                "Canvas must be between 1x1 and {max}x{max}, got {}x{}",
                width,
                height,
                max = psdw::MAX_DIMENSION
            );
        }
    }

    if args.quiet && args.verbose {
        warn!("Both --quiet and --verbose specified, using --quiet");
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
