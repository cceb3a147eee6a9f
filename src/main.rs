//! exif-rewrite - Read and rewrite EXIF metadata in TIFF, JPEG and RAW files.
//!
//! This binary is a thin shell over the library: it reads the input file,
//! calls the codec, and writes the result back atomically.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exif_rewrite::{
    config::{diff_from_json, format_tags, CheckConfig, Cli, Command, InspectConfig, WriteConfig},
    decode_stream, detect_path, embedded_stream, extract_payload, validate_stream, write_atomic,
    ContainerFormat, ExifCodec, TagDiff, TagRegistry,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Inspect(config) => run_inspect(config),
        Command::Write(config) => run_write(config),
        Command::Check(config) => run_check(config),
    }
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so `--json` output stays parseable.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "exif_rewrite=debug"
    } else {
        "exif_rewrite=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Read a file and identify its container.
fn load(path: &Path) -> Result<(Vec<u8>, ContainerFormat), String> {
    let data = fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let format = detect_path(path, &data).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok((data, format))
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    init_logging(config.verbose);

    let (data, format) = match load(&config.file) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let stream = match embedded_stream(&data, format) {
        Ok(stream) => stream,
        Err(e) => {
            error!("{}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let Some(stream) = stream else {
        if config.json {
            let report = serde_json::json!({
                "file": config.file.display().to_string(),
                "format": format.name(),
                "tags": {},
            });
            print_json(&report);
        } else {
            println!("File:    {}", config.file.display());
            println!("Format:  {}", format);
            println!();
            println!("  (no EXIF segment)");
        }
        return ExitCode::SUCCESS;
    };

    let decoded = match decode_stream(&stream, TagRegistry::standard()) {
        Ok(decoded) => decoded,
        Err(e) => {
            error!("{}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    // Payload problems do not hide the tags
    let payload = match extract_payload(&stream) {
        Ok(payload) => Some(payload.summary()),
        Err(e) => {
            warn!("cannot read image payload: {}", e);
            None
        }
    };

    let byte_order = String::from_utf8_lossy(&decoded.byte_order.marker()).into_owned();
    let directories: Vec<String> = decoded.directories.iter().map(|d| d.to_string()).collect();

    if config.json {
        let report = serde_json::json!({
            "file": config.file.display().to_string(),
            "format": format.name(),
            "byte_order": byte_order,
            "directories": directories,
            "payload": payload,
            "tags": decoded.tags,
        });
        print_json(&report);
        return ExitCode::SUCCESS;
    }

    println!("File:        {}", config.file.display());
    println!("Format:      {}", format);
    println!("Byte order:  {}", byte_order);
    println!("Directories: {}", directories.join(", "));
    match &payload {
        Some(summary) if summary.segments > 0 => {
            println!(
                "Payload:     {} {}, {} bytes, sha256 {}",
                summary.segments, summary.layout, summary.bytes, summary.sha256
            );
        }
        Some(_) => println!("Payload:     none"),
        None => println!("Payload:     unreadable"),
    }
    println!();
    for line in format_tags(&decoded.tags) {
        println!("  {}", line);
    }

    ExitCode::SUCCESS
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("cannot render JSON: {}", e),
    }
}

// =============================================================================
// Write Command
// =============================================================================

fn run_write(config: WriteConfig) -> ExitCode {
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (options, diff) = match build_request(&config) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (data, format) = match load(&config.file) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let codec = ExifCodec::new(TagRegistry::standard(), options);
    let encoded = match codec.rewrite_container(&data, format, &diff) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("{}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in &encoded.diagnostics {
        println!("! {}", diagnostic);
    }

    let destination = config.destination();
    if config.dry_run {
        println!(
            "Dry run: {} {} would become {} bytes (was {}), nothing written",
            format,
            destination.display(),
            encoded.bytes.len(),
            data.len()
        );
        return ExitCode::SUCCESS;
    }

    if let Err(e) = write_atomic(destination, &encoded.bytes) {
        error!("cannot write {}: {}", destination.display(), e);
        return ExitCode::FAILURE;
    }

    info!("wrote {} ({} bytes)", destination.display(), encoded.bytes.len());
    println!(
        "✓ {} written ({} changes, {} diagnostics)",
        destination.display(),
        diff.len(),
        encoded.diagnostics.len()
    );

    ExitCode::SUCCESS
}

/// Library options and the merged tag diff for a write.
///
/// `--tags-json` is applied first, so `--set` and `--delete` win.
fn build_request(config: &WriteConfig) -> Result<(exif_rewrite::EncodeOptions, TagDiff), String> {
    let options = config.encode_options()?;

    let mut diff = match &config.tags_json {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            diff_from_json(&json)?
        }
        None => TagDiff::new(),
    };
    diff.extend(config.diff()?);

    Ok((options, diff))
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    // Initialize minimal logging for check command
    if config.verbose {
        init_logging(true);
    }

    println!("exif-rewrite structure check");
    println!("════════════════════════════");
    println!();

    let (data, format) = match load(&config.file) {
        Ok(loaded) => {
            println!("✓ Format: {}", loaded.1);
            loaded
        }
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stream = match embedded_stream(&data, format) {
        Ok(Some(stream)) => stream,
        Ok(None) => {
            println!("✓ No EXIF segment, nothing to check");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = validate_stream(&stream);

    for warning in &result.warnings {
        println!("! {}", warning);
    }
    for error in &result.errors {
        println!("✗ {}", error);
    }

    println!();
    println!("════════════════════════════");
    if result.is_valid {
        println!("✓ Stream is valid ({} bytes)", stream.len());
        ExitCode::SUCCESS
    } else {
        println!("✗ {} error(s) found", result.errors.len());
        ExitCode::FAILURE
    }
}
