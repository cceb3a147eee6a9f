//! Configuration management for exif-rewrite.
//!
//! The CLI has three subcommands, each with its own configuration struct:
//!
//! - `inspect` - decode and print the tags of a file
//! - `write` - rewrite a file with tags set or deleted
//! - `check` - structural validation of the EXIF stream
//!
//! Options are read from command-line arguments via clap, with environment
//! variable fallbacks for the write defaults.
//!
//! # Environment Variables
//!
//! - `EXIF_REWRITE_EXIF_VERSION` - ExifVersion written to new streams (default: 0300)
//! - `EXIF_REWRITE_ENDIAN` - Byte order of rewritten streams (default: keep the original's)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::codec::EncodeOptions;
use crate::format::tiff::{ByteOrder, ExifVersion, TagDiff, TagMap, Value};

// =============================================================================
// Default Values
// =============================================================================

/// Default ExifVersion for new streams.
pub const DEFAULT_EXIF_VERSION: &str = "0300";

/// Versions accepted by `--exif-version`.
pub const SUPPORTED_EXIF_VERSIONS: [&str; 3] = ["0230", "0232", "0300"];

// =============================================================================
// CLI Arguments
// =============================================================================

/// exif-rewrite - Read and rewrite EXIF metadata in TIFF, JPEG and RAW files.
#[derive(Parser, Debug, Clone)]
#[command(name = "exif-rewrite")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// The subcommand, with the global verbosity flag folded in.
    pub fn into_command(self) -> Command {
        let verbose = self.verbose;
        match self.command {
            Command::Inspect(mut config) => {
                config.verbose |= verbose;
                Command::Inspect(config)
            }
            Command::Write(mut config) => {
                config.verbose |= verbose;
                Command::Write(config)
            }
            Command::Check(mut config) => {
                config.verbose |= verbose;
                Command::Check(config)
            }
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the decoded tags and image payload of a file.
    Inspect(InspectConfig),

    /// Rewrite the EXIF metadata of a file.
    Write(WriteConfig),

    /// Validate the structure of a file's EXIF stream.
    Check(CheckConfig),
}

/// Byte order choice for `--endian`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndianArg {
    /// Intel order (II)
    Little,

    /// Motorola order (MM)
    Big,
}

impl From<EndianArg> for ByteOrder {
    fn from(arg: EndianArg) -> Self {
        match arg {
            EndianArg::Little => ByteOrder::LittleEndian,
            EndianArg::Big => ByteOrder::BigEndian,
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// File to inspect (TIFF, JPEG or RAW).
    pub file: PathBuf,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(skip)]
    pub verbose: bool,
}

// =============================================================================
// Write Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct WriteConfig {
    /// File to rewrite (TIFF, JPEG or RAW).
    pub file: PathBuf,

    /// Set a tag, e.g. `--set EXIF:Artist="Jane Doe"` or `--set EXIF:FNumber=2.8`.
    ///
    /// Numbers become integers or rationals, `hex:...` a byte blob, and a
    /// comma-separated list of numbers a sequence.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Delete a tag, e.g. `--delete EXIF:Software`.
    #[arg(long = "delete", value_name = "NAME")]
    pub delete: Vec<String>,

    /// JSON object of tags to set; `null` deletes.
    #[arg(long, value_name = "PATH")]
    pub tags_json: Option<PathBuf>,

    /// Write to this path instead of replacing the input.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Byte order of the rewritten stream (default: keep the original's).
    #[arg(long, value_enum, env = "EXIF_REWRITE_ENDIAN")]
    pub endian: Option<EndianArg>,

    /// ExifVersion written when the stream has none.
    #[arg(long, default_value = DEFAULT_EXIF_VERSION, env = "EXIF_REWRITE_EXIF_VERSION")]
    pub exif_version: String,

    /// Report what would change without writing anything.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(skip)]
    pub verbose: bool,
}

impl WriteConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.set.is_empty() && self.delete.is_empty() && self.tags_json.is_none() {
            return Err(
                "Nothing to write. Use --set, --delete or --tags-json to describe changes"
                    .to_string(),
            );
        }

        if !SUPPORTED_EXIF_VERSIONS.contains(&self.exif_version.as_str()) {
            return Err(format!(
                "exif_version must be one of {}, got {}",
                SUPPORTED_EXIF_VERSIONS.join(", "),
                self.exif_version
            ));
        }

        for assignment in &self.set {
            parse_assignment(assignment)?;
        }

        Ok(())
    }

    /// Library options for this write.
    pub fn encode_options(&self) -> Result<EncodeOptions, String> {
        Ok(EncodeOptions {
            byte_order: self.endian.map(ByteOrder::from),
            exif_version: self.exif_version.parse::<ExifVersion>()?,
            ..EncodeOptions::default()
        })
    }

    /// Changes from `--set` and `--delete`.
    ///
    /// `--tags-json` is merged in separately, see [`diff_from_json`].
    pub fn diff(&self) -> Result<TagDiff, String> {
        let mut diff = TagDiff::new();
        for assignment in &self.set {
            let (key, value) = parse_assignment(assignment)?;
            diff.insert(key.to_string(), Some(Value::parse_literal(value)));
        }
        for key in &self.delete {
            diff.insert(key.clone(), None);
        }
        Ok(diff)
    }

    /// The path the result is written to.
    pub fn destination(&self) -> &PathBuf {
        self.output.as_ref().unwrap_or(&self.file)
    }
}

/// Split `NAME=VALUE`.
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str), String> {
    match assignment.split_once('=') {
        Some((key, value)) if key.contains(':') => Ok((key, value)),
        _ => Err(format!(
            "invalid --set {:?}: expected NAMESPACE:Name=VALUE",
            assignment
        )),
    }
}

/// Parse a `--tags-json` document.
///
/// The document is an object of keys to values; `null` deletes the key.
pub fn diff_from_json(json: &str) -> Result<TagDiff, String> {
    serde_json::from_str::<TagDiff>(json).map_err(|e| format!("invalid tags JSON: {}", e))
}

/// Flatten a tag map into sorted `key = value` lines.
pub fn format_tags(tags: &TagMap) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{} = {}", k, v)).collect()
}

// =============================================================================
// Check Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// File to validate (TIFF, JPEG or RAW).
    pub file: PathBuf,

    #[arg(skip)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
