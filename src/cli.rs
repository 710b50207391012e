//! Command-line interface for inspecting and editing caches
//!
//! This module handles parsing of CLI arguments using clap and dispatching
//! each subcommand to the matching [`Cache`] operation.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::cache::{Cache, CacheError, CborCodec, JsonCodec, Lookup, WriteMode};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified codec name is not recognized
    #[error("Invalid codec: '{0}'. Valid codecs: json, cbor")]
    InvalidCodec(String),

    /// The timeout is negative, not a number, or too large
    #[error("Invalid timeout: '{0}'. Expected a non-negative number of seconds")]
    InvalidTimeout(String),
}

/// fcache - persistent file-based key-value caches
#[derive(Parser, Debug)]
#[command(name = "fcache")]
#[command(about = "Inspect and edit persistent file-based caches")]
#[command(version)]
pub struct Cli {
    /// Name of the application the cache belongs to
    #[arg(short, long, value_name = "APPNAME")]
    pub app: String,

    /// Application author, used on Windows (defaults to the application name)
    #[arg(long, value_name = "APPAUTHOR")]
    pub author: Option<String>,

    /// Name of the cache
    #[arg(short, long, value_name = "CACHENAME")]
    pub cache: String,

    /// Use this directory instead of the platform cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// On-disk encoding of the cache file: json or cbor
    #[arg(long, value_name = "CODEC", default_value = "json")]
    pub codec: String,

    /// Rewrite the cache file through a synced temp file and rename
    #[arg(long)]
    pub atomic: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the path of the cache file
    Path,
    /// Print the value stored under a key as JSON
    ///
    /// Exits with status 2 and prints nothing if the entry has expired.
    Get {
        key: String,
        /// Return the value even if it has expired
        #[arg(long = "override")]
        override_expiry: bool,
        /// Value to print if the key is absent
        #[arg(long, value_name = "VALUE")]
        default: Option<String>,
    },
    /// Store a value (parsed as JSON, or taken as a plain string)
    Set {
        key: String,
        value: String,
        /// Seconds until the value expires (may be fractional)
        #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
        timeout: Option<f64>,
    },
    /// Force a key to expire now
    Invalidate { key: String },
    /// Remove a key
    Remove { key: String },
    /// Remove all keys
    Flush,
    /// Delete the cache file
    Delete,
    /// List all keys, including expired ones
    Keys,
}

/// Supported on-disk encodings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodecKind {
    #[default]
    Json,
    Cbor,
}

/// What happened when a command ran successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// `get` found the key but the entry has expired
    Stale,
}

/// Parses a codec name into a CodecKind.
pub fn parse_codec_arg(s: &str) -> Result<CodecKind, CliError> {
    match s.to_lowercase().as_str() {
        "json" => Ok(CodecKind::Json),
        "cbor" => Ok(CodecKind::Cbor),
        _ => Err(CliError::InvalidCodec(s.to_string())),
    }
}

/// Converts a timeout in (possibly fractional) seconds to a Duration.
pub fn parse_timeout_arg(seconds: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| CliError::InvalidTimeout(seconds.to_string()))
}

/// Parses a value argument as JSON, falling back to a plain string.
///
/// `42` becomes a number and `"42"` a string, while `chicago` is stored as the
/// string "chicago".
pub fn parse_value_arg(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_string()))
}

/// Cache configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub cachename: String,
    pub appname: String,
    pub appauthor: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub codec: CodecKind,
    pub write_mode: WriteMode,
}

impl CacheOptions {
    /// Creates CacheOptions from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(CacheOptions)` with the requested settings
    /// * `Err(CliError)` if an invalid codec was specified
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Ok(CacheOptions {
            cachename: cli.cache.clone(),
            appname: cli.app.clone(),
            appauthor: cli.author.clone(),
            cache_dir: cli.cache_dir.clone(),
            codec: parse_codec_arg(&cli.codec)?,
            write_mode: if cli.atomic {
                WriteMode::Atomic
            } else {
                WriteMode::InPlace
            },
        })
    }

    /// Opens the cache these options describe, creating its file if needed
    pub fn open(&self) -> Result<Cache, CacheError> {
        let mut builder = Cache::builder(&self.cachename, &self.appname)
            .appauthor(self.appauthor.as_deref())
            .write_mode(self.write_mode);
        if let Some(dir) = &self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        builder = match self.codec {
            CodecKind::Json => builder.codec(JsonCodec),
            CodecKind::Cbor => builder.codec(CborCodec),
        };
        builder.open()
    }
}

/// Runs the parsed command, writing its output to `out`.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<Outcome, Box<dyn std::error::Error>> {
    let options = CacheOptions::from_cli(cli)?;
    let cache = options.open()?;

    match &cli.command {
        Command::Path => {
            writeln!(out, "{}", cache.path().display())?;
        }
        Command::Get {
            key,
            override_expiry,
            default,
        } => {
            let value = match cache.lookup::<serde_json::Value>(key)? {
                Lookup::Fresh(value) => value,
                Lookup::Stale(value) if *override_expiry => value,
                Lookup::Stale(_) => return Ok(Outcome::Stale),
                Lookup::Missing => match default {
                    Some(default) => parse_value_arg(default),
                    None => return Err(CacheError::KeyNotFound(key.clone()).into()),
                },
            };
            writeln!(out, "{}", value)?;
        }
        Command::Set {
            key,
            value,
            timeout,
        } => {
            let timeout = timeout.map(parse_timeout_arg).transpose()?;
            cache.set(key, &parse_value_arg(value), timeout)?;
        }
        Command::Invalidate { key } => cache.invalidate(key)?,
        Command::Remove { key } => cache.remove(key)?,
        Command::Flush => cache.flush()?,
        Command::Delete => cache.delete()?,
        Command::Keys => {
            for key in cache.keys()? {
                writeln!(out, "{}", key)?;
            }
        }
    }
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn parse(temp_dir: &TempDir, args: &[&str]) -> Cli {
        let dir = temp_dir.path().to_str().unwrap().to_string();
        let mut argv = vec!["fcache", "--app", "stats", "--cache", "pop", "--cache-dir", dir.as_str()];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn run_to_string(cli: &Cli) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run(cli, &mut out).expect("Command should succeed");
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_codec_arg() {
        assert_eq!(parse_codec_arg("json").unwrap(), CodecKind::Json);
        assert_eq!(parse_codec_arg("CBOR").unwrap(), CodecKind::Cbor);
    }

    #[test]
    fn test_parse_codec_arg_invalid() {
        let err = parse_codec_arg("pickle").unwrap_err();
        assert!(err.to_string().contains("Invalid codec"));
        assert!(err.to_string().contains("pickle"));
    }

    #[test]
    fn test_parse_timeout_arg() {
        assert_eq!(parse_timeout_arg(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_timeout_arg(0.0).unwrap(), Duration::ZERO);
        assert!(parse_timeout_arg(-1.0).is_err());
        assert!(parse_timeout_arg(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_value_arg() {
        assert_eq!(parse_value_arg("9729825"), json!(9729825));
        assert_eq!(parse_value_arg("\"42\""), json!("42"));
        assert_eq!(parse_value_arg("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_value_arg("chicago"), json!("chicago"));
    }

    #[test]
    fn test_cli_parse_get_flags() {
        let cli = Cli::parse_from([
            "fcache", "-a", "stats", "-c", "pop", "get", "k", "--override", "--default", "0",
        ]);
        assert_eq!(
            cli.command,
            Command::Get {
                key: "k".to_string(),
                override_expiry: true,
                default: Some("0".to_string()),
            }
        );
        assert!(cli.cache_dir.is_none());
        assert_eq!(cli.codec, "json");
    }

    #[test]
    fn test_cli_parse_negative_timeout_reaches_validation() {
        let cli = Cli::parse_from([
            "fcache", "-a", "x", "-c", "y", "set", "k", "v", "--timeout", "-1",
        ]);
        let Command::Set { timeout, .. } = cli.command else {
            panic!("Expected set command");
        };
        assert_eq!(timeout, Some(-1.0));
        assert!(parse_timeout_arg(-1.0).is_err());
    }

    #[test]
    fn test_cli_requires_app_and_cache() {
        assert!(Cli::try_parse_from(["fcache", "path"]).is_err());
        assert!(Cli::try_parse_from(["fcache", "--app", "x", "path"]).is_err());
    }

    #[test]
    fn test_cache_options_from_cli() {
        let cli = Cli::parse_from([
            "fcache", "--app", "stats", "--author", "acme", "--cache", "pop", "--codec", "cbor",
            "--atomic", "keys",
        ]);
        let options = CacheOptions::from_cli(&cli).unwrap();
        assert_eq!(options.appname, "stats");
        assert_eq!(options.appauthor.as_deref(), Some("acme"));
        assert_eq!(options.cachename, "pop");
        assert_eq!(options.codec, CodecKind::Cbor);
        assert_eq!(options.write_mode, WriteMode::Atomic);
    }

    #[test]
    fn test_cache_options_from_cli_invalid_codec() {
        let cli = Cli::parse_from(["fcache", "-a", "x", "-c", "y", "--codec", "xml", "path"]);
        assert!(CacheOptions::from_cli(&cli).is_err());
    }

    #[test]
    fn test_run_set_then_get() {
        let temp_dir = TempDir::new().unwrap();

        run_to_string(&parse(&temp_dir, &["set", "chicago", "9729825"]));
        let (outcome, out) = run_to_string(&parse(&temp_dir, &["get", "chicago"]));

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(out, "9729825\n");
    }

    #[test]
    fn test_run_get_expired() {
        let temp_dir = TempDir::new().unwrap();

        run_to_string(&parse(&temp_dir, &["set", "expiring", "v", "--timeout", "0"]));
        let (outcome, out) = run_to_string(&parse(&temp_dir, &["get", "expiring"]));
        assert_eq!(outcome, Outcome::Stale);
        assert!(out.is_empty());

        let (outcome, out) = run_to_string(&parse(&temp_dir, &["get", "expiring", "--override"]));
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(out, "\"v\"\n");
    }

    #[test]
    fn test_run_get_missing_uses_default() {
        let temp_dir = TempDir::new().unwrap();

        let (_, out) = run_to_string(&parse(&temp_dir, &["get", "absent", "--default", "42"]));
        assert_eq!(out, "42\n");

        let mut sink = Vec::new();
        let err = run(&parse(&temp_dir, &["get", "absent"]), &mut sink).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_run_keys_and_path() {
        let temp_dir = TempDir::new().unwrap();
        run_to_string(&parse(&temp_dir, &["set", "b", "2"]));
        run_to_string(&parse(&temp_dir, &["set", "a", "1"]));

        let (_, keys) = run_to_string(&parse(&temp_dir, &["keys"]));
        assert_eq!(keys, "a\nb\n");

        let (_, path) = run_to_string(&parse(&temp_dir, &["path"]));
        assert!(path.trim_end().ends_with(&crate::cache::cache_file_name("pop")));
    }
}
