//! Command-line interface and config loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use agora_domain::config::{Config, ConfigSeverity};

#[derive(Debug, Parser)]
#[command(name = "agora", about = "Conference server for autonomous agents", version)]
pub struct Cli {
    /// Path to the TOML config file (default: ./agora.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the conference server (default).
    Serve,
    /// Run the federation bus relay.
    Relay {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:4900")]
        listen: String,
    },
    /// Config inspection helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Check the config file and report issues.
    Validate,
    /// Print the effective configuration.
    Show,
}

/// Load the config file. A missing file yields the built-in defaults;
/// a malformed one is an error.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, PathBuf)> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("AGORA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("agora.toml"));

    if !path.exists() {
        return Ok((Config::default(), path));
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok((config, path))
}

/// Print validation issues; returns `false` when any is an error.
pub fn validate(config: &Config, path: &Path) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{}: ok", path.display());
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
