//! Command-line argument parsing: a thin `clap` derive wrapper in front of
//! the library crates.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "execd", about = "Sandboxed code execution service", version)]
pub struct Cli {
    /// Path to the YAML application configuration file.
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to a log4rs configuration file. When omitted, a default
    /// console logger is configured at the level named by `log_level` in
    /// the application configuration.
    #[arg(long)]
    pub log_config: Option<PathBuf>,

    /// Override the configured bind host.
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    pub port: Option<u16>,
}
