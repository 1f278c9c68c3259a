//! Application wide configuration. A single immutable `AppConfig` loaded
//! from YAML via `serde_yaml`, returned by value and threaded through
//! axum's `State` extractor instead of published into a
//! `static mut SINGLETON`.

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::{Error, ErrorKind, Result};

fn default_api_title() -> String { "Code Execution Engine".to_owned() }
fn default_api_version() -> String { "2.0.0".to_owned() }
fn default_host() -> String { "0.0.0.0".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_max_time_limit() -> f64 { 300.0 }
fn default_default_time_limit() -> f64 { 30.0 }
fn default_max_memory_limit() -> u64 { 2048 }
fn default_default_memory_limit() -> u64 { 128 }
fn default_max_file_size() -> usize { 1024 * 1024 }
fn default_max_total_files_size() -> usize { 5 * 1024 * 1024 }
fn default_max_files_count() -> usize { 10 }
fn default_max_output_size() -> usize { 256 * 1024 }
fn default_max_stderr_size() -> usize { 256 * 1024 }
fn default_packages_dir() -> PathBuf { PathBuf::from("/packages") }
fn default_use_bubblewrap() -> bool { true }
fn default_log_level() -> String { "info".to_owned() }

/// Recognized configuration options, each with its own default so a
/// partial YAML document still deserializes completely.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_title")]
    pub api_title: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_max_time_limit")]
    pub max_time_limit: f64,
    #[serde(default = "default_default_time_limit")]
    pub default_time_limit: f64,
    #[serde(default = "default_max_memory_limit")]
    pub max_memory_limit: u64,
    #[serde(default = "default_default_memory_limit")]
    pub default_memory_limit: u64,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_max_total_files_size")]
    pub max_total_files_size: usize,
    #[serde(default = "default_max_files_count")]
    pub max_files_count: usize,

    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,
    #[serde(default = "default_max_stderr_size")]
    pub max_stderr_size: usize,

    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    #[serde(default = "default_use_bubblewrap")]
    pub use_bubblewrap: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("empty mapping deserializes to all defaults")
    }
}

impl AppConfig {
    /// Load configuration from a YAML file. Missing files are not treated
    /// as "use all defaults" — an explicitly named config file that cannot
    /// be read is a startup error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let path = path.as_ref();
        info!("loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(Error::from)?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|_| Error::from(ErrorKind::InvalidConfigFile))?;
        Ok(config)
    }

    /// Override recognized fields from `EXECD_*` environment variables,
    /// Unparseable values are ignored with a warning rather than failing
    /// startup.
    pub fn apply_env_overrides(&mut self) {
        apply_str(&mut self.host, "EXECD_HOST");
        apply_parsed(&mut self.port, "EXECD_PORT");
        apply_parsed(&mut self.debug, "EXECD_DEBUG");
        apply_parsed(&mut self.max_time_limit, "EXECD_MAX_TIME_LIMIT");
        apply_parsed(&mut self.default_time_limit, "EXECD_DEFAULT_TIME_LIMIT");
        apply_parsed(&mut self.max_memory_limit, "EXECD_MAX_MEMORY_LIMIT");
        apply_parsed(&mut self.default_memory_limit, "EXECD_DEFAULT_MEMORY_LIMIT");
        apply_parsed(&mut self.max_file_size, "EXECD_MAX_FILE_SIZE");
        apply_parsed(&mut self.max_total_files_size, "EXECD_MAX_TOTAL_FILES_SIZE");
        apply_parsed(&mut self.max_files_count, "EXECD_MAX_FILES_COUNT");
        apply_parsed(&mut self.max_output_size, "EXECD_MAX_OUTPUT_SIZE");
        apply_parsed(&mut self.max_stderr_size, "EXECD_MAX_STDERR_SIZE");
        apply_path(&mut self.packages_dir, "EXECD_PACKAGES_DIR");
        apply_parsed(&mut self.use_bubblewrap, "EXECD_USE_BUBBLEWRAP");
        apply_str(&mut self.log_level, "EXECD_LOG_LEVEL");
    }

    /// The boundary validation limits derived from this configuration, for
    /// `ExecRequest::validate`.
    pub fn request_limits(&self) -> executor::model::RequestLimits {
        executor::model::RequestLimits {
            max_time_limit: self.max_time_limit,
            max_memory_limit: self.max_memory_limit,
            max_file_size: self.max_file_size,
            max_total_files_size: self.max_total_files_size,
            max_files_count: self.max_files_count,
        }
    }
}

fn apply_str(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = value;
    }
}

fn apply_path(field: &mut PathBuf, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = PathBuf::from(value);
    }
}

fn apply_parsed<T: std::str::FromStr>(field: &mut T, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("ignoring unparseable {} value: {}", var, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_settings() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_memory_limit, 2048);
        assert_eq!(config.packages_dir, PathBuf::from("/packages"));
        assert!(config.use_bubblewrap);
    }

    #[test]
    fn deserializes_partial_yaml_with_defaults() {
        let yaml = "port: 9000\npackages_dir: /opt/packages\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.packages_dir, PathBuf::from("/opt/packages"));
        assert_eq!(config.host, "0.0.0.0");
    }
}
