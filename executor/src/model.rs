//! Request/result data model. `ExecRequest` is the immutable job
//! descriptor submitted by a client; `ExecResult` is the canonical
//! `run:`-nested response shape.

use serde::{Deserialize, Serialize};

/// A single source file within a request. The first entry in
/// `ExecRequest::files` is the entry point.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestFile {
    pub name: String,
    pub content: String,
}

fn default_stdin() -> String {
    String::new()
}

fn default_time_limit() -> f64 {
    90.0
}

fn default_memory_limit() -> u64 {
    256
}

fn default_internet() -> bool {
    true
}

/// Immutable job descriptor. Deserialized straight off the wire;
/// `validate` performs the boundary checks a request handler would run with
/// pydantic validators before the orchestrator ever sees the request.
#[derive(Clone, Debug, Deserialize)]
pub struct ExecRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<RequestFile>,

    #[serde(default = "default_stdin")]
    pub stdin: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_time_limit")]
    pub time_limit: f64,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,

    #[serde(default = "default_internet")]
    pub internet: bool,
}

/// Fixed floors for `time_limit`/`memory_limit`. The configuration
/// surface only names the ceilings (`max_time_limit`, `max_memory_limit`),
/// not the floors, so these stay as constants.
pub const MIN_TIME_LIMIT_SECS: f64 = 0.1;
pub const MIN_MEMORY_LIMIT_MB: u64 = 32;

/// Boundary validation limits, sourced from `AppConfig` in `execd`.
#[derive(Clone, Copy, Debug)]
pub struct RequestLimits {
    pub max_time_limit: f64,
    pub max_memory_limit: u64,
    pub max_file_size: usize,
    pub max_total_files_size: usize,
    pub max_files_count: usize,
}

impl ExecRequest {
    /// Validate the request against the boundary rules, including the
    /// resource-limit band check. On failure, returns a human-readable
    /// reason suitable for a 422 body.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("files must contain at least one entry".to_owned());
        }

        let mut total_size = 0usize;
        for file in &self.files {
            let trimmed = file.name.trim();
            if trimmed.is_empty() {
                return Err("file name cannot be empty".to_owned());
            }
            if file.name.starts_with('/') {
                return Err(format!("file name '{}' cannot be an absolute path", file.name));
            }
            if file.name.split('/').any(|segment| segment == "..") {
                return Err(format!("file name '{}' cannot contain '..' segments", file.name));
            }

            let size = file.content.len();
            if size > limits.max_file_size {
                return Err(format!(
                    "file '{}' content too large: {} bytes, maximum allowed {} bytes ({} KB)",
                    file.name, size, limits.max_file_size, limits.max_file_size / 1024
                ));
            }
            total_size += size;
        }

        if self.files.len() > limits.max_files_count {
            return Err(format!(
                "too many files: {}, maximum allowed {}",
                self.files.len(), limits.max_files_count
            ));
        }

        if total_size > limits.max_total_files_size {
            return Err(format!(
                "total files size too large: {} bytes, maximum allowed {} bytes ({} KB)",
                total_size, limits.max_total_files_size, limits.max_total_files_size / 1024
            ));
        }

        if self.time_limit < MIN_TIME_LIMIT_SECS || self.time_limit > limits.max_time_limit {
            return Err(format!(
                "time_limit {} out of range [{}, {}]",
                self.time_limit, MIN_TIME_LIMIT_SECS, limits.max_time_limit
            ));
        }

        if self.memory_limit < MIN_MEMORY_LIMIT_MB || self.memory_limit > limits.max_memory_limit {
            return Err(format!(
                "memory_limit {} out of range [{}, {}]",
                self.memory_limit, MIN_MEMORY_LIMIT_MB, limits.max_memory_limit
            ));
        }

        Ok(())
    }

    /// The entry file name (first file in the request). Only valid to call
    /// after `validate` confirmed `files` is non-empty.
    pub fn entry_file(&self) -> &str {
        &self.files[0].name
    }

    /// Normalized (lowercased) language identifier.
    pub fn language_lower(&self) -> String {
        self.language.to_lowercase()
    }
}

/// Outcome classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ok,
    RuntimeNotFound,
    WorkspaceError,
    SandboxError,
    Timeout,
    InternalError,
}

/// The canonical `run:`-nested execution record. `output` is the
/// concatenation of `stdout` then `stderr`, each already truncated.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub output: String,
    pub code: i32,
    pub signal: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
    pub cpu_time: Option<u64>,
    pub wall_time: Option<u64>,
    pub memory: Option<u64>,
}

/// Top-level response body for `POST /api/v2/execute`.
#[derive(Clone, Debug, Serialize)]
pub struct ExecResult {
    pub language: String,
    pub version: String,
    pub run: RunOutcome,
    pub job_id: String,
    pub classification: Classification,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RequestLimits {
        RequestLimits {
            max_time_limit: 300.0,
            max_memory_limit: 2048,
            max_file_size: 65536,
            max_total_files_size: 262144,
            max_files_count: 16,
        }
    }

    fn base_request() -> ExecRequest {
        ExecRequest {
            language: "python".to_owned(),
            version: "3.10".to_owned(),
            files: vec![RequestFile { name: "main.py".to_owned(), content: "print(1)".to_owned() }],
            stdin: String::new(),
            args: Vec::new(),
            time_limit: 2.0,
            memory_limit: 256,
            internet: true,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(base_request().validate(&limits()).is_ok());
    }

    #[test]
    fn rejects_empty_files() {
        let mut req = base_request();
        req.files.clear();
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn rejects_absolute_file_name() {
        let mut req = base_request();
        req.files[0].name = "/etc/passwd".to_owned();
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn rejects_parent_traversal_file_name() {
        let mut req = base_request();
        req.files[0].name = "../escape.py".to_owned();
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn rejects_time_limit_above_ceiling() {
        let mut req = base_request();
        req.time_limit = 1000.0;
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn rejects_memory_limit_below_floor() {
        let mut req = base_request();
        req.memory_limit = 4;
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn entry_file_is_first_file() {
        let req = base_request();
        assert_eq!(req.entry_file(), "main.py");
    }
}
