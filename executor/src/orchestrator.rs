//! Executor Orchestrator: drives a single request through registry
//! resolution, workspace materialization, mode selection, the supervised
//! run, and result assembly, classifying every failure branch. Returns a
//! classified `ExecResult` on every path instead of propagating a `Result`
//! to its caller — job-level failures are observations, not HTTP-level
//! errors.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{info, warn, error};
use uuid::Uuid;

use registry::Registry;
use sandbox::jail::{self, SandboxInvocation};
use sandbox::limiter::ResourceLimiter;
use sandbox::supervisor::{self, SupervisorRequest};
use sandbox::{capability, MemorySize};

use crate::model::{Classification, ExecRequest, ExecResult, RunOutcome};
use crate::workspace::Workspace;

/// Static configuration the orchestrator needs beyond the registry: where
/// the package tree lives (for jailed-mode bind mounts) and the output
/// byte caps. One instance is constructed per server and shared (read-only)
/// across concurrent jobs.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub packages_dir: PathBuf,
    /// When `false`, force direct mode regardless of jail capability —
    /// the configured `use_bubblewrap` option.
    pub use_bubblewrap: bool,
    pub max_output_size: usize,
    pub max_stderr_size: usize,
}

/// Drives requests against one `Registry` and one `ExecutorConfig`. Holds
/// no per-job mutable state; safe to share across concurrently handled
/// requests (each call to `execute` owns its own workspace and child).
pub struct Executor {
    registry: Registry,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(registry: Registry, config: ExecutorConfig) -> Self {
        Executor { registry, config }
    }

    /// Enumerate installed `(language, version)` pairs, for the
    /// `/api/v2/runtimes` endpoint.
    pub fn list_runtimes(&self) -> Vec<(String, String)> {
        self.registry.list_available()
    }

    /// Whether `language` is in the closed, configured set of supported
    /// languages. Request validation uses this to reject an unsupported
    /// language at the HTTP boundary (422) before a job is ever run,
    /// distinct from `RuntimeNotFound`, which means the language is
    /// supported but no matching installed version/binary was found.
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.registry.is_supported(language)
    }

    /// Execute one request to completion. Never returns `Err`: every
    /// failure branch is folded into a classified `ExecResult`.
    pub fn execute(&self, request: &ExecRequest) -> ExecResult {
        let job_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let language = request.language_lower();
        let descriptor = match self.registry.resolve(&language, &request.version) {
            Ok(d) => d,
            Err(e) => {
                error!("runtime resolution failed for job {}: {}", job_id, e);
                return runtime_not_found_result(request, job_id, &e.to_string());
            }
        };

        let workspace = match Workspace::create() {
            Ok(ws) => ws,
            Err(e) => {
                error!("workspace creation failed for job {}: {}", job_id, e);
                return workspace_error_result(request, job_id, &e.to_string());
            }
        };

        if let Err(e) = workspace.populate(&request.files) {
            error!("workspace populate failed for job {}: {}", job_id, e);
            return workspace_error_result(request, job_id, &e.to_string());
        }

        let cap = capability::probe();
        let use_jail = self.config.use_bubblewrap && cap.working;

        let invocation: SandboxInvocation = if use_jail {
            info!("executing job {}: {} {} (sandboxed)", job_id, request.language, request.version);
            jail::build_jailed(
                workspace.root_path(),
                &self.config.packages_dir,
                &descriptor.binary_path,
                request.entry_file(),
                &request.args,
                request.internet,
            )
        } else {
            warn!(
                "executing job {}: {} {} (direct mode - jail unavailable or disabled)",
                job_id, request.language, request.version
            );
            jail::build_direct(
                workspace.root_path(),
                &descriptor.binary_path,
                request.entry_file(),
                &request.args,
            )
        };

        let limiter = ResourceLimiter::new(
            MemorySize::MegaBytes(request.memory_limit as usize),
            request.time_limit.floor() as u64,
        );

        let supervisor_request = SupervisorRequest {
            invocation: &invocation,
            limiter,
            wall_clock_limit: Duration::from_secs_f64(request.time_limit),
            stdin: request.stdin.clone().into_bytes(),
            max_stdout: self.config.max_output_size,
            max_stderr: self.config.max_stderr_size,
        };

        let outcome = match supervisor::run(supervisor_request) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("sandbox spawn failed for job {}: {}", job_id, e);
                return sandbox_error_result(request, job_id, &e.to_string());
            }
        };

        let wall_time_ms = start.elapsed().as_millis() as u64;
        let classification = if outcome.timed_out { Classification::Timeout } else { Classification::Ok };

        info!("job {} completed with exit code {} in {}ms", job_id, outcome.exit_code, wall_time_ms);

        let stdout = String::from_utf8_lossy(&outcome.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&outcome.stderr).into_owned();
        let output = format!("{}{}", stdout, stderr);

        ExecResult {
            language: request.language.clone(),
            version: request.version.clone(),
            job_id,
            classification,
            run: RunOutcome {
                stdout,
                stderr,
                output,
                code: outcome.exit_code,
                signal: outcome.signal,
                message: None,
                status: None,
                cpu_time: Some(outcome.cpu_time.as_millis() as u64),
                wall_time: Some(wall_time_ms),
                memory: outcome.max_rss_bytes,
            },
        }
        // `workspace` drops here, recursively removing its directory before
        // this function returns, regardless of which branch produced the
        // result above.
    }
}

fn empty_run(code: i32, message: String) -> RunOutcome {
    RunOutcome {
        stdout: String::new(),
        stderr: String::new(),
        output: String::new(),
        code,
        signal: None,
        message: Some(message),
        status: Some("error".to_owned()),
        cpu_time: Some(0),
        wall_time: Some(0),
        memory: None,
    }
}

fn runtime_not_found_result(request: &ExecRequest, job_id: String, reason: &str) -> ExecResult {
    ExecResult {
        language: request.language.clone(),
        version: request.version.clone(),
        job_id,
        classification: Classification::RuntimeNotFound,
        run: empty_run(127, reason.to_owned()),
    }
}

fn workspace_error_result(request: &ExecRequest, job_id: String, reason: &str) -> ExecResult {
    ExecResult {
        language: request.language.clone(),
        version: request.version.clone(),
        job_id,
        classification: Classification::WorkspaceError,
        run: empty_run(1, reason.to_owned()),
    }
}

fn sandbox_error_result(request: &ExecRequest, job_id: String, reason: &str) -> ExecResult {
    ExecResult {
        language: request.language.clone(),
        version: request.version.clone(),
        job_id,
        classification: Classification::SandboxError,
        run: empty_run(1, reason.to_owned()),
    }
}

/// Build an `InternalError` result for a job that never reached (or never
/// completed) `Executor::execute` — e.g. the blocking task it ran on
/// panicked or was cancelled. Generates its own `job_id` since the
/// orchestrator never assigned one.
pub fn internal_error_result(request: &ExecRequest, reason: &str) -> ExecResult {
    ExecResult {
        language: request.language.clone(),
        version: request.version.clone(),
        job_id: Uuid::new_v4().to_string(),
        classification: Classification::InternalError,
        run: empty_run(1, reason.to_owned()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use registry::{LanguageConfig, RegistryConfig};

    use crate::model::RequestFile;

    /// Build a fake package tree with a single `stub` language whose
    /// "binary" is a tiny shell script, and a registry/config pair pointing
    /// at it with jailing force-disabled (these tests don't assume `bwrap`
    /// is installed on the host running them).
    fn stub_executor(root: &std::path::Path, script: &str) -> Executor {
        let bin_dir = root.join("stub/1.0/bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let script_path = bin_dir.join("run.sh");
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();

        let mut languages = HashMap::new();
        languages.insert(
            "stub".to_owned(),
            LanguageConfig::new("stub", vec!["run.sh".to_owned()]),
        );
        let registry = Registry::new(RegistryConfig { package_root: root.to_owned(), languages });

        let config = ExecutorConfig {
            packages_dir: root.to_owned(),
            use_bubblewrap: false,
            max_output_size: 65536,
            max_stderr_size: 65536,
        };

        Executor::new(registry, config)
    }

    fn stub_request(content: &str) -> ExecRequest {
        ExecRequest {
            language: "stub".to_owned(),
            version: "1.0".to_owned(),
            files: vec![RequestFile { name: "entry.txt".to_owned(), content: content.to_owned() }],
            stdin: String::new(),
            args: Vec::new(),
            time_limit: 2.0,
            memory_limit: 256,
            internet: true,
        }
    }

    #[test]
    fn is_language_supported_reflects_registry_config() {
        let dir = tempfile::tempdir().unwrap();
        let executor = stub_executor(dir.path(), "#!/bin/sh\necho hello\n");

        assert!(executor.is_language_supported("stub"));
        assert!(!executor.is_language_supported("nonexistent"));
    }

    #[test]
    fn runs_stub_binary_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let executor = stub_executor(dir.path(), "#!/bin/sh\necho hello\n");
        let result = executor.execute(&stub_request("entry"));

        assert_eq!(result.classification, Classification::Ok);
        assert_eq!(result.run.code, 0);
        assert_eq!(result.run.stdout, "hello\n");
    }

    #[test]
    fn unknown_language_is_classified_runtime_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let executor = stub_executor(dir.path(), "#!/bin/sh\necho hello\n");
        let mut request = stub_request("entry");
        request.language = "nonexistent".to_owned();

        let result = executor.execute(&request);
        assert_eq!(result.classification, Classification::RuntimeNotFound);
        assert_eq!(result.run.code, 127);
    }

    #[test]
    fn nonzero_exit_code_is_still_classified_ok() {
        let dir = tempfile::tempdir().unwrap();
        let executor = stub_executor(dir.path(), "#!/bin/sh\nexit 3\n");
        let result = executor.execute(&stub_request("entry"));

        assert_eq!(result.classification, Classification::Ok);
        assert_eq!(result.run.code, 3);
    }

    #[test]
    fn timeout_is_classified_timeout_with_code_124() {
        let dir = tempfile::tempdir().unwrap();
        let executor = stub_executor(dir.path(), "#!/bin/sh\nsleep 10\n");
        let mut request = stub_request("entry");
        request.time_limit = 1.0;

        let result = executor.execute(&request);
        assert_eq!(result.classification, Classification::Timeout);
        assert_eq!(result.run.code, 124);
        assert!(result.run.stderr.starts_with("TIMEOUT:"));
        assert_eq!(result.run.signal.as_deref(), Some("SIGKILL"));
    }
}
