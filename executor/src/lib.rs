//! This crate implements the orchestration layer that sits above `sandbox`
//! and `registry`: the request/result data model, the per-job
//! Workspace Manager (§4.4), and the Executor Orchestrator (§4.6) that
//! drives a single request through resolution, workspace materialization,
//! mode selection, supervised execution, and result assembly.

#[macro_use]
extern crate error_chain;
extern crate log;

pub mod model;
pub mod orchestrator;
pub mod workspace;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(sandbox::Error, sandbox::ErrorKind);
        Registry(registry::Error, registry::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
    }

    errors {
        /// A request's `time_limit` or `memory_limit` fell outside the
        /// configured band. Validated at the HTTP boundary, not raised by
        /// the orchestrator itself, but kept here so callers share one
        /// error vocabulary.
        ResourceLimit(reason: String) {
            description("request resource limit out of configured range")
            display("resource limit rejected: {}", reason)
        }
    }
}

pub use model::{Classification, ExecRequest, ExecResult, RequestFile, RunOutcome};
pub use orchestrator::{internal_error_result, Executor, ExecutorConfig};
