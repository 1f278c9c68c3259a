//! Capability Probe: a process-wide, lazily computed, cached determination
//! of whether the host's namespace-jail launcher (`bwrap`) is installed and
//! actually functional.
//!
//! The cache is published with `std::sync::OnceLock`, which is safe under
//! concurrent first-query races (two parallel probes racing to compute the
//! same idempotent result is fine) without a hand-rolled `static mut` +
//! manual `Once` pattern.

use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use crate::misc::expand_path;

/// The name of the namespace-jail launcher binary this crate shells out to.
const JAIL_TOOL: &str = "bwrap";

/// Result of probing the host for jail support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JailCapability {
    /// Whether `bwrap` was found on `PATH`.
    pub installed: bool,

    /// Whether a minimal `bwrap` invocation actually succeeded. Always
    /// `false` when `installed` is `false`.
    pub working: bool,
}

static CAPABILITY: OnceLock<JailCapability> = OnceLock::new();

/// Get the cached jail capability, probing the host on first call.
pub fn probe() -> JailCapability {
    *CAPABILITY.get_or_init(compute)
}

fn compute() -> JailCapability {
    let installed = expand_path(JAIL_TOOL).is_some();
    if !installed {
        return JailCapability { installed: false, working: false };
    }

    let working = probe_working();
    JailCapability { installed, working }
}

/// Run a minimal, benign `bwrap` invocation and check that it exits zero
/// within a short deadline. Uses the same poll-and-timeout idiom as the
/// process supervisor rather than a dedicated async timeout primitive, since
/// this crate has no async runtime.
fn probe_working() -> bool {
    let mut child = match Command::new(JAIL_TOOL)
        .args(["--ro-bind", "/", "/", "--", "echo", "test"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstalled_tool_is_never_working() {
        // Can't control whether the test host has bwrap, but the invariant
        // installed == false => working == false always holds.
        let cap = probe();
        if !cap.installed {
            assert!(!cap.working);
        }
    }
}
