//! Resource Limiter: the kernel-level per-process limits applied
//! in the child after `fork` but before `exec`.
//!
//! These limits are a belt-and-suspenders complement to the wall-clock
//! timeout enforced by the supervisor: the kernel enforces address space and
//! CPU time directly, the supervisor enforces the wall clock independently.

use crate::rlimits::{self, Resource};
use crate::MemorySize;

/// Resource caps to install in a child process before it execs.
#[derive(Clone, Copy, Debug)]
pub struct ResourceLimiter {
    /// Address space ceiling. Soft and hard limits are set equal.
    pub memory: MemorySize,

    /// Wall-clock time limit the job was given, used to derive the CPU time
    /// ceiling (soft = floor(seconds), hard = soft + 1).
    pub time_limit_secs: u64,

    /// Ceiling on the number of processes (and threads) the job's effective
    /// user may have concurrently. Fixed at 16.
    pub max_processes: u64,
}

impl ResourceLimiter {
    pub fn new(memory: MemorySize, time_limit_secs: u64) -> Self {
        ResourceLimiter {
            memory,
            time_limit_secs,
            max_processes: 16,
        }
    }

    /// Apply the limits to the calling process. Meant to run inside a
    /// `pre_exec` hook, strictly after `fork` and strictly before `execve`.
    ///
    /// Any failure here should abort the child before it execs; the caller
    /// observes this as a spawn failure.
    pub fn apply(&self) -> std::io::Result<()> {
        let mem_bytes = self.memory.bytes() as u64;
        rlimits::setrlimit_hard(Resource::AddressSpace, mem_bytes)?;

        let cpu_soft = self.time_limit_secs;
        let cpu_hard = cpu_soft + 1;
        rlimits::setrlimit_soft_hard(Resource::CPUTime, cpu_soft, cpu_hard)?;

        rlimits::setrlimit_hard(Resource::ProcessCount, self.max_processes)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_cpu_hard_limit_from_soft() {
        let limiter = ResourceLimiter::new(MemorySize::MegaBytes(256), 5);
        assert_eq!(5, limiter.time_limit_secs);
        assert_eq!(16, limiter.max_processes);
    }
}
