//! Sandbox Builder: composes the argv either for the namespace jail
//! launcher (`bwrap`) or, in direct mode, the bare runtime invocation.

use std::path::{Path, PathBuf};

/// A fully composed invocation: the program to execute and its arguments,
/// plus an optional working directory to use when no jail is involved (the
/// jail itself performs the `chdir` internally in jailed mode).
pub struct SandboxInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Build the bubblewrap invocation for jailed mode.
///
/// `workspace` is bound read-write at the fixed interior path `/app`;
/// `packages_dir` and the standard system library directories are bound
/// read-only; `internet` controls whether the network namespace is shared
/// with the host.
pub fn build_jailed(
    workspace: &Path,
    packages_dir: &Path,
    binary: &Path,
    entry_file: &str,
    extra_args: &[String],
    internet: bool,
) -> SandboxInvocation {
    let mut args: Vec<String> = vec![
        "--ro-bind".into(), "/usr".into(), "/usr".into(),
        "--ro-bind".into(), "/lib".into(), "/lib".into(),
        "--ro-bind".into(), "/lib64".into(), "/lib64".into(),
        "--ro-bind".into(), "/bin".into(), "/bin".into(),
        "--ro-bind".into(), path_str(packages_dir), path_str(packages_dir),
        "--bind".into(), path_str(workspace), "/app".into(),
        "--chdir".into(), "/app".into(),
        "--proc".into(), "/proc".into(),
        "--dev".into(), "/dev".into(),
        "--tmpfs".into(), "/tmp".into(),
    ];

    if !internet {
        args.push("--unshare-net".into());
    }

    args.push("--".into());
    args.push(path_str(binary));
    args.push(entry_file.to_owned());
    args.extend(extra_args.iter().cloned());

    SandboxInvocation {
        program: PathBuf::from("bwrap"),
        args,
        cwd: None,
    }
}

/// Build the unconfined invocation for direct mode. Only kernel resource
/// limits apply; the `internet` flag has no effect here — callers must not
/// pretend containment exists in direct mode.
pub fn build_direct(
    workspace: &Path,
    binary: &Path,
    entry_file: &str,
    extra_args: &[String],
) -> SandboxInvocation {
    let mut args = vec![entry_file.to_owned()];
    args.extend(extra_args.iter().cloned());

    SandboxInvocation {
        program: binary.to_owned(),
        args,
        cwd: Some(workspace.to_owned()),
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jailed_invocation_unshares_net_when_internet_disabled() {
        let inv = build_jailed(
            Path::new("/tmp/job-1"),
            Path::new("/packages"),
            Path::new("/packages/python/3.11/bin/python3"),
            "main.py",
            &["--flag".to_owned()],
            false,
        );
        assert!(inv.args.iter().any(|a| a == "--unshare-net"));
        assert_eq!(inv.program, PathBuf::from("bwrap"));
        assert!(inv.cwd.is_none());
        assert_eq!(inv.args.last().unwrap(), "--flag");
    }

    #[test]
    fn jailed_invocation_keeps_net_when_internet_enabled() {
        let inv = build_jailed(
            Path::new("/tmp/job-1"),
            Path::new("/packages"),
            Path::new("/packages/python/3.11/bin/python3"),
            "main.py",
            &[],
            true,
        );
        assert!(!inv.args.iter().any(|a| a == "--unshare-net"));
    }

    #[test]
    fn direct_invocation_uses_workspace_as_cwd() {
        let inv = build_direct(
            Path::new("/tmp/job-2"),
            Path::new("/packages/node/18/bin/node"),
            "a.js",
            &[],
        );
        assert_eq!(inv.program, PathBuf::from("/packages/node/18/bin/node"));
        assert_eq!(inv.cwd, Some(PathBuf::from("/tmp/job-2")));
        assert_eq!(inv.args, vec!["a.js".to_owned()]);
    }
}
