//! Workspace Manager: scoped acquisition of a per-job scratch
//! directory under the system temporary root, populated with request files.
//! Teardown is guaranteed by `tempfile::TempDir`'s `Drop` implementation —
//! an ownership-based cleanup pattern, so callers get recursive removal
//! for ("use whatever the target language provides for guaranteed cleanup").

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::RequestFile;
use crate::{Error, ErrorKind};

/// A scoped, uniquely-named per-job directory. Removed recursively when
/// dropped.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// Acquire a fresh workspace directory under the system temp root.
    pub fn create() -> crate::Result<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix("execd-job-")
            .tempdir()
            .map_err(|e| Error::from(ErrorKind::Io(e)))?;
        Ok(Workspace { dir })
    }

    pub fn root_path(&self) -> &Path {
        self.dir.path()
    }

    /// Write every request file into the workspace, creating intermediate
    /// directories as needed. File names have already been validated at the
    /// HTTP boundary (no leading `/`, no `..` segments); this is pure I/O.
    pub fn populate(&self, files: &[RequestFile]) -> crate::Result<()> {
        for file in files {
            let dest = self.root_path().join(&file.name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::from(ErrorKind::Io(e)))?;
            }
            fs::write(&dest, &file.content).map_err(|e| Error::from(ErrorKind::Io(e)))?;
        }
        Ok(())
    }

    /// Path the given entry file resolves to inside this workspace, for
    /// tests that want to inspect written content directly.
    #[cfg(test)]
    fn file_path(&self, name: &str) -> PathBuf {
        self.root_path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_writes_nested_files() {
        let ws = Workspace::create().unwrap();
        let files = vec![
            RequestFile { name: "main.py".to_owned(), content: "print(1)".to_owned() },
            RequestFile { name: "lib/helper.py".to_owned(), content: "x = 1".to_owned() },
        ];
        ws.populate(&files).unwrap();

        assert_eq!(fs::read_to_string(ws.file_path("main.py")).unwrap(), "print(1)");
        assert_eq!(fs::read_to_string(ws.file_path("lib/helper.py")).unwrap(), "x = 1");
    }

    #[test]
    fn workspace_directory_is_removed_on_drop() {
        let root = {
            let ws = Workspace::create().unwrap();
            ws.root_path().to_owned()
        };
        assert!(!root.exists());
    }
}
