use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Expand the `PATH` environment variable before the given path and returns the one that exists.
pub fn expand_path<'a, P>(path: &'a P) -> Option<Cow<'a, Path>>
    where P: ?Sized + AsRef<Path> {
    let original = path.as_ref();
    if original.exists() {
        return Some(Cow::Borrowed(original));
    }

    if original.is_absolute() {
        return None;
    }

    let path_env = match std::env::var_os("PATH") {
        Some(p) => p.to_string_lossy().into_owned().to_owned(),
        None => return None
    };
    for dir_path in path_env.split(':') {
        let mut path = PathBuf::from(dir_path);
        path.push(original);

        if path.exists() {
            return Some(Cow::Owned(path));
        }
    }

    None
}
