//! Runtime Registry: maps a `(language, version)` pair to a
//! concrete runtime binary by scanning a configured package root. Pure
//! filesystem reads, no side effects, and no dynamic-library plugin
//! machinery for pluggable compilers; this registry only ever needs to
//! find an executable on disk.

#[macro_use]
extern crate error_chain;
extern crate log;

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
    }

    errors {
        UnsupportedLanguage(lang: String) {
            description("language is not in the supported set")
            display("language '{}' is not supported", lang)
        }

        RuntimeNotFound(lang: String, version: String) {
            description("no matching runtime version/binary found")
            display("runtime for {} version {} not found", lang, version)
        }
    }
}

/// Per-language configuration: where under the package root its versions
/// live, and which basenames under each version's `bin/` directory are
/// acceptable runtime binaries, tried in order.
#[derive(Clone, Debug)]
pub struct LanguageConfig {
    /// Subdirectory of the package root holding this language's versions,
    /// e.g. `"python"` for `<package_root>/python/<version>/...`.
    pub subpath: String,

    /// Candidate binary basenames within `<version_dir>/bin/`, tried in
    /// order; the first one that exists and is executable wins.
    pub candidate_binaries: Vec<String>,
}

impl LanguageConfig {
    pub fn new<S: Into<String>>(subpath: S, candidate_binaries: Vec<String>) -> Self {
        LanguageConfig { subpath: subpath.into(), candidate_binaries }
    }
}

/// Registry-wide configuration: the package root plus one `LanguageConfig`
/// per supported language.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub package_root: PathBuf,
    pub languages: HashMap<String, LanguageConfig>,
}

/// A resolved runtime: the language it was resolved for, the version
/// directory that was matched, and the binary to execute.
#[derive(Clone, Debug)]
pub struct RuntimeDescriptor {
    pub language: String,
    pub version_dir: PathBuf,
    pub binary_path: PathBuf,
}

/// Read-only view over a package tree, resolving `(language, version)` pairs
/// to installed runtime binaries.
pub struct Registry {
    config: RegistryConfig,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Registry { config }
    }

    /// Whether `language` (already expected lowercase) is in the supported
    /// set configured for this registry.
    pub fn is_supported(&self, language: &str) -> bool {
        self.config.languages.contains_key(language)
    }

    /// Enumerate every `(language, version)` pair currently installed under
    /// the package root, for the `/api/v2/runtimes` endpoint.
    pub fn list_available(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (language, lang_config) in &self.config.languages {
            let base = self.config.package_root.join(&lang_config.subpath);
            let Ok(entries) = fs::read_dir(&base) else { continue };
            let mut versions: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            versions.sort();
            for version in versions {
                out.push((language.clone(), version));
            }
        }
        out
    }

    /// Resolve `(language, version)` to a `RuntimeDescriptor`: exact version
    /// directory match first, then longest-prefix fallback among immediate
    /// subdirectories of the language's base directory, ties broken by
    /// taking the lexicographically last match.
    pub fn resolve(&self, language: &str, version: &str) -> Result<RuntimeDescriptor> {
        let language = language.to_lowercase();
        let lang_config = self.config.languages.get(&language).ok_or_else(|| {
            warn!("resolve: unsupported language '{}'", language);
            Error::from(ErrorKind::UnsupportedLanguage(language.clone()))
        })?;

        let base = self.config.package_root.join(&lang_config.subpath);
        let version_dir = find_version_dir(&base, version).ok_or_else(|| {
            warn!("resolve: no version directory for {} {}", language, version);
            Error::from(ErrorKind::RuntimeNotFound(language.clone(), version.to_owned()))
        })?;

        let bin_dir = version_dir.join("bin");
        let binary_path = lang_config.candidate_binaries.iter()
            .map(|name| bin_dir.join(name))
            .find(|path| is_executable_file(path))
            .ok_or_else(|| {
                warn!("resolve: no executable candidate binary under {}", bin_dir.display());
                Error::from(ErrorKind::RuntimeNotFound(language.clone(), version.to_owned()))
            })?;

        debug!("resolve: {} {} -> {}", language, version, binary_path.display());
        Ok(RuntimeDescriptor { language, version_dir, binary_path })
    }
}

/// Find the version directory for `requested_version` under `base`: exact
/// match first, then the lexicographically last subdirectory whose name
/// begins with `requested_version` as a literal prefix.
fn find_version_dir(base: &Path, requested_version: &str) -> Option<PathBuf> {
    let exact = base.join(requested_version);
    if exact.is_dir() {
        return Some(exact);
    }

    let entries = fs::read_dir(base).ok()?;
    let mut candidates: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(requested_version))
        .collect();
    candidates.sort();

    candidates.pop().map(|name| base.join(name))
}

/// True iff `path` names a regular file that is executable by the current
/// user.
fn is_executable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};

    fn make_executable(path: &Path) {
        File::create(path).unwrap();
        let mut perms = stdfs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        stdfs::set_permissions(path, perms).unwrap();
    }

    fn registry_with_python(root: &Path) -> Registry {
        let mut languages = HashMap::new();
        languages.insert(
            "python".to_owned(),
            LanguageConfig::new("python", vec!["python3".to_owned(), "python".to_owned()]),
        );
        Registry::new(RegistryConfig { package_root: root.to_owned(), languages })
    }

    #[test]
    fn resolves_exact_version() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("python/3.10.9/bin");
        stdfs::create_dir_all(&bin_dir).unwrap();
        make_executable(&bin_dir.join("python3"));

        let registry = registry_with_python(dir.path());
        let resolved = registry.resolve("python", "3.10.9").unwrap();
        assert_eq!(resolved.binary_path, bin_dir.join("python3"));
    }

    #[test]
    fn resolves_prefix_to_latest_lexicographic_match() {
        let dir = tempfile::tempdir().unwrap();
        for v in ["3.10.1", "3.10.9", "3.10.10"] {
            let bin_dir = dir.path().join(format!("python/{v}/bin"));
            stdfs::create_dir_all(&bin_dir).unwrap();
            make_executable(&bin_dir.join("python3"));
        }

        let registry = registry_with_python(dir.path());
        let resolved = registry.resolve("python", "3.10").unwrap();
        // Lexicographic sort on strings puts "3.10.9" after "3.10.10" and
        // "3.10.1": an exact match wins, otherwise the lexicographically
        // last prefix match wins.
        assert!(resolved.version_dir.ends_with("3.10.9"));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_python(dir.path());
        let err = registry.resolve("ruby", "3.2").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedLanguage(_)));
    }

    #[test]
    fn missing_version_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("python")).unwrap();
        let registry = registry_with_python(dir.path());
        let err = registry.resolve("python", "2.7").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RuntimeNotFound(_, _)));
    }

    #[test]
    fn version_dir_without_executable_binary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("python/3.10/bin")).unwrap();
        let registry = registry_with_python(dir.path());
        let err = registry.resolve("python", "3.10").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RuntimeNotFound(_, _)));
    }

    #[test]
    fn list_available_enumerates_installed_versions() {
        let dir = tempfile::tempdir().unwrap();
        for v in ["3.10.9", "3.11.4"] {
            stdfs::create_dir_all(dir.path().join(format!("python/{v}/bin"))).unwrap();
        }
        let registry = registry_with_python(dir.path());
        let mut available = registry.list_available();
        available.sort();
        assert_eq!(
            available,
            vec![("python".to_owned(), "3.10.9".to_owned()), ("python".to_owned(), "3.11.4".to_owned())]
        );
    }
}
