//! Discovery of the external `ebook-convert` executable.
//!
//! Resolution probes an ordered candidate list: copies bundled alongside the
//! application first, then well-known system install locations, using the
//! platform's filename conventions. The first existing, executable candidate
//! wins and is cached for the process lifetime; a failed resolution is not
//! cached, so `locate` can be retried after an operator installs the tool.

use crate::config::ConversionConfig;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Locator for the external converter executable.
///
/// An explicit, injectable instance rather than process-wide state, so tests
/// can construct one per fixture with a custom candidate list.
pub struct ConverterLocator {
    candidates: Vec<PathBuf>,
    resolved: OnceLock<PathBuf>,
}

impl ConverterLocator {
    /// Create a locator with the platform's default candidate list,
    /// probing for bundled copies under `app_root`.
    pub fn new(app_root: &Path) -> Self {
        Self::with_candidates(default_candidates(app_root))
    }

    /// Create a locator over an explicit candidate list, in preference order.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve the converter path, or `None` if no candidate is usable.
    ///
    /// The first successful resolution is cached; the install location does
    /// not change while the process runs.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(found) = self.resolved.get() {
            return Some(found.clone());
        }

        let found = self.candidates.iter().find(|path| is_executable(path))?;
        info!("Resolved converter executable: {}", found.display());

        // A racing caller may have resolved concurrently; either winner is
        // a valid candidate.
        Some(self.resolved.get_or_init(|| found.clone()).clone())
    }

    /// Candidate list, in probe order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }
}

/// Converter filename for the current platform.
fn converter_filename() -> &'static str {
    #[cfg(windows)]
    {
        "ebook-convert.exe"
    }
    #[cfg(not(windows))]
    {
        "ebook-convert"
    }
}

/// Default candidate list: bundled copies under `app_root` first, then
/// system install locations.
fn default_candidates(app_root: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    for dir in ConversionConfig::BUNDLED_DIR_NAMES {
        candidates.push(app_root.join(dir).join(converter_filename()));
    }

    #[cfg(windows)]
    {
        candidates.push(
            app_root
                .join("calibre-portable")
                .join("Calibre2")
                .join(converter_filename()),
        );
        for program_files in [r"C:\Program Files", r"C:\Program Files (x86)"] {
            for install_dir in ["Calibre2", "Calibre"] {
                candidates.push(
                    PathBuf::from(program_files)
                        .join(install_dir)
                        .join(converter_filename()),
                );
            }
        }
    }

    #[cfg(unix)]
    {
        candidates.push(PathBuf::from("/usr/bin").join(converter_filename()));
        candidates.push(PathBuf::from("/usr/local/bin").join(converter_filename()));
    }

    debug!("Converter candidate list: {} entries", candidates.len());
    candidates
}

/// Check if a file exists and has executable permissions.
///
/// # Platform Behavior
/// - **Linux/macOS**: Checks if any execute bit is set
/// - **Windows**: Checks for a common executable extension
pub(crate) fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    {
        if !path.is_file() {
            return false;
        }
        match path.extension() {
            Some(ext) => {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                matches!(ext_lower.as_str(), "exe" | "bat" | "cmd" | "com")
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut permissions = std::fs::metadata(path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(path, permissions).unwrap();
    }

    #[test]
    fn test_unresolved_when_no_candidate_exists() {
        let locator =
            ConverterLocator::with_candidates(vec![PathBuf::from("/nonexistent/ebook-convert")]);
        assert!(locator.locate().is_none());
        // Failed resolution is not cached; retrying is allowed.
        assert!(locator.locate().is_none());
    }

    #[test]
    fn test_default_candidates_put_bundled_first() {
        let candidates = default_candidates(Path::new("/app"));
        assert!(candidates[0].starts_with("/app"));
        assert!(candidates
            .iter()
            .any(|c| !c.starts_with("/app")));
    }

    #[cfg(unix)]
    #[test]
    fn test_bundled_preferred_over_system() {
        let dir = TempDir::new().unwrap();
        let bundled = dir.path().join("bundled-ebook-convert");
        let system = dir.path().join("system-ebook-convert");
        make_executable(&bundled);
        make_executable(&system);

        let locator = ConverterLocator::with_candidates(vec![bundled.clone(), system]);
        assert_eq!(locator.locate(), Some(bundled));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_candidate_skipped() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("ebook-convert");
        let runnable = dir.path().join("real-ebook-convert");
        std::fs::write(&plain, "not runnable").unwrap();
        make_executable(&runnable);

        let locator = ConverterLocator::with_candidates(vec![plain, runnable.clone()]);
        assert_eq!(locator.locate(), Some(runnable));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_resolution_is_cached() {
        let dir = TempDir::new().unwrap();
        let converter = dir.path().join("ebook-convert");
        make_executable(&converter);

        let locator = ConverterLocator::with_candidates(vec![converter.clone()]);
        assert_eq!(locator.locate(), Some(converter.clone()));

        // The resolved path survives even if the file disappears afterwards.
        std::fs::remove_file(&converter).unwrap();
        assert_eq!(locator.locate(), Some(converter));
    }

    #[test]
    fn test_directory_is_not_executable() {
        let dir = TempDir::new().unwrap();
        assert!(!is_executable(dir.path()));
    }
}
