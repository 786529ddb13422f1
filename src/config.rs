//! Build configuration.

use std::path::{Path, PathBuf};

use crate::assets::DEFAULT_USER_AGENT;
use crate::export::DEFAULT_COMPRESSION_LEVEL;

/// Where a build keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Working tree at `dir/<build-id>/`, archive at
    /// `dir/<file_name>` (or `dir/<build-id>.epub`).
    Filesystem {
        dir: PathBuf,
        file_name: Option<String>,
    },
    /// Everything stays in memory; the archive is returned as bytes.
    Memory,
}

/// Configuration for a single book build.
///
/// # Example
///
/// ```
/// use folio::{BuildConfig, OutputMode};
///
/// let config = BuildConfig::for_path("out/book.epub").with_compression_level(9);
/// assert_eq!(
///     config.output,
///     OutputMode::Filesystem {
///         dir: "out".into(),
///         file_name: Some("book.epub".to_string()),
///     }
/// );
/// ```
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub output: OutputMode,
    /// Zip the tree when done. Ignored in memory mode, which always archives.
    pub archive: bool,
    /// Deflate level for every entry but `mimetype` (0-9, default 6).
    pub compression_level: Option<i64>,
    /// Sent with every remote fetch.
    pub user_agent: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl BuildConfig {
    /// Build entirely in memory.
    pub fn memory() -> Self {
        Self {
            output: OutputMode::Memory,
            archive: true,
            compression_level: Some(DEFAULT_COMPRESSION_LEVEL),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Build under `dir`, naming the archive after the build id.
    pub fn filesystem(dir: impl Into<PathBuf>) -> Self {
        Self {
            output: OutputMode::Filesystem {
                dir: dir.into(),
                file_name: None,
            },
            ..Self::memory()
        }
    }

    /// A path ending in `.epub` names the archive; anything else is a directory.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let is_epub = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
        match (is_epub, path.file_name()) {
            (true, Some(name)) => {
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let dir = if dir.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    dir
                };
                Self {
                    output: OutputMode::Filesystem {
                        dir,
                        file_name: Some(name.to_string_lossy().into_owned()),
                    },
                    ..Self::memory()
                }
            }
            _ => Self::filesystem(path),
        }
    }

    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level.clamp(0, 9));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_path_directory() {
        let config = BuildConfig::for_path("/tmp/books");
        assert_eq!(
            config.output,
            OutputMode::Filesystem {
                dir: PathBuf::from("/tmp/books"),
                file_name: None,
            }
        );
        assert!(config.archive);
    }

    #[test]
    fn test_for_path_bare_file_name() {
        let config = BuildConfig::for_path("book.EPUB");
        assert_eq!(
            config.output,
            OutputMode::Filesystem {
                dir: PathBuf::from("."),
                file_name: Some("book.EPUB".to_string()),
            }
        );
    }

    #[test]
    fn test_compression_level_is_clamped() {
        assert_eq!(
            BuildConfig::memory().with_compression_level(42).compression_level,
            Some(9)
        );
    }
}
