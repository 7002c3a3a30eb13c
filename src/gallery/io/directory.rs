use std::path::{Path, PathBuf};

pub(crate) mod walk;

/// Extension given to every downloaded gallery archive.
pub(crate) const ARCHIVE_EXTENSION: &str = "zip";

/// Lays out where each gallery lives under the output root.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryManager {
    /// Base directory for all downloads
    root_dir: PathBuf,
}

impl DirectoryManager {
    pub(crate) fn new(root_dir: impl Into<PathBuf>) -> Self {
        DirectoryManager {
            root_dir: root_dir.into(),
        }
    }

    pub(crate) fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding everything that belongs to one title: `<root>/<title>/`.
    pub(crate) fn title_directory(&self, title: &str) -> PathBuf {
        self.root_dir.join(sanitize_filename(title))
    }

    /// Path of the archive for a title: `<root>/<title>/<title>.zip`.
    ///
    /// Its presence is what marks a title as already downloaded.
    pub(crate) fn archive_path(&self, title: &str) -> PathBuf {
        let name = sanitize_filename(title);
        self.root_dir
            .join(&name)
            .join(format!("{name}.{ARCHIVE_EXTENSION}"))
    }
}

/// Checks whether `path` names an archive this tool knows how to unpack.
pub(crate) fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Placeholder for titles that cannot name a directory on their own.
const EMPTY_NAME_PLACEHOLDER: &str = "_";

/// Sanitizes a filename to be safe for use in file systems
///
/// The result is always a single path component below its parent: blank names and names made
/// only of dots (`.`, `..`) become `_`.
pub(crate) fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        EMPTY_NAME_PLACEHOLDER.to_string()
    } else {
        sanitized
    }
}
