//! Zip extraction shared by the per-gallery download job and the directory sweep.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use log::{trace, warn};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

/// Errors raised while unpacking an archive.
#[derive(Error, Debug)]
pub(crate) enum ExtractionError {
    #[error("failed to open archive {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("unreadable archive: {0}")]
    Archive(#[from] ZipError),

    #[error("failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to unpack entry {entry}: {source}")]
    Entry { entry: String, source: io::Error },
}

/// Where the archive to unpack comes from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ArchiveSource<'a> {
    /// Archive already held in memory, e.g. freshly downloaded.
    Bytes(&'a [u8]),
    /// Archive sitting on disk.
    File(&'a Path),
}

/// Unpacks every entry of `source` into `dest_dir`, creating it if needed.
///
/// Entries whose names would escape `dest_dir` are skipped with a warning.
/// Returns the number of files written.
pub(crate) fn extract(source: ArchiveSource<'_>, dest_dir: &Path) -> Result<usize, ExtractionError> {
    match source {
        ArchiveSource::Bytes(bytes) => extract_from(Cursor::new(bytes), dest_dir),
        ArchiveSource::File(path) => {
            let file = File::open(path).map_err(|source| ExtractionError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            extract_from(BufReader::new(file), dest_dir)
        }
    }
}

fn extract_from<R: Read + Seek>(reader: R, dest_dir: &Path) -> Result<usize, ExtractionError> {
    let mut archive = ZipArchive::new(reader)?;
    create_dir(dest_dir)?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let target = match entry.enclosed_name() {
            Some(name) => dest_dir.join(name),
            None => {
                warn!("Skipping archive entry with unsafe path: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mut out = File::create(&target).map_err(|source| ExtractionError::Create {
            path: target.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| ExtractionError::Entry {
            entry: entry.name().to_string(),
            source,
        })?;

        trace!("Unpacked {}", target.display());
        written += 1;
    }

    Ok(written)
}

fn create_dir(path: &Path) -> Result<(), ExtractionError> {
    fs::create_dir_all(path).map_err(|source| ExtractionError::Create {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    /// Builds an in-memory zip holding the given `(name, contents)` entries.
    pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .expect("start entry");
            writer.write_all(contents).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn test_extract_bytes_into_directory() {
        let dir = tempdir().expect("tempdir");
        let dest = dir.path().join("Heat");
        let bytes = zip_bytes(&[("frame_001.jpg", b"one"), ("stills/frame_002.jpg", b"two")]);

        let written = extract(ArchiveSource::Bytes(&bytes), &dest).expect("extracts");

        assert_eq!(written, 2);
        assert_eq!(fs::read(dest.join("frame_001.jpg")).expect("read"), b"one");
        assert_eq!(fs::read(dest.join("stills/frame_002.jpg")).expect("read"), b"two");
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempdir().expect("tempdir");
        let archive = dir.path().join("set.zip");
        fs::write(&archive, zip_bytes(&[("a.txt", b"alpha")])).expect("write zip");

        let written = extract(ArchiveSource::File(&archive), dir.path()).expect("extracts");

        assert_eq!(written, 1);
        assert_eq!(fs::read(dir.path().join("a.txt")).expect("read"), b"alpha");
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let result = extract(ArchiveSource::Bytes(b"<html>not a zip</html>"), dir.path());
        assert!(matches!(result, Err(ExtractionError::Archive(_))));
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nope.zip");
        let result = extract(ArchiveSource::File(&missing), dir.path());
        assert!(matches!(result, Err(ExtractionError::Open { .. })));
    }

    #[test]
    fn test_escaping_entries_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let dest = dir.path().join("inner");
        let bytes = zip_bytes(&[("../evil.txt", b"x"), ("ok.txt", b"y")]);

        let written = extract(ArchiveSource::Bytes(&bytes), &dest).expect("extracts");

        assert_eq!(written, 1);
        assert!(!dir.path().join("evil.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }
}
