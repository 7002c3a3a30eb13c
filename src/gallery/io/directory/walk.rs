use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use walkdir::WalkDir;

use super::is_archive;
use crate::gallery::extract::{ArchiveSource, extract};

/// Tally of one sweep over a directory tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepSummary {
    /// Archives discovered under the root.
    pub(crate) found: usize,
    /// Archives unpacked and removed.
    pub(crate) extracted: usize,
    /// Archives left in place because extraction or removal failed.
    pub(crate) failed: usize,
}

/// Collects every archive file under `root`, recursively.
///
/// The list is gathered up front so archives unpacked during the sweep are not revisited.
pub(crate) fn find_archives(root: &Path) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_archive(entry.path()) {
                    archives.push(entry.into_path());
                }
            }
            Err(err) => warn!("Error accessing path under {}: {}", root.display(), err),
        }
    }
    archives
}

/// Extracts every archive under `root` into its own directory and deletes it afterwards.
///
/// An archive is only deleted when its extraction succeeded. A failure on one archive is logged
/// and the sweep carries on with the next.
pub(crate) fn extract_and_delete(root: &Path, progress: &ProgressBar) -> SweepSummary {
    let archives = find_archives(root);
    let mut summary = SweepSummary {
        found: archives.len(),
        ..SweepSummary::default()
    };
    info!("Found {} archives under {}", archives.len(), root.display());

    progress.set_length(archives.len() as u64);
    for archive in &archives {
        let dest = archive.parent().unwrap_or(root);
        progress.set_message(format!("{}", archive.display()));

        match extract(ArchiveSource::File(archive), dest) {
            Ok(entries) => {
                debug!("Extracted {} entries from {}", entries, archive.display());
                match fs::remove_file(archive) {
                    Ok(()) => summary.extracted += 1,
                    Err(err) => {
                        error!("Extracted {} but could not delete it: {}", archive.display(), err);
                        summary.failed += 1;
                    }
                }
            }
            Err(err) => {
                error!("Extraction failed for {}: {}", archive.display(), err);
                summary.failed += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!(
        "Sweep complete: {} extracted, {} failed",
        summary.extracted, summary.failed
    ));
    summary
}

/// Progress bar styled for the sweep, drawn on stderr.
pub(crate) fn sweep_progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let progress = ProgressBar::new(0);
    progress.set_style(style);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::extract::tests::zip_bytes;
    use tempfile::tempdir;

    #[test]
    fn test_sweep_extracts_and_deletes_nested_archives() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("Heat");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("Heat.zip"), zip_bytes(&[("still.jpg", b"heat")])).expect("write");
        fs::write(dir.path().join("Top.ZIP"), zip_bytes(&[("top.jpg", b"top")])).expect("write");

        let summary = extract_and_delete(dir.path(), &ProgressBar::hidden());

        assert_eq!(summary, SweepSummary { found: 2, extracted: 2, failed: 0 });
        assert_eq!(fs::read(nested.join("still.jpg")).expect("read"), b"heat");
        assert_eq!(fs::read(dir.path().join("top.jpg")).expect("read"), b"top");
        assert!(!nested.join("Heat.zip").exists());
        assert!(!dir.path().join("Top.ZIP").exists());
    }

    #[test]
    fn test_sweep_keeps_archives_that_fail_to_extract() {
        let dir = tempdir().expect("tempdir");
        let broken = dir.path().join("broken.zip");
        fs::write(&broken, b"definitely not a zip").expect("write");
        let good = dir.path().join("sub").join("good.zip");
        fs::create_dir_all(good.parent().expect("parent")).expect("mkdir");
        fs::write(&good, zip_bytes(&[("frame.png", b"png")])).expect("write");

        let summary = extract_and_delete(dir.path(), &ProgressBar::hidden());

        assert_eq!(summary, SweepSummary { found: 2, extracted: 1, failed: 1 });
        assert!(broken.exists());
        assert!(!good.exists());
        assert!(dir.path().join("sub/frame.png").exists());
    }

    #[test]
    fn test_non_archives_are_ignored() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.txt"), b"hello").expect("write");

        assert!(find_archives(dir.path()).is_empty());
        let summary = extract_and_delete(dir.path(), &ProgressBar::hidden());
        assert_eq!(summary, SweepSummary::default());
        assert!(dir.path().join("notes.txt").exists());
    }
}
