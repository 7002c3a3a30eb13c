//! A single gallery download: resolve the title, skip if already on disk, fetch, save, unpack.
//!
//! Nothing in here is allowed to fail past [`DownloadJob::run`]; every error is folded into a
//! [`JobOutcome::Failure`] so one broken gallery never takes its siblings down.

use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::gallery::extract::{ArchiveSource, ExtractionError, extract};
use crate::gallery::io::ExtractionFailurePolicy;
use crate::gallery::io::directory::DirectoryManager;
use crate::gallery::io::movie_list::MovieList;
use crate::gallery::report::Reporter;
use crate::gallery::sender::{ArchiveFetcher, FetchError, GalleryEndpoint, gallery_id_from_url};

/// Everything that can go wrong inside one job.
#[derive(Error, Debug)]
pub(crate) enum JobError {
    #[error("no gallery id found in url {0}")]
    MalformedUrl(String),

    #[error("gallery {0} is not in the movie list")]
    NotFound(u64),

    #[error("failed to download gallery {id}: {source}")]
    Transport { id: u64, source: FetchError },

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to extract gallery {id}: {source}")]
    Extraction { id: u64, source: ExtractionError },
}

/// Terminal result of one job. Exactly one is produced per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Success { movie_title: String },
    Skipped { movie_title: String },
    Failure { error_message: String },
}

impl JobOutcome {
    /// Status tag used in the report.
    pub(crate) fn status(&self) -> &'static str {
        match self {
            JobOutcome::Success { .. } => "success",
            JobOutcome::Skipped { .. } => "skipped",
            JobOutcome::Failure { .. } => "failure",
        }
    }

    pub(crate) fn movie_title(&self) -> Option<&str> {
        match self {
            JobOutcome::Success { movie_title } | JobOutcome::Skipped { movie_title } => {
                Some(movie_title)
            }
            JobOutcome::Failure { .. } => None,
        }
    }

    pub(crate) fn error_message(&self) -> Option<&str> {
        match self {
            JobOutcome::Failure { error_message } => Some(error_message),
            _ => None,
        }
    }
}

/// Read-only settings every job of a batch shares.
#[derive(Debug, Clone)]
pub(crate) struct JobSettings {
    pub(crate) directories: DirectoryManager,
    pub(crate) extract: bool,
    pub(crate) extraction_failure: ExtractionFailurePolicy,
}

/// What a job needs from its surroundings.
#[derive(Clone, Copy)]
pub(crate) struct JobContext<'a> {
    pub(crate) movies: &'a MovieList,
    pub(crate) settings: &'a JobSettings,
    pub(crate) fetcher: &'a dyn ArchiveFetcher,
    pub(crate) reporter: &'a dyn Reporter,
}

/// One gallery to download, identified by its source url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DownloadJob {
    pub(crate) source_url: String,
    /// Id the url was built from; the url itself stays authoritative when the job runs.
    pub(crate) expected_id: u64,
}

impl DownloadJob {
    pub(crate) fn new(endpoint: &GalleryEndpoint, gallery_id: u64) -> Self {
        DownloadJob {
            source_url: endpoint.gallery_url(gallery_id),
            expected_id: gallery_id,
        }
    }

    /// Runs the job to completion. Never fails: errors become [`JobOutcome::Failure`].
    pub(crate) fn run(&self, ctx: JobContext<'_>) -> JobOutcome {
        match self.try_run(ctx) {
            Ok(outcome) => outcome,
            Err(error) => {
                ctx.reporter.job_failed(&error);
                JobOutcome::Failure {
                    error_message: error.to_string(),
                }
            }
        }
    }

    fn try_run(&self, ctx: JobContext<'_>) -> Result<JobOutcome, JobError> {
        let id = gallery_id_from_url(&self.source_url)
            .ok_or_else(|| JobError::MalformedUrl(self.source_url.clone()))?;
        if id != self.expected_id {
            warn!("Url queued for gallery {} points at gallery {}", self.expected_id, id);
        }
        let title = ctx.movies.title(id).ok_or(JobError::NotFound(id))?;

        let directories = &ctx.settings.directories;
        let archive_path = directories.archive_path(title);
        if archive_path.exists() {
            ctx.reporter.skipped(title, &archive_path);
            return Ok(JobOutcome::Skipped {
                movie_title: title.to_string(),
            });
        }

        ctx.reporter.downloading(title);
        let bytes = ctx
            .fetcher
            .fetch(&self.source_url)
            .map_err(|source| JobError::Transport { id, source })?;

        let title_dir = directories.title_directory(title);
        create_dir_all(&title_dir).map_err(|source| JobError::Io {
            path: title_dir.clone(),
            source,
        })?;
        write_archive(&archive_path, &bytes).map_err(|source| JobError::Io {
            path: archive_path.clone(),
            source,
        })?;
        ctx.reporter.saved(title, &archive_path, bytes.len());

        if ctx.settings.extract {
            match extract(ArchiveSource::Bytes(&bytes), &title_dir) {
                Ok(entries) => ctx.reporter.extracted(title, entries),
                Err(source) => {
                    let keep = ctx.settings.extraction_failure == ExtractionFailurePolicy::Keep;
                    ctx.reporter.extraction_failed(title, &source, keep);
                    if !keep {
                        return Err(JobError::Extraction { id, source });
                    }
                }
            }
        }

        Ok(JobOutcome::Success {
            movie_title: title.to_string(),
        })
    }
}

/// Writes the archive; the handle is closed on every path out of here.
fn write_archive(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()
}
