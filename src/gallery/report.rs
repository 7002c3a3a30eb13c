use std::fmt;
use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, trace, warn};

use crate::gallery::extract::ExtractionError;
use crate::gallery::job::{JobError, JobOutcome};

/// Run-scoped sink for everything a batch wants to tell the user while it works.
///
/// Handed explicitly to the orchestrator and to every job; shared by all workers.
pub(crate) trait Reporter: Sync {
    fn batch_started(&self, jobs: usize, workers: usize);
    fn skipped(&self, title: &str, archive: &Path);
    fn downloading(&self, title: &str);
    fn saved(&self, title: &str, archive: &Path, bytes: usize);
    fn extracted(&self, title: &str, entries: usize);
    /// Extraction failed; `kept` tells whether the job still counts as a success.
    fn extraction_failed(&self, title: &str, error: &ExtractionError, kept: bool);
    fn job_failed(&self, error: &JobError);
    fn job_finished(&self, outcome: &JobOutcome);
    fn batch_finished(&self, report: &BatchReport);
}

/// Reporter writing to the log and driving a progress bar on stderr.
pub(crate) struct ConsoleReporter {
    progress_bar: ProgressBar,
}

impl ConsoleReporter {
    pub(crate) fn new() -> Self {
        ConsoleReporter {
            progress_bar: ProgressBar::hidden(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn batch_started(&self, jobs: usize, workers: usize) {
        info!("There are {} CPUs on this machine", num_cpus::get());
        info!("Downloading {} galleries with {} workers", jobs, workers);

        let progress_style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        self.progress_bar.set_length(jobs as u64);
        self.progress_bar.set_style(progress_style);
        self.progress_bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        self.progress_bar.enable_steady_tick(Duration::from_millis(200));
    }

    fn skipped(&self, title: &str, archive: &Path) {
        info!("`{}` has already been downloaded. Skipping.", title);
        trace!("Found existing archive {}", archive.display());
    }

    fn downloading(&self, title: &str) {
        info!("Attempting to download zip file for {}", style(format!("`{title}`")).color256(39).italic());
        self.progress_bar.set_message(title.to_string());
    }

    fn saved(&self, title: &str, archive: &Path, bytes: usize) {
        info!("Downloaded `{}`", title);
        debug!("Wrote {} bytes to {}", bytes, archive.display());
    }

    fn extracted(&self, title: &str, entries: usize) {
        info!("Extracted `{}` ({} files)", title, entries);
    }

    fn extraction_failed(&self, title: &str, error: &ExtractionError, kept: bool) {
        if kept {
            warn!("Could not extract `{}`, keeping the archive: {}", title, error);
        } else {
            error!("Could not extract `{}`: {}", title, error);
        }
    }

    fn job_failed(&self, error: &JobError) {
        error!("{}", error);
    }

    fn job_finished(&self, _outcome: &JobOutcome) {
        self.progress_bar.inc(1);
    }

    fn batch_finished(&self, report: &BatchReport) {
        let tally = report.tally();
        self.progress_bar.finish_and_clear();
        info!(
            "Finished: {} downloaded, {} skipped, {} failed",
            tally.success, tally.skipped, tally.failure
        );
    }
}

/// Per-status counts over a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) success: usize,
    pub(crate) skipped: usize,
    pub(crate) failure: usize,
}

/// Every outcome of a batch, in the order the workers delivered them.
#[derive(Debug, Clone, Default)]
pub(crate) struct BatchReport {
    outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub(crate) fn new(outcomes: Vec<JobOutcome>) -> Self {
        BatchReport { outcomes }
    }

    pub(crate) fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub(crate) fn tally(&self) -> Tally {
        self.outcomes.iter().fold(Tally::default(), |mut tally, outcome| {
            match outcome {
                JobOutcome::Success { .. } => tally.success += 1,
                JobOutcome::Skipped { .. } => tally.skipped += 1,
                JobOutcome::Failure { .. } => tally.failure += 1,
            }
            tally
        })
    }
}

/// Renders the status report printed at the end of a run.
impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Status Report ===")?;
        for outcome in self.outcomes() {
            writeln!(
                f,
                "Movie: {}, Status: {}",
                outcome.movie_title().unwrap_or("N/A"),
                outcome.status()
            )?;
            if let Some(message) = outcome.error_message() {
                writeln!(f, "  Error Message: {message}")?;
            }
            writeln!(f, "=====================")?;
        }
        Ok(())
    }
}
