use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, trace};
use rayon::ThreadPoolBuilder;
use thiserror::Error;

use crate::gallery::io::movie_list::MovieList;
use crate::gallery::job::{DownloadJob, JobContext, JobOutcome, JobSettings};
use crate::gallery::report::{BatchReport, Reporter};
use crate::gallery::sender::{ArchiveFetcher, GalleryEndpoint};

pub(crate) mod extract;
pub(crate) mod io;
pub(crate) mod job;
pub(crate) mod report;
pub(crate) mod sender;

/// Failures that break the one-outcome-per-job guarantee and therefore abort the batch.
#[derive(Error, Debug)]
pub(crate) enum BatchError {
    #[error("failed to build the download worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("a download worker panicked")]
    WorkerPanicked,

    #[error("collected {collected} outcomes for {expected} jobs")]
    LostOutcomes { expected: usize, collected: usize },
}

/// Batch-wide settings.
#[derive(Debug, Clone)]
pub(crate) struct BatchConfig {
    pub(crate) endpoint: GalleryEndpoint,
    pub(crate) workers: usize,
    pub(crate) job: JobSettings,
}

/// Downloads every gallery of a movie list across a fixed pool of workers.
pub(crate) struct BatchDownloader<'a> {
    movies: &'a MovieList,
    config: &'a BatchConfig,
    fetcher: &'a dyn ArchiveFetcher,
    reporter: &'a dyn Reporter,
}

impl<'a> BatchDownloader<'a> {
    pub(crate) fn new(
        movies: &'a MovieList,
        config: &'a BatchConfig,
        fetcher: &'a dyn ArchiveFetcher,
        reporter: &'a dyn Reporter,
    ) -> Self {
        BatchDownloader {
            movies,
            config,
            fetcher,
            reporter,
        }
    }

    /// One job per movie, in movie list order.
    pub(crate) fn jobs(&self) -> Vec<DownloadJob> {
        self.movies
            .ids()
            .map(|id| DownloadJob::new(&self.config.endpoint, id))
            .collect()
    }

    /// Runs one job per movie and returns one outcome per job, in completion order.
    pub(crate) fn run(&self) -> Result<BatchReport, BatchError> {
        self.run_jobs(self.jobs())
    }

    /// Runs the given jobs against the movie list.
    ///
    /// Jobs go through a bounded queue fed from the calling thread and drained by the workers;
    /// outcomes come back over a second channel. The pool is torn down before this returns.
    pub(crate) fn run_jobs(&self, jobs: Vec<DownloadJob>) -> Result<BatchReport, BatchError> {
        let expected = jobs.len();
        let workers = self.config.workers.clamp(1, expected.max(1));
        self.reporter.batch_started(expected, workers);
        trace!("Output root: {}", self.config.job.directories.root_dir().display());

        if jobs.is_empty() {
            let report = BatchReport::default();
            self.reporter.batch_finished(&report);
            return Ok(report);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("download-worker-{}", i))
            .build()?;

        let (job_tx, job_rx) = flume::bounded::<DownloadJob>(workers);
        let (outcome_tx, outcome_rx) = flume::unbounded::<JobOutcome>();
        let ctx = JobContext {
            movies: self.movies,
            settings: &self.config.job,
            fetcher: self.fetcher,
            reporter: self.reporter,
        };

        let drained = catch_unwind(AssertUnwindSafe(|| {
            pool.in_place_scope(|s| {
                for worker in 0..workers {
                    let job_rx = job_rx.clone();
                    let outcome_tx = outcome_tx.clone();
                    s.spawn(move |_| {
                        for job in job_rx.iter() {
                            let outcome = job.run(ctx);
                            ctx.reporter.job_finished(&outcome);
                            if outcome_tx.send(outcome).is_err() {
                                break;
                            }
                        }
                        trace!("Worker {} found the queue empty", worker);
                    });
                }
                // workers hold the only receivers, so a dead pool disconnects the queue
                drop(job_rx);

                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
                drop(job_tx);
            });
        }));
        drop(outcome_tx);
        drop(pool);

        if drained.is_err() {
            return Err(BatchError::WorkerPanicked);
        }

        let outcomes: Vec<JobOutcome> = outcome_rx.try_iter().collect();
        if outcomes.len() != expected {
            return Err(BatchError::LostOutcomes {
                expected,
                collected: outcomes.len(),
            });
        }
        debug!("Collected {} outcomes", outcomes.len());

        let report = BatchReport::new(outcomes);
        self.reporter.batch_finished(&report);
        Ok(report)
    }
}
