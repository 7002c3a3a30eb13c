use std::env::current_dir;
use std::path::{Path, PathBuf};

use anyhow::{Context, Error, bail};
use clap::{Args, Parser, Subcommand};
use console::Term;
use log::{info, trace, warn};

use crate::gallery::io::directory::DirectoryManager;
use crate::gallery::io::directory::walk::{extract_and_delete, sweep_progress_bar};
use crate::gallery::io::movie_list::MovieList;
use crate::gallery::io::{Config, ExtractionFailurePolicy};
use crate::gallery::job::JobSettings;
use crate::gallery::report::ConsoleReporter;
use crate::gallery::sender::RequestSender;
use crate::gallery::{BatchConfig, BatchDownloader};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Download and extract movie galleries from film-grab.com.
#[derive(Parser, Debug)]
#[command(name = "gallery_downloader", version)]
pub(crate) struct Cli {
    /// Path to a TOML config file (defaults to ./gallery_downloader.toml when present)
    #[arg(long, short = 'c', global = true)]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Download every gallery listed in a movie list
    Download(DownloadArgs),
    /// Extract all zip files in their folders and delete each zip once extracted
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub(crate) struct DownloadArgs {
    /// Path to the movie list JSON file
    #[arg(long = "movie-list", short = 'l')]
    pub(crate) movie_list: PathBuf,

    /// Output directory for downloaded and extracted files
    #[arg(long = "output-dir", short = 'o')]
    pub(crate) output_dir: Option<PathBuf>,

    /// Extract each archive after downloading it
    #[arg(long)]
    pub(crate) extract: bool,

    /// Number of download workers (defaults to one per CPU)
    #[arg(long, short = 'w')]
    pub(crate) workers: Option<usize>,

    /// Report a gallery as downloaded even when its archive fails to extract
    #[arg(long)]
    pub(crate) keep_on_extract_failure: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Folder to search for zip files
    #[arg(long = "target-dir", visible_alias = "output-dir")]
    pub(crate) target_dir: PathBuf,
}

impl DownloadArgs {
    /// Layers the command line over the config file.
    pub(crate) fn apply(&self, config: &mut Config) {
        if let Some(output_dir) = &self.output_dir {
            config.output_directory = output_dir.clone();
        }
        if self.extract {
            config.extract = true;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.keep_on_extract_failure {
            config.extraction_failure = ExtractionFailurePolicy::Keep;
        }
    }
}

/// Builds the batch settings out of the effective config.
pub(crate) fn batch_config(config: &Config) -> BatchConfig {
    BatchConfig {
        endpoint: config.endpoint(),
        workers: config.worker_count(),
        job: JobSettings {
            directories: DirectoryManager::new(&config.output_directory),
            extract: config.extract,
            extraction_failure: config.extraction_failure,
        },
    }
}

/// Handles the flow of one invocation.
pub(crate) struct Program {
    cli: Cli,
    config: Config,
}

impl Program {
    pub(crate) fn new(cli: Cli, config: Config) -> Self {
        Program { cli, config }
    }

    pub(crate) fn run(mut self) -> Result<(), Error> {
        Term::stdout().set_title("gallery downloader");
        trace!("Starting {} {}...", NAME, VERSION);
        let working_dir = current_dir().context("Failed to get working directory")?;
        trace!("Program Working Directory: {}", working_dir.display());

        match &self.cli.command {
            Command::Download(args) => {
                args.apply(&mut self.config);
                let movie_list = args.movie_list.clone();
                self.download(&movie_list)
            }
            Command::Sweep(args) => {
                let target_dir = args.target_dir.clone();
                self.sweep(&target_dir)
            }
        }
    }

    fn download(&self, movie_list: &Path) -> Result<(), Error> {
        let movies = MovieList::load(movie_list)?;
        info!("Loaded {} galleries from {}", movies.len(), movie_list.display());
        if movies.is_empty() {
            warn!("The movie list is empty, nothing to download.");
        }

        let batch = batch_config(&self.config);
        let sender = RequestSender::new(&self.config.sender_config())
            .context("Failed to build the HTTP client")?;
        let reporter = ConsoleReporter::new();

        let report = BatchDownloader::new(&movies, &batch, &sender, &reporter).run()?;
        print!("{report}");
        Ok(())
    }

    fn sweep(&self, target_dir: &Path) -> Result<(), Error> {
        if !target_dir.is_dir() {
            bail!("{} is not a directory", target_dir.display());
        }

        let progress = sweep_progress_bar();
        let summary = extract_and_delete(target_dir, &progress);
        info!(
            "Swept {}: {} archives found, {} extracted, {} failed",
            target_dir.display(),
            summary.found,
            summary.extracted,
            summary.failed
        );
        Ok(())
    }
}
