#[macro_use]
extern crate log;

use std::env::consts::{ARCH, FAMILY, OS};
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, LineWriter};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Error};
use clap::Parser;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, ConfigBuilder, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::gallery::io::Config;
use crate::program::{Cli, Program};

mod gallery;
mod program;

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    initialize_logger(&config);
    log_system_information();

    Program::new(cli, config).run()
}

/// Opens the log file for appending, creating its directory first.
fn open_log_file(path: &Path) -> io::Result<LineWriter<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LineWriter::new(file))
}

/// Initializes the terminal logger plus a full-detail file logger for this crate.
fn initialize_logger(config: &Config) {
    let term_level = LevelFilter::from_str(&config.log_level).unwrap_or_else(|_| {
        eprintln!("Unknown log level \"{}\", using info.", config.log_level);
        LevelFilter::Info
    });

    let mut file_config = ConfigBuilder::new();
    file_config.add_filter_allow_str("gallery_downloader");

    let log_file = match open_log_file(&config.log_file) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "Failed to open log file {}: {}. Logging will only output to terminal.",
                config.log_file.display(),
                e
            );
            let _ = TermLogger::init(
                term_level,
                LogConfig::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(
            term_level,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, file_config.build(), log_file),
    ]) {
        eprintln!("Failed to initialize combined logger: {}. Falling back to terminal-only logging.", e);
        let _ = TermLogger::init(
            term_level,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

/// Logs important information about the system being used.
fn log_system_information() {
    trace!("Printing system information out into log for debug purposes...");
    trace!("ARCH:           \"{}\"", ARCH);
    trace!("FAMILY:         \"{}\"", FAMILY);
    trace!("OS:             \"{}\"", OS);
    trace!("CPUS:           \"{}\"", num_cpus::get());
}
