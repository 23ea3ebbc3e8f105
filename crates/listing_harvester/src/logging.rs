//! Logger setup for the command-line binary.
//!
//! Lines go to the terminal and to `{log_dir}/dealapp_{YYYYmmdd_HHMMSS}.log`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Installs the global logger, adding a file logger when `log_dir` is given.
/// Returns the log file path when one was opened.
pub fn initialize(log_dir: Option<&Path>, level: LevelFilter) -> Option<PathBuf> {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut log_path = None;
    if let Some(dir) = log_dir {
        if let Some((path, file_logger)) = create_file_logger(dir, level, config) {
            loggers.push(file_logger);
            log_path = Some(path);
        }
    }

    let _ = CombinedLogger::init(loggers);
    log_path
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // CDP protocol noise.
        .add_filter_ignore_str("chromiumoxide")
        .build()
}

pub fn log_file_path(dir: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("dealapp_{stamp}.log"))
}

fn create_file_logger(
    dir: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<(PathBuf, Box<WriteLogger<File>>)> {
    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("Warning: Could not create log directory {:?}: {}", dir, err);
        return None;
    }
    let log_path = log_file_path(dir);
    match File::create(&log_path) {
        Ok(file) => Some((log_path, WriteLogger::new(level, config, file))),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
