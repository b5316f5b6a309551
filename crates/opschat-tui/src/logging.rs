use std::path::{Path, PathBuf};

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

const LOG_BASENAME: &str = "opschat";
const ROTATE_SIZE: u64 = 1_000_000;
const ROTATE_KEEP: usize = 3;

/// Logs live next to the storage file, in a `logs` directory.
pub fn logs_dir(storage_path: &Path) -> PathBuf {
    storage_path
        .parent()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Start file logging. `RUST_LOG` overrides `level` when set. The terminal
/// belongs to the interface, so nothing is written to stderr.
pub fn init_logging(level: &str, directory: &Path) -> anyhow::Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(directory)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_SIZE),
            Naming::Numbers,
            Cleanup::KeepLogFiles(ROTATE_KEEP),
        )
        .start()?;
    Ok(handle)
}
