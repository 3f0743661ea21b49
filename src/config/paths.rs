//! Platform directory lookup for default storage and log locations.

use crate::error::SyncError;
use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Result<ProjectDirs, SyncError> {
    ProjectDirs::from("", "", "statesync").ok_or_else(|| {
        SyncError::Config("Could not determine platform directories (HOME not set)".to_string())
    })
}

/// Default storage root: the platform data directory for statesync
///
/// `$XDG_DATA_HOME/statesync` on Linux.
pub fn data_root() -> Result<PathBuf, SyncError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Default directory for log files
///
/// Falls back to the data directory on platforms without a state directory.
pub fn state_root() -> Result<PathBuf, SyncError> {
    let dirs = project_dirs()?;
    Ok(dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_dir())
        .to_path_buf())
}
