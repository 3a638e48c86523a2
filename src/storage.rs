// SPDX-License-Identifier: MPL-2.0

//! Saving captured photos

use crate::app::state::CapturedImage;
use crate::constants::files;
use crate::errors::StorageError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Download filename for the current time
pub fn capture_filename_now() -> String {
    files::capture_filename(chrono::Utc::now().timestamp_millis())
}

/// Write a captured image into `dir` under a timestamped filename
///
/// The directory is created when missing. Returns the written path.
pub async fn save_capture(image: &CapturedImage, dir: &Path) -> Result<PathBuf, StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| StorageError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(capture_filename_now());
    debug!(path = %path.display(), bytes = image.bytes().len(), "Saving capture");

    tokio::fs::write(&path, image.bytes())
        .await
        .map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), "Capture saved");
    Ok(path)
}
