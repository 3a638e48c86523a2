// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the photobooth
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking a framed photo without the terminal UI

use photobooth::app::{CaptureState, Command, Notice, SessionHandle};
use photobooth::backends::camera::{CameraPlatform, DeviceKind, FacingMode};
use photobooth::constants::heuristics;
use photobooth::errors::{AppError, AppResult};
use std::path::PathBuf;
use tracing::info;

/// List all video inputs of the platform
pub async fn list_cameras(platform: &dyn CameraPlatform) -> AppResult<()> {
    if !platform.supports_media_devices() {
        return Err(photobooth::CameraError::Unsupported.into());
    }
    if !platform.supports_device_enumeration() {
        println!("This camera platform cannot list its devices.");
        return Ok(());
    }

    let cameras: Vec<_> = platform
        .enumerate_devices()
        .await?
        .into_iter()
        .filter(|device| device.kind == DeviceKind::VideoInput)
        .collect();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let label = if camera.label.is_empty() {
            "(unnamed)"
        } else {
            camera.label.as_str()
        };
        println!("  [{}] {}", index, label);
        println!("      Id: {}", camera.device_id);
        if heuristics::label_suggests_environment(&camera.label) {
            println!("      Likely rear-facing");
        }
    }
    println!();

    Ok(())
}

/// Take one framed photo and save it
///
/// Runs the same session the terminal UI uses: intake, capture, download.
pub async fn take_photo(
    handle: &SessionHandle,
    name: String,
    branch: String,
    rear: bool,
) -> AppResult<PathBuf> {
    let mounted = handle.mounted().await?;
    if let Some(err) = mounted.snapshot.error {
        return Err(AppError::Camera(err));
    }

    let update = handle
        .execute(Command::SubmitIdentity { name, branch })
        .await?;
    if let Some(Notice::IdentityRejected(reason)) = update.notice {
        return Err(AppError::Other(reason));
    }

    if rear && update.snapshot.facing_mode != FacingMode::Environment {
        if !update.snapshot.can_switch {
            return Err(AppError::Other(
                "No rear-facing camera is available".to_string(),
            ));
        }
        let switched = handle.execute(Command::SwitchCamera).await?;
        if let Some(err) = switched.snapshot.error {
            return Err(AppError::Camera(err));
        }
    }

    println!("Capturing...");
    let captured = handle.execute(Command::Capture).await?;
    match captured.snapshot.state {
        CaptureState::Captured => {}
        CaptureState::Error => {
            let err = captured
                .snapshot
                .error
                .unwrap_or_else(|| photobooth::CameraError::Unknown("capture failed".to_string()));
            return Err(AppError::Camera(err));
        }
        CaptureState::Preview => {
            return Err(AppError::Other("The camera is not ready yet".to_string()));
        }
    }
    if let Some(image) = &captured.snapshot.image {
        info!(width = image.width(), height = image.height(), "Photo captured");
    }

    let downloaded = handle.execute(Command::Download).await?;
    match downloaded.notice {
        Some(Notice::Saved(path)) => Ok(path),
        Some(Notice::SaveFailed(error)) => Err(AppError::Other(error)),
        _ => Err(AppError::Other("Nothing was saved".to_string())),
    }
}
