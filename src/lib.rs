// SPDX-License-Identifier: MPL-2.0

//! Photobooth - live camera preview, framed still capture, PNG download
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture session state machine and stream lifecycle
//! - [`backends`]: Camera platform abstraction (PipeWire, virtual)
//! - [`pipelines`]: Still-photo compositing and encoding
//! - [`config`]: User configuration handling
//! - [`storage`]: Saving captured photos
//! - [`terminal`]: Terminal front end
//!
//! # Example
//!
//! ```ignore
//! let platform = photobooth::backends::camera::get_platform(CameraSource::Virtual);
//! let session = CaptureSession::new(platform, &Config::default(), OverlaySlot::empty());
//! let handle = SessionHandle::spawn(session);
//! handle.execute(Command::SubmitIdentity { name, branch }).await?;
//! handle.execute(Command::Capture).await?;
//! handle.execute(Command::Download).await?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod i18n;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{CaptureSession, Command, SessionHandle};
pub use config::Config;
pub use errors::{AppError, AppResult, CameraError};
