// SPDX-License-Identifier: MPL-2.0

//! Capture core of the photobooth
//!
//! # Architecture
//!
//! - `permission`: decides whether a stream request may be issued
//! - `stream_controller`: owns the live camera stream, fallback policy
//! - `session`: the preview / captured / error state machine
//! - `handle`: runs a session on its own task and exposes it to front ends
//! - `state`: session data types (identity, support, captured image)
//!
//! # Main Types
//!
//! - `CaptureSession`: state machine wiring user actions to the stream
//!   controller and the frame compositor
//! - `SessionHandle`: cloneable command/observe handle for front ends
//! - `Command`: all user actions a session accepts

pub mod handle;
pub mod permission;
pub mod session;
pub mod state;
pub mod stream_controller;

pub use handle::{Command, Notice, SessionHandle, SessionUpdate};
pub use permission::PermissionResolver;
pub use session::{CaptureSession, SessionSnapshot};
pub use state::{CameraSupport, CaptureState, CapturedImage, Identity, Phase};
pub use stream_controller::{StartOutcome, StreamController, StreamStatus, VideoSink};
