// SPDX-License-Identifier: MPL-2.0

//! PipeWire GStreamer pipeline for camera capture
//!
//! ```text
//! pipewiresrc ! decodebin ! videoconvert ! videoscale ! video/x-raw,RGBA ! appsink
//! ```
//!
//! Every decoded frame replaces the previous one on a watch channel.

use super::super::types::*;
use super::enumeration::PipeWireCamera;
use crate::constants::{pipeline, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Running capture pipeline of one camera
pub struct CameraPipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
}

impl CameraPipeline {
    /// Build the pipeline and bring it to PLAYING
    ///
    /// Blocks until the state change settles, so call it off the async
    /// runtime.
    pub fn start(
        camera: &PipeWireCamera,
        size: Option<Resolution>,
        frame_sender: FrameSender,
    ) -> Result<Self, AcquireError> {
        gstreamer::init().map_err(|e| AcquireError::Other(e.to_string()))?;

        let description = pipeline_description(camera.serial.as_deref(), size);
        info!(camera = %camera.name, %description, "Creating PipeWire pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| AcquireError::NotReadable(format!("Failed to build pipeline: {}", e)))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| AcquireError::Other("Launch result is not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| AcquireError::Other("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| AcquireError::Other("Failed to cast appsink".to_string()))?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);
        install_frame_callback(&appsink, frame_sender);

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let err = bus_error(&pipeline)
                .unwrap_or_else(|| AcquireError::NotReadable(format!("Failed to start pipeline: {}", e)));
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(err);
        }

        let (result, state, pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if result.is_err() {
            let err = bus_error(&pipeline)
                .unwrap_or_else(|| AcquireError::NotReadable("Pipeline failed to start".to_string()));
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(err);
        }
        if state != gstreamer::State::Playing {
            warn!("Pipeline is not in PLAYING state yet");
        }

        info!(camera = %camera.name, "PipeWire camera started");
        Ok(Self { pipeline, appsink })
    }

    /// Make sure frames are flowing
    pub fn play(&self) -> BackendResult<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map(|_| ())
            .map_err(|e| BackendError::Other(format!("Failed to resume pipeline: {}", e)))
    }

    /// Release the camera
    pub fn stop(&self) {
        info!("Stopping PipeWire pipeline");
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop pipeline");
            return;
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        match result {
            Ok(_) => debug!(state = ?state, "PipeWire pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// gst-launch description for a camera
pub fn pipeline_description(serial: Option<&str>, size: Option<Resolution>) -> String {
    let source = match serial {
        Some(serial) => format!("pipewiresrc target-object={} do-timestamp=true", serial),
        None => "pipewiresrc do-timestamp=true".to_string(),
    };
    let caps = match size {
        Some(size) => format!(
            "video/x-raw,format={},width={},height={}",
            pipeline::OUTPUT_FORMAT,
            size.width,
            size.height
        ),
        None => format!("video/x-raw,format={}", pipeline::OUTPUT_FORMAT),
    };
    format!(
        "{source} ! decodebin ! videoconvert n-threads={} ! videoscale ! {caps} ! appsink name=sink",
        pipeline::videoconvert_threads()
    )
}

fn install_frame_callback(appsink: &AppSink, frame_sender: FrameSender) {
    let frame_counter = Arc::new(AtomicU64::new(0));
    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_start = Instant::now();
                let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to pull sample");
                    gstreamer::FlowError::Eos
                })?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                    debug!(frame = frame_num, "Skipping corrupted buffer");
                    return Ok(gstreamer::FlowSuccess::Ok);
                }
                let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                let video_info =
                    VideoInfo::from_caps(caps).map_err(|_| gstreamer::FlowError::Error)?;
                let map = buffer
                    .map_readable()
                    .map_err(|_| gstreamer::FlowError::Error)?;

                let frame = CameraFrame {
                    width: video_info.width(),
                    height: video_info.height(),
                    stride: video_info.stride()[0] as u32,
                    data: Arc::from(map.as_slice()),
                    captured_at: frame_start,
                };

                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        stride = frame.stride,
                        copy_us = frame_start.elapsed().as_micros() as u64,
                        "Frame received"
                    );
                }

                frame_sender.send_replace(Some(Arc::new(frame)));
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// First error posted on the bus, mapped to an acquisition failure
fn bus_error(pipeline: &gstreamer::Pipeline) -> Option<AcquireError> {
    let bus = pipeline.bus()?;
    let message = bus.timed_pop_filtered(
        gstreamer::ClockTime::from_mseconds(100),
        &[gstreamer::MessageType::Error],
    )?;
    let gstreamer::MessageView::Error(err) = message.view() else {
        return None;
    };
    let error = err.error();
    error!(error = %error, debug = ?err.debug(), "Pipeline error");

    let detail = error.to_string();
    Some(match error.kind::<gstreamer::ResourceError>() {
        Some(gstreamer::ResourceError::NotFound) => AcquireError::NotFound(detail),
        Some(gstreamer::ResourceError::NotAuthorized) => AcquireError::NotAllowed(detail),
        Some(
            gstreamer::ResourceError::Busy
            | gstreamer::ResourceError::OpenRead
            | gstreamer::ResourceError::OpenReadWrite
            | gstreamer::ResourceError::Read,
        ) => AcquireError::NotReadable(detail),
        _ => AcquireError::Other(detail),
    })
}
