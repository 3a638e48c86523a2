// SPDX-License-Identifier: GPL-3.0-only

//! Session actor
//!
//! One tokio task owns the [`CaptureSession`] and processes [`Command`]s in
//! order, so only one start sequence runs at a time. Front ends keep a cloneable
//! [`SessionHandle`]: they send commands without waiting, and observe the
//! results through watch channels. The stream status channel is published by
//! the controller itself, so loading progress is visible while a command is
//! still running.

use crate::app::session::{CaptureSession, SessionSnapshot};
use crate::app::stream_controller::{StreamStatus, VideoSink};
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// User actions accepted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SubmitIdentity { name: String, branch: String },
    Capture,
    Retake,
    Retry,
    SwitchCamera,
    Download,
    Teardown,
}

/// Outcome of the last command worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved(PathBuf),
    SaveFailed(String),
    IdentityRejected(String),
}

/// Published after every processed command
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    /// Number of processed commands, including the initial mount
    pub revision: u64,
    pub snapshot: SessionSnapshot,
    pub notice: Option<Notice>,
}

struct Envelope {
    command: Command,
    done: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Envelope>,
    updates: watch::Receiver<SessionUpdate>,
    status: watch::Receiver<StreamStatus>,
    sink: VideoSink,
    mounted: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Mount `session` on a new task
    pub fn spawn(session: CaptureSession) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (updates_tx, updates) = watch::channel(SessionUpdate {
            revision: 0,
            snapshot: session.snapshot(),
            notice: None,
        });
        let handle = Self {
            commands,
            updates,
            status: session.stream_status(),
            sink: session.sink(),
            mounted: session.mount_flag(),
        };
        // Set before the task runs so an early teardown is not overwritten
        handle.mounted.store(true, Ordering::Release);
        tokio::spawn(run(session, receiver, updates_tx));
        handle
    }

    /// Queue a command without waiting for it
    pub fn dispatch(&self, command: Command) -> AppResult<()> {
        if command == Command::Teardown {
            self.mounted.store(false, Ordering::Release);
        }
        self.commands
            .send(Envelope {
                command,
                done: None,
            })
            .map_err(|_| AppError::Other("session has ended".to_string()))
    }

    /// Queue a command and wait until it has been processed
    pub async fn execute(&self, command: Command) -> AppResult<SessionUpdate> {
        if command == Command::Teardown {
            self.mounted.store(false, Ordering::Release);
        }
        let (done, finished) = oneshot::channel();
        self.commands
            .send(Envelope {
                command,
                done: Some(done),
            })
            .map_err(|_| AppError::Other("session has ended".to_string()))?;
        finished
            .await
            .map_err(|_| AppError::Other("session ended before the command finished".to_string()))?;
        Ok(self.updates.borrow().clone())
    }

    /// Wait for the initial mount to finish
    pub async fn mounted(&self) -> AppResult<SessionUpdate> {
        let mut updates = self.updates.clone();
        updates
            .wait_for(|update| update.revision > 0)
            .await
            .map(|update| update.clone())
            .map_err(|_| AppError::Other("session ended before mounting".to_string()))
    }

    /// Tear the session down and wait for the camera to be released
    ///
    /// The mount flag is cleared immediately, so a start that is still in
    /// flight releases its stream as soon as it resolves.
    pub async fn teardown(&self) {
        self.mounted.store(false, Ordering::Release);
        if self.execute(Command::Teardown).await.is_err() {
            debug!("Session already ended");
        }
    }

    pub fn latest(&self) -> SessionUpdate {
        self.updates.borrow().clone()
    }

    pub fn updates(&self) -> watch::Receiver<SessionUpdate> {
        self.updates.clone()
    }

    pub fn stream_status(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    pub fn sink(&self) -> VideoSink {
        self.sink.clone()
    }
}

async fn run(
    mut session: CaptureSession,
    mut commands: mpsc::UnboundedReceiver<Envelope>,
    updates: watch::Sender<SessionUpdate>,
) {
    let mut revision = 0;

    // Skip the camera entirely when torn down before the task started
    if session.mount_flag().load(Ordering::Acquire) {
        session.enter_preview().await;
    }
    revision += 1;
    publish(&updates, &session, revision, None);

    while let Some(Envelope { command, done }) = commands.recv().await {
        debug!(?command, "Processing command");
        let teardown = command == Command::Teardown;
        let notice = apply(&mut session, command).await;
        revision += 1;
        publish(&updates, &session, revision, notice);
        if let Some(done) = done {
            let _ = done.send(());
        }
        if teardown {
            break;
        }
    }

    session.teardown();
    info!("Session task finished");
}

async fn apply(session: &mut CaptureSession, command: Command) -> Option<Notice> {
    match command {
        Command::SubmitIdentity { name, branch } => {
            match session.submit_identity(&name, &branch) {
                Ok(_) => None,
                Err(e) => Some(Notice::IdentityRejected(e.to_string())),
            }
        }
        Command::Capture => {
            session.capture().await;
            None
        }
        Command::Retake => {
            session.retake().await;
            None
        }
        Command::Retry => {
            session.retry().await;
            None
        }
        Command::SwitchCamera => {
            session.switch_camera().await;
            None
        }
        Command::Download => match session.download().await {
            Ok(Some(path)) => Some(Notice::Saved(path)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Download failed");
                Some(Notice::SaveFailed(e.to_string()))
            }
        },
        Command::Teardown => {
            session.teardown();
            None
        }
    }
}

fn publish(
    updates: &watch::Sender<SessionUpdate>,
    session: &CaptureSession,
    revision: u64,
    notice: Option<Notice>,
) {
    updates.send_replace(SessionUpdate {
        revision,
        snapshot: session.snapshot(),
        notice,
    });
}
