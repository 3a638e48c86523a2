// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture session, driven through the session
//! actor against scripted virtual cameras

use photobooth::app::{CaptureSession, CaptureState, Command, Notice, SessionHandle};
use photobooth::backends::camera::{AcquireError, CameraPlatform, FacingMode, PermissionState};
use photobooth::backends::virtual_camera::{PermissionScript, VirtualDevice, VirtualPlatform, solid_image};
use photobooth::pipelines::photo::OverlaySlot;
use photobooth::{CameraError, Config};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn config(download_dir: &Path) -> Config {
    Config {
        download_dir: Some(download_dir.to_path_buf()),
        metadata_timeout_ms: 200,
        ..Config::default()
    }
}

fn spawn(platform: &VirtualPlatform, download_dir: &Path) -> SessionHandle {
    let platform: Arc<dyn CameraPlatform> = Arc::new(platform.clone());
    let session = CaptureSession::new(platform, &config(download_dir), OverlaySlot::empty());
    SessionHandle::spawn(session)
}

fn front_only() -> VirtualPlatform {
    VirtualPlatform::new().with_device(VirtualDevice::new(
        "Integrated Camera",
        Some(FacingMode::User),
        solid_image(64, 36, [40, 80, 120, 255]),
    ))
}

async fn identify(handle: &SessionHandle) {
    let update = handle
        .execute(Command::SubmitIdentity {
            name: "Ada Lovelace".to_string(),
            branch: "Leeds".to_string(),
        })
        .await
        .unwrap();
    assert!(update.snapshot.identity.is_some());
}

#[tokio::test]
async fn test_mount_starts_user_camera() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert!(update.snapshot.streaming);
    assert_eq!(update.snapshot.facing_mode, FacingMode::User);
    assert_eq!(platform.requested_modes(), vec![FacingMode::User]);
    assert_eq!(platform.live_streams(), 1);
    assert!(handle.sink().latest_frame().is_some());

    handle.teardown().await;
    assert_eq!(platform.live_streams(), 0);
}

#[tokio::test]
async fn test_at_most_one_live_stream() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;

    for _ in 0..2 {
        let update = handle.execute(Command::SwitchCamera).await.unwrap();
        assert_eq!(update.snapshot.state, CaptureState::Preview);
    }
    handle.execute(Command::Capture).await.unwrap();
    handle.execute(Command::Retake).await.unwrap();
    handle.execute(Command::Retake).await.unwrap();

    assert_eq!(platform.max_live_streams(), 1);
    assert_eq!(platform.live_streams(), 1);
    handle.teardown().await;
    assert_eq!(platform.live_streams(), 0);
}

#[tokio::test]
async fn test_capture_requires_identity() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());

    let mounted = handle.mounted().await.unwrap();
    assert!(!mounted.snapshot.can_capture);

    let update = handle.execute(Command::Capture).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert!(update.snapshot.image.is_none());
    assert!(update.snapshot.streaming);

    handle.teardown().await;
}

#[tokio::test]
async fn test_capture_composes_frame_and_stops_stream() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;

    let update = handle.execute(Command::Capture).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Captured);
    assert!(!update.snapshot.streaming);
    assert!(!update.snapshot.can_switch);
    let image = update.snapshot.image.expect("captured image");
    assert_eq!((image.width(), image.height()), (64, 36));
    assert_eq!(&image.bytes()[..8], b"\x89PNG\r\n\x1a\n");
    assert!(image.to_data_url().starts_with("data:image/png;base64,"));
    assert_eq!(platform.live_streams(), 0);

    // A second capture in the captured state changes nothing
    let again = handle.execute(Command::Capture).await.unwrap();
    assert_eq!(again.snapshot.image.as_ref(), Some(&image));

    handle.teardown().await;
}

#[tokio::test]
async fn test_retake_discards_image_and_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;
    handle.execute(Command::Capture).await.unwrap();

    let update = handle.execute(Command::Retake).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert!(update.snapshot.image.is_none());
    assert!(update.snapshot.error.is_none());
    assert!(update.snapshot.streaming);
    assert_eq!(platform.request_count(), 2);
    // Identity survives a retake
    assert!(update.snapshot.can_capture);

    handle.teardown().await;
}

#[tokio::test]
async fn test_retry_clears_error() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    platform.fail_next_request(AcquireError::NotReadable("device busy".to_string()));
    let handle = spawn(&platform, dir.path());

    let mounted = handle.mounted().await.unwrap();
    assert_eq!(mounted.snapshot.state, CaptureState::Error);
    assert!(matches!(mounted.snapshot.error, Some(CameraError::Unknown(_))));
    assert!(!mounted.snapshot.streaming);

    // Capture and retake are no-ops in the error state
    identify(&handle).await;
    let update = handle.execute(Command::Capture).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Error);
    assert!(update.snapshot.image.is_none());
    handle.execute(Command::Retake).await.unwrap();
    assert_eq!(platform.request_count(), 1);

    let update = handle.execute(Command::Retry).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert!(update.snapshot.error.is_none());
    assert!(update.snapshot.streaming);
    assert_eq!(platform.request_count(), 2);

    handle.teardown().await;
}

#[tokio::test]
async fn test_switch_falls_back_to_user_once() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    let mounted = handle.mounted().await.unwrap();
    assert!(mounted.snapshot.can_switch);

    platform.fail_next_request(AcquireError::NotFound("rear camera unplugged".to_string()));
    let update = handle.execute(Command::SwitchCamera).await.unwrap();

    assert_eq!(
        platform.requested_modes(),
        vec![FacingMode::User, FacingMode::Environment, FacingMode::User]
    );
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert!(update.snapshot.error.is_none());
    assert!(update.snapshot.streaming);
    assert_eq!(update.snapshot.facing_mode, FacingMode::User);
    // Support is not re-detected after a fallback
    assert!(!update.snapshot.support.has_environment);
    assert!(!update.snapshot.can_switch);

    handle.teardown().await;
}

#[tokio::test]
async fn test_failed_fallback_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();

    platform.fail_next_request(AcquireError::Overconstrained {
        constraint: "facingMode".to_string(),
    });
    platform.fail_next_request(AcquireError::NotFound("gone".to_string()));
    let update = handle.execute(Command::SwitchCamera).await.unwrap();

    assert_eq!(platform.request_count(), 3);
    assert_eq!(update.snapshot.state, CaptureState::Error);
    assert_eq!(update.snapshot.error, Some(CameraError::NoDevice));
    assert_eq!(platform.live_streams(), 0);

    handle.teardown().await;
}

#[tokio::test]
async fn test_user_failure_does_not_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::new().with_device(VirtualDevice::new(
        "Back Camera",
        Some(FacingMode::Environment),
        solid_image(32, 18, [0, 0, 0, 255]),
    ));
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert_eq!(platform.requested_modes(), vec![FacingMode::User]);
    assert_eq!(update.snapshot.error, Some(CameraError::NoDevice));

    handle.teardown().await;
}

#[tokio::test]
async fn test_denied_permission_skips_request() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only().with_permission(PermissionScript::State(PermissionState::Denied));
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert_eq!(platform.request_count(), 0);
    assert_eq!(update.snapshot.state, CaptureState::Error);
    assert_eq!(update.snapshot.error, Some(CameraError::PermissionBlocked));

    handle.teardown().await;
}

#[tokio::test]
async fn test_permission_revoked_before_retry() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    platform.fail_next_request(AcquireError::Aborted("interrupted".to_string()));
    let handle = spawn(&platform, dir.path());
    let mounted = handle.mounted().await.unwrap();
    assert_eq!(mounted.snapshot.state, CaptureState::Error);

    platform.set_permission(PermissionScript::State(PermissionState::Denied));
    let update = handle.execute(Command::Retry).await.unwrap();
    assert_eq!(platform.request_count(), 1);
    assert_eq!(update.snapshot.error, Some(CameraError::PermissionBlocked));

    handle.teardown().await;
}

#[tokio::test]
async fn test_denied_at_prompt_is_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only()
        .with_permission(PermissionScript::State(PermissionState::Prompt))
        .deny_at_prompt();
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert_eq!(platform.request_count(), 1);
    assert_eq!(update.snapshot.error, Some(CameraError::PermissionDenied));
    assert_ne!(
        CameraError::PermissionDenied.user_message(),
        CameraError::PermissionBlocked.user_message()
    );

    handle.teardown().await;
}

#[tokio::test]
async fn test_unknown_permission_still_requests() {
    let dir = tempfile::tempdir().unwrap();
    for script in [PermissionScript::Unsupported, PermissionScript::Fails] {
        let platform = front_only().with_permission(script);
        let handle = spawn(&platform, dir.path());

        let update = handle.mounted().await.unwrap();
        assert_eq!(platform.request_count(), 1);
        assert_eq!(update.snapshot.state, CaptureState::Preview);

        handle.teardown().await;
    }
}

#[tokio::test]
async fn test_unsupported_platform() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::unsupported();
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert_eq!(platform.request_count(), 0);
    assert_eq!(update.snapshot.error, Some(CameraError::Unsupported));

    handle.teardown().await;
}

#[tokio::test]
async fn test_download_without_image_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();

    let update = handle.execute(Command::Download).await.unwrap();
    assert_eq!(update.notice, None);
    assert!(update.snapshot.last_download.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    handle.teardown().await;
}

#[tokio::test]
async fn test_download_saves_png() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;
    let captured = handle.execute(Command::Capture).await.unwrap();
    let image = captured.snapshot.image.unwrap();

    let update = handle.execute(Command::Download).await.unwrap();
    let Some(Notice::Saved(path)) = update.notice else {
        panic!("expected a saved notice, got {:?}", update.notice);
    };
    assert_eq!(path.parent(), Some(dir.path()));
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("photobooth-"));
    assert!(file_name.ends_with(".png"));
    let millis = file_name
        .trim_start_matches("photobooth-")
        .trim_end_matches(".png");
    assert!(millis.parse::<i64>().is_ok());
    assert_eq!(std::fs::read(&path).unwrap(), image.bytes());
    assert_eq!(update.snapshot.last_download, Some(path));

    handle.teardown().await;
}

#[tokio::test]
async fn test_switch_offered_only_with_rear_camera() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert!(!update.snapshot.support.has_environment);
    assert!(!update.snapshot.can_switch);

    handle.execute(Command::SwitchCamera).await.unwrap();
    assert_eq!(platform.request_count(), 1);

    handle.teardown().await;
}

#[tokio::test]
async fn test_switch_from_label_hint_without_capabilities() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo().without_facing_capabilities();
    let handle = spawn(&platform, dir.path());

    let update = handle.mounted().await.unwrap();
    assert!(update.snapshot.support.has_environment);
    assert!(update.snapshot.support.has_multiple_inputs);
    assert!(update.snapshot.can_switch);

    let switched = handle.execute(Command::SwitchCamera).await.unwrap();
    assert_eq!(switched.snapshot.facing_mode, FacingMode::Environment);

    handle.teardown().await;
}

#[tokio::test]
async fn test_teardown_during_request_releases_stream() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    platform.set_request_delay(Some(Duration::from_millis(150)));
    let handle = spawn(&platform, dir.path());

    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.teardown().await;

    assert_eq!(platform.request_count(), 1);
    assert_eq!(platform.live_streams(), 0);
    assert_eq!(platform.stopped_streams(), 1);
    assert!(!handle.sink().is_attached());
    let latest = handle.latest();
    assert!(!latest.snapshot.streaming);
    assert!(latest.snapshot.error.is_none());
}

#[tokio::test]
async fn test_identity_is_one_shot() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();

    let rejected = handle
        .execute(Command::SubmitIdentity {
            name: "   ".to_string(),
            branch: "Leeds".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(rejected.notice, Some(Notice::IdentityRejected(_))));
    assert!(rejected.snapshot.identity.is_none());

    identify(&handle).await;
    let update = handle
        .execute(Command::SubmitIdentity {
            name: "Someone Else".to_string(),
            branch: "York".to_string(),
        })
        .await
        .unwrap();
    let identity = update.snapshot.identity.unwrap();
    assert_eq!(identity.name(), "Ada Lovelace");
    assert_eq!(identity.branch(), "Leeds");

    handle.teardown().await;
}

#[tokio::test]
async fn test_retake_keeps_environment_camera() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;

    let switched = handle.execute(Command::SwitchCamera).await.unwrap();
    assert_eq!(switched.snapshot.facing_mode, FacingMode::Environment);
    handle.execute(Command::Capture).await.unwrap();

    let update = handle.execute(Command::Retake).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert_eq!(update.snapshot.facing_mode, FacingMode::Environment);
    assert_eq!(
        platform.requested_modes(),
        vec![FacingMode::User, FacingMode::Environment, FacingMode::Environment]
    );

    handle.teardown().await;
}

#[tokio::test]
async fn test_terminal_error_resets_to_user_camera() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();
    identify(&handle).await;
    handle.execute(Command::SwitchCamera).await.unwrap();
    handle.execute(Command::Capture).await.unwrap();

    platform.fail_next_request(AcquireError::NotReadable("device busy".to_string()));
    let failed = handle.execute(Command::Retake).await.unwrap();
    assert_eq!(failed.snapshot.state, CaptureState::Error);
    assert_eq!(failed.snapshot.facing_mode, FacingMode::User);

    let update = handle.execute(Command::Retry).await.unwrap();
    assert_eq!(update.snapshot.state, CaptureState::Preview);
    assert_eq!(update.snapshot.facing_mode, FacingMode::User);
    assert_eq!(
        platform.requested_modes(),
        vec![
            FacingMode::User,
            FacingMode::Environment,
            FacingMode::Environment,
            FacingMode::User
        ]
    );

    handle.teardown().await;
}

#[tokio::test]
async fn test_teardown_during_switch_skips_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let platform = VirtualPlatform::demo();
    let handle = spawn(&platform, dir.path());
    handle.mounted().await.unwrap();

    platform.set_request_delay(Some(Duration::from_millis(150)));
    platform.fail_next_request(AcquireError::NotFound("rear camera unplugged".to_string()));
    handle.dispatch(Command::SwitchCamera).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.teardown().await;

    assert_eq!(
        platform.requested_modes(),
        vec![FacingMode::User, FacingMode::Environment]
    );
    assert_eq!(platform.live_streams(), 0);
    assert_eq!(platform.max_live_streams(), 1);
    let latest = handle.latest();
    assert!(!latest.snapshot.streaming);
    assert!(!latest.snapshot.loading);
}

#[tokio::test]
async fn test_failure_after_observed_denial_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let platform = front_only().with_permission(PermissionScript::State(PermissionState::Denied));
    let handle = spawn(&platform, dir.path());
    let mounted = handle.mounted().await.unwrap();
    assert_eq!(mounted.snapshot.error, Some(CameraError::PermissionBlocked));

    // The query now fails, so the request goes ahead and is refused
    platform.set_permission(PermissionScript::Fails);
    platform.fail_next_request(AcquireError::NotAllowed("refused".to_string()));
    let update = handle.execute(Command::Retry).await.unwrap();

    assert_eq!(platform.request_count(), 1);
    assert_eq!(update.snapshot.state, CaptureState::Error);
    assert_eq!(update.snapshot.error, Some(CameraError::PermissionBlocked));

    handle.teardown().await;
}

#[tokio::test]
async fn test_awaited_overlay_is_on_the_capture() {
    let dir = tempfile::tempdir().unwrap();
    let artwork = dir.path().join("frame.svg");
    std::fs::write(
        &artwork,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="90">
            <rect x="0" y="0" width="160" height="10" fill="#ff0000"/>
        </svg>"##,
    )
    .unwrap();
    let overlay = OverlaySlot::spawn_load(artwork);
    overlay.wait_loaded().await.unwrap();

    let platform = front_only();
    let session = CaptureSession::new(
        Arc::new(platform.clone()),
        &config(dir.path()),
        overlay,
    );
    let handle = SessionHandle::spawn(session);
    handle.mounted().await.unwrap();
    identify(&handle).await;

    let update = handle.execute(Command::Capture).await.unwrap();
    let image = update.snapshot.image.expect("captured image");
    let decoded = image::load_from_memory(image.bytes()).unwrap().to_rgba8();
    let top = decoded.get_pixel(32, 1).0;
    assert!(top[0] > 200 && top[2] < 50, "overlay missing: {top:?}");

    handle.teardown().await;
}
