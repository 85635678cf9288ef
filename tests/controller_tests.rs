// Integration tests for the capture controller
//
// These tests run the controller against the synthetic provider and verify
// device selection, exclusive stream ownership across camera switches, the
// recording state machine, and teardown.

use anyhow::Result;
use async_trait::async_trait;
use greenroom::media::{
    CaptureConstraints, CaptureController, CaptureEvent, CaptureStream, DeviceDescriptor,
    MediaError, MediaProvider, RecorderConfig, RecorderState, StopReason, SyntheticProvider,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> RecorderConfig {
    RecorderConfig {
        max_duration: Duration::from_secs(60),
        min_duration: Duration::from_millis(1),
        timeslice: Duration::from_millis(10),
        ..RecorderConfig::default()
    }
}

fn controller_with(provider: Arc<SyntheticProvider>) -> CaptureController {
    CaptureController::new(provider, fast_config(), CaptureConstraints::default())
}

fn two_camera_provider() -> Arc<SyntheticProvider> {
    Arc::new(SyntheticProvider::with_devices(vec![
        DeviceDescriptor::video("cam-usb", "USB Webcam C920"),
        DeviceDescriptor::video("cam-internal", "Built-in FaceTime HD Camera"),
    ]))
}

/// Provider that refuses everything, standing in for a user who denied the
/// browser permission prompt.
struct DeniedProvider;

#[async_trait]
impl MediaProvider for DeniedProvider {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        Err(MediaError::PermissionDenied)
    }

    async fn open_stream(
        &self,
        _device_id: &str,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, MediaError> {
        Err(MediaError::PermissionDenied)
    }

    fn name(&self) -> &str {
        "denied"
    }
}

fn drain_stopped_events(
    rx: &mut tokio::sync::broadcast::Receiver<CaptureEvent>,
) -> Vec<StopReason> {
    let mut reasons = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CaptureEvent::RecordingStopped { reason, .. } = event {
            reasons.push(reason);
        }
    }
    reasons
}

#[tokio::test]
async fn test_initialize_prefers_built_in_camera() -> Result<()> {
    let provider = two_camera_provider();
    let mut controller = controller_with(Arc::clone(&provider));
    let mut events = controller.subscribe();

    controller.initialize(None).await?;

    assert_eq!(controller.selected_device(), Some("cam-internal"));
    assert_eq!(controller.devices().len(), 2);
    match events.try_recv()? {
        CaptureEvent::CameraReady { device_id } => assert_eq!(device_id, "cam-internal"),
        other => panic!("expected CameraReady, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_initialize_without_devices_fails() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::with_devices(vec![]));
    let mut controller = controller_with(provider);

    let err = controller.initialize(None).await.unwrap_err();
    assert!(matches!(err, MediaError::NoDeviceAvailable));
    Ok(())
}

#[tokio::test]
async fn test_permission_denied_is_surfaced() -> Result<()> {
    let mut controller = CaptureController::new(
        Arc::new(DeniedProvider),
        fast_config(),
        CaptureConstraints::default(),
    );
    let err = controller.initialize(None).await.unwrap_err();
    assert!(matches!(err, MediaError::PermissionDenied));
    Ok(())
}

#[tokio::test]
async fn test_change_camera_never_holds_two_streams() -> Result<()> {
    let provider = two_camera_provider();
    let mut controller = controller_with(Arc::clone(&provider));

    controller.initialize(None).await?;
    assert_eq!(provider.live_devices(), vec!["cam-internal".to_string()]);

    controller.change_camera("cam-usb").await?;
    assert_eq!(
        provider.live_devices(),
        vec!["cam-usb".to_string()],
        "the previous stream must be released before the new one opens"
    );
    assert_eq!(provider.live_stream_count(), 1);
    assert_eq!(controller.selected_device(), Some("cam-usb"));
    Ok(())
}

#[tokio::test]
async fn test_record_then_stop_produces_one_artifact() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(32));
    let mut controller = controller_with(provider);
    let mut events = controller.subscribe();

    controller.initialize(None).await?;
    controller.start_recording().await?;
    assert_eq!(controller.state(), RecorderState::Recording);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let artifact = controller.stop_recording().await?.expect("artifact after stop");
    assert_eq!(controller.state(), RecorderState::Stopped);
    assert!(!artifact.data.is_empty(), "buffered fragments make up the artifact");

    // A second stop is a no-op, not an error
    let second = controller.stop_recording().await?;
    assert!(second.is_none(), "second stop must not produce another artifact");

    let reasons = drain_stopped_events(&mut events);
    assert_eq!(reasons.len(), 1, "exactly one stopped transition");
    assert_eq!(reasons[0], StopReason::Requested);
    Ok(())
}

#[tokio::test]
async fn test_deadline_stops_recording_without_a_stop_call() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(16));
    let config = RecorderConfig {
        max_duration: Duration::from_millis(80),
        min_duration: Duration::from_millis(1),
        timeslice: Duration::from_millis(10),
        ..RecorderConfig::default()
    };
    let mut controller =
        CaptureController::new(provider, config, CaptureConstraints::default());
    let mut events = controller.subscribe();

    controller.initialize(None).await?;
    controller.start_recording().await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        controller.state(),
        RecorderState::Stopped,
        "deadline must stop the recording on its own"
    );
    assert!(controller.artifact().is_some());
    assert_eq!(controller.live_task_count(), 0);

    // A later stop call settles to the same artifact without a second event
    let artifact = controller.stop_recording().await?;
    assert!(artifact.is_some());

    let reasons = drain_stopped_events(&mut events);
    assert_eq!(reasons.len(), 1, "deadline and stop call together produce one transition");
    assert_eq!(reasons[0], StopReason::DeadlineElapsed);
    Ok(())
}

#[tokio::test]
async fn test_reset_discards_artifact_and_allows_rerecording() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(16));
    let mut controller = controller_with(provider);

    controller.initialize(None).await?;
    controller.start_recording().await?;
    tokio::time::sleep(Duration::from_millis(40)).await;
    let first = controller.stop_recording().await?.expect("first artifact");

    controller.reset();
    assert_eq!(controller.state(), RecorderState::Idle);
    assert!(controller.artifact().is_none(), "reset discards the previous artifact");

    controller.start_recording().await?;
    tokio::time::sleep(Duration::from_millis(40)).await;
    let second = controller.stop_recording().await?.expect("second artifact");
    assert_ne!(first.id, second.id, "each attempt gets a fresh artifact");
    Ok(())
}

#[tokio::test]
async fn test_start_is_rejected_outside_idle() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new());
    let mut controller = controller_with(provider);
    controller.initialize(None).await?;

    controller.start_recording().await?;
    let err = controller.start_recording().await.unwrap_err();
    assert!(matches!(err, MediaError::RecorderStart(_)));

    controller.stop_recording().await?;
    let err = controller.start_recording().await.unwrap_err();
    assert!(
        matches!(err, MediaError::RecorderStart(_)),
        "stopped requires a reset before recording again"
    );
    Ok(())
}

#[tokio::test]
async fn test_start_without_stream_is_rejected() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new());
    let mut controller = controller_with(provider);

    let err = controller.start_recording().await.unwrap_err();
    assert!(matches!(err, MediaError::RecorderStart(_)));
    Ok(())
}

#[tokio::test]
async fn test_stop_when_idle_is_a_noop() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new());
    let mut controller = controller_with(provider);
    controller.initialize(None).await?;

    let artifact = controller.stop_recording().await?;
    assert!(artifact.is_none());
    assert_eq!(controller.state(), RecorderState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_releases_stream_and_tasks() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(16));
    let mut controller = controller_with(Arc::clone(&provider));
    let mut events = controller.subscribe();

    controller.initialize(None).await?;
    controller.start_recording().await?;
    tokio::time::sleep(Duration::from_millis(30)).await;

    controller.shutdown().await;

    assert_eq!(controller.live_task_count(), 0, "no recording task survives teardown");
    assert_eq!(provider.live_stream_count(), 0, "the camera is given back");
    assert!(controller.selected_device().is_none());

    let reasons = drain_stopped_events(&mut events);
    assert_eq!(reasons.len(), 1, "teardown force-stops the in-flight recording once");
    Ok(())
}
