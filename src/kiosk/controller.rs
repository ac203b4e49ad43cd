use std::{future::Future, sync::Arc};

use anyhow::{anyhow, Context, Result};

use crate::{
    camera::{CameraDevice, CameraSession, DeviceState},
    capture::{encode_snapshot, CapturedFrame, FrameEncoder},
    events::{EventSink, KioskEvent},
    feedback::FeedbackController,
    recognition::RecognitionClient,
    scanner::{ScanController, ScannerState},
    settings::KioskSettings,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// One active scanner screen: camera, scan loop and feedback, wired together
/// and torn down together.
pub struct Kiosk {
    camera: CameraSession,
    scanner: ScanController,
    feedback: FeedbackController,
    events: Arc<dyn EventSink>,
    auto_start: bool,
    snapshot_quality: u8,
    closed: bool,
}

impl Kiosk {
    pub fn new(
        settings: &KioskSettings,
        device: Arc<dyn CameraDevice>,
        client: Arc<dyn RecognitionClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let feedback = FeedbackController::new(settings.feedback.durations(), events.clone());
        let scanner = ScanController::new(
            FrameEncoder::new(settings.target_width, settings.jpeg_quality),
            client,
            feedback.clone(),
            events.clone(),
            settings.scan_interval(),
        );

        Self {
            camera: CameraSession::new(device),
            scanner,
            feedback,
            events,
            auto_start: settings.auto_start,
            snapshot_quality: settings.snapshot_quality,
            closed: false,
        }
    }

    pub fn camera_state(&self) -> &DeviceState {
        self.camera.state()
    }

    pub async fn scanner_state(&self) -> ScannerState {
        self.scanner.state().await
    }

    pub fn feedback(&self) -> &FeedbackController {
        &self.feedback
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Brings the camera up and, with auto-start, begins scanning. A denied
    /// camera is reported through the camera state, not as an error: the
    /// kiosk stays open so the operator can retry.
    pub async fn open(&mut self) -> DeviceState {
        self.closed = false;
        self.emit_camera_state_with(DeviceState::Requesting);

        match self.camera.enable() {
            Ok(sink) => {
                self.emit_camera_state();
                self.scanner.set_stream(Some(sink)).await;
                if self.auto_start {
                    self.scanner.set_enabled(true).await;
                }
            }
            Err(err) => {
                log_warn!("camera unavailable, scanning disabled: {err}");
                self.scanner.set_stream(None).await;
                self.emit_camera_state();
            }
        }

        self.camera.state().clone()
    }

    /// Resolves with the failure text if the current camera stream is lost.
    /// Pending forever while no stream is held; the future owns its sink, so
    /// callers can keep using the kiosk while it is pending.
    pub fn stream_lost(&self) -> impl Future<Output = String> + Send + 'static {
        let sink = self.camera.sink();
        async move {
            match sink {
                Some(mut sink) => sink.ended().await,
                None => std::future::pending().await,
            }
        }
    }

    /// Moves a kiosk whose stream died to Denied: scanning stops and the
    /// operator sees the failure until they retry.
    pub async fn handle_stream_lost(&mut self, reason: &str) -> DeviceState {
        self.scanner.set_stream(None).await;
        let state = self.camera.mark_lost(reason).clone();
        self.emit_camera_state();
        state
    }

    /// Operator retry after a denial; re-requests the camera from scratch.
    pub async fn retry_camera(&mut self) -> DeviceState {
        self.scanner.set_stream(None).await;
        self.camera.disable();
        self.open().await
    }

    pub async fn set_scanning(&mut self, enabled: bool) {
        self.scanner.set_enabled(enabled).await;
    }

    /// Flips the scanning toggle and returns the new value.
    pub async fn toggle_scanning(&mut self) -> bool {
        let enabled = !self.scanner.is_enabled().await;
        self.scanner.set_enabled(enabled).await;
        enabled
    }

    /// Full-resolution mirrored photo of the current frame, for enrollment.
    pub async fn snapshot(&self) -> Result<CapturedFrame> {
        let sink = self
            .camera
            .sink()
            .ok_or_else(|| anyhow!("camera is not streaming"))?;
        let frame = sink
            .current()
            .ok_or_else(|| anyhow!("camera has not delivered a frame yet"))?;

        let quality = self.snapshot_quality;
        let captured = tokio::task::spawn_blocking(move || encode_snapshot(&frame, quality))
            .await
            .context("snapshot worker join failed")??
            .ok_or_else(|| anyhow!("camera frame has no dimensions yet"))?;

        self.events.emit(KioskEvent::SnapshotCaptured {
            width: captured.width,
            height: captured.height,
            image: captured.data_url.clone(),
        });
        Ok(captured)
    }

    /// Close/complete: stops scanning, releases the camera and clears the
    /// banner, then waits for the scan task. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.scanner.set_enabled(false).await;
        self.scanner.set_stream(None).await;
        self.camera.disable();
        self.emit_camera_state();
        self.feedback.clear().await;

        let joined = self.scanner.shutdown().await;
        self.events.emit(KioskEvent::Closed);
        log_info!("kiosk closed");
        joined
    }

    fn emit_camera_state(&self) {
        self.emit_camera_state_with(self.camera.state().clone());
    }

    fn emit_camera_state_with(&self, state: DeviceState) {
        self.events.emit(KioskEvent::CameraStateChanged { state });
    }
}
