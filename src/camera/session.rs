use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{CameraDevice, CameraError, Facing, VideoSink, VideoStream};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeviceState {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Denied { reason: String },
}

/// Exclusive owner of the camera stream for one kiosk lifetime.
///
/// Only this type starts or stops tracks; everyone else gets a [`VideoSink`].
/// The stream is released on [`CameraSession::disable`] and again on drop, so
/// every exit path gives the device back.
pub struct CameraSession {
    device: Arc<dyn CameraDevice>,
    state: DeviceState,
    stream: Option<Box<dyn VideoStream>>,
    session_id: Option<String>,
}

impl CameraSession {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            state: DeviceState::Idle,
            stream: None,
            session_id: None,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == DeviceState::Streaming && self.stream.is_some()
    }

    pub fn sink(&self) -> Option<VideoSink> {
        self.stream.as_ref().map(|stream| stream.sink())
    }

    /// Requests the front camera. Any stream held from an earlier call is
    /// released before the new request goes out.
    pub fn enable(&mut self) -> Result<VideoSink, CameraError> {
        self.release_stream();

        self.state = DeviceState::Requesting;
        let device_name = self.device.name();

        match self.device.open(Facing::User) {
            Ok(stream) => {
                let sink = stream.sink();
                let session_id = Uuid::new_v4().to_string();
                log_info!("camera {} streaming (session {})", device_name, session_id);
                self.stream = Some(stream);
                self.session_id = Some(session_id);
                self.state = DeviceState::Streaming;
                Ok(sink)
            }
            Err(err) => {
                log_warn!("camera {} unavailable: {err}", device_name);
                self.state = DeviceState::Denied {
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Stops all tracks and clears the sink. Safe to call when already idle.
    /// A denied session stays denied so the error remains visible.
    pub fn disable(&mut self) {
        self.release_stream();
        if !matches!(self.state, DeviceState::Denied { .. }) {
            self.state = DeviceState::Idle;
        }
    }

    /// The stream died under us (unplugged, backend exited). Releases what is
    /// left of it and reports the session as denied with the failure text.
    pub fn mark_lost(&mut self, reason: &str) -> &DeviceState {
        self.release_stream();
        let err = CameraError::Busy {
            device: self.device.name(),
            reason: reason.to_string(),
        };
        log_warn!("camera stream lost: {err}");
        self.state = DeviceState::Denied {
            reason: err.to_string(),
        };
        &self.state
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            if let Some(session_id) = self.session_id.take() {
                log_info!("camera session {} released", session_id);
            }
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}
