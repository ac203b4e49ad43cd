use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Which way the requested camera should face. Kiosk scanning always asks for
/// the operator-facing camera.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Facing {
    User,
    Environment,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera access was denied for {device}. Check the device permissions.")]
    PermissionDenied { device: String },
    #[error("No camera found at {device}.")]
    NotFound { device: String },
    #[error("Camera {device} is busy or failed: {reason}")]
    Busy { device: String, reason: String },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A single decoded frame as delivered by the camera.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl VideoFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A frame is usable once the stream has reported real dimensions.
    pub fn has_dimensions(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// Producer side of a live stream: the backend publishes its newest frame here.
#[derive(Clone)]
pub struct VideoFeed {
    tx: Arc<watch::Sender<Option<Arc<VideoFrame>>>>,
    ended: Arc<watch::Sender<Option<String>>>,
}

impl VideoFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        let (ended, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            ended: Arc::new(ended),
        }
    }

    pub fn publish(&self, frame: VideoFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// Detaches the current frame; every sink reads "not ready" afterwards.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Marks the stream as lost (device unplugged, backend exited). Only for
    /// failures; an owner stopping the stream calls [`VideoFeed::clear`].
    pub fn end(&self, reason: impl Into<String>) {
        self.clear();
        self.ended.send_replace(Some(reason.into()));
    }

    pub fn sink(&self) -> VideoSink {
        VideoSink {
            rx: self.tx.subscribe(),
            ended: self.ended.subscribe(),
        }
    }
}

impl Default for VideoFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a live stream. Holders can sample the current frame but
/// cannot start or stop the stream.
#[derive(Clone, Debug)]
pub struct VideoSink {
    rx: watch::Receiver<Option<Arc<VideoFrame>>>,
    ended: watch::Receiver<Option<String>>,
}

impl VideoSink {
    pub fn current(&self) -> Option<Arc<VideoFrame>> {
        self.rx.borrow().clone()
    }

    /// Why the stream was lost, if it was.
    pub fn end_reason(&self) -> Option<String> {
        self.ended.borrow().clone()
    }

    /// Resolves with the reason once the stream is lost. Never resolves for a
    /// stream that is stopped by its owner.
    pub async fn ended(&mut self) -> String {
        let reason = match self.ended.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone(),
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

/// An acquired camera stream. Dropping the last handle without calling
/// [`VideoStream::stop`] is a leak of the device lock, so the owner must stop it.
pub trait VideoStream: Send {
    fn sink(&self) -> VideoSink;

    /// Stops every track of the stream and clears its sink. Must be idempotent.
    fn stop(&mut self);
}

/// Platform camera access.
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> String;

    fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CameraError>;
}
