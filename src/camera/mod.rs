pub mod device;
pub mod session;
pub mod v4l2;

pub use device::{CameraDevice, CameraError, Facing, VideoFeed, VideoFrame, VideoSink, VideoStream};
pub use session::{CameraSession, DeviceState};
pub use v4l2::V4l2Camera;
