pub mod encoder;

pub use encoder::{encode_snapshot, scaled_dimensions, CapturedFrame, FrameEncoder};
