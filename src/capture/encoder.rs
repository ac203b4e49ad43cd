use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use image::{
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
    RgbImage,
};

use crate::camera::VideoFrame;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// One encoded frame, ready to be submitted. Lives for a single scan cycle.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| anyhow!("frame is not a JPEG data URL"))?;
        STANDARD
            .decode(payload)
            .map_err(|err| anyhow!("invalid base64 payload: {err}"))
    }
}

/// Output size for a uniform downscale to `target_width`.
///
/// Returns `None` while the source has no dimensions (stream not ready).
pub fn scaled_dimensions(source_width: u32, source_height: u32, target_width: u32) -> Option<(u32, u32)> {
    if source_width == 0 || source_height == 0 || target_width == 0 {
        return None;
    }
    let scale = target_width as f64 / source_width as f64;
    let target_height = (source_height as f64 * scale).round().max(1.0) as u32;
    Some((target_width, target_height))
}

/// Samples video frames into compact, mirrored JPEG payloads.
///
/// The preview shown to the operator is mirrored, so the submitted frame is
/// mirrored too: any geometry the service returns is then already in preview
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    target_width: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(target_width: u32, quality: u8) -> Self {
        Self {
            target_width,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Encodes the frame for a scan cycle. `Ok(None)` means the frame has no
    /// usable dimensions yet and the cycle should be skipped.
    pub fn encode(&self, frame: &VideoFrame) -> Result<Option<CapturedFrame>> {
        let Some((width, height)) = scaled_dimensions(frame.width(), frame.height(), self.target_width) else {
            return Ok(None);
        };

        let mut scaled = imageops::resize(&frame.image, width, height, FilterType::Triangle);
        imageops::flip_horizontal_in_place(&mut scaled);

        Ok(Some(CapturedFrame {
            width,
            height,
            data_url: to_data_url(&scaled, self.quality)?,
            captured_at: frame.captured_at,
        }))
    }
}

/// Full-resolution mirrored capture used for enrollment photos.
pub fn encode_snapshot(frame: &VideoFrame, quality: u8) -> Result<Option<CapturedFrame>> {
    if !frame.has_dimensions() {
        return Ok(None);
    }
    let mirrored = imageops::flip_horizontal(&frame.image);
    Ok(Some(CapturedFrame {
        width: mirrored.width(),
        height: mirrored.height(),
        data_url: to_data_url(&mirrored, quality.clamp(1, 100))?,
        captured_at: frame.captured_at,
    }))
}

fn to_data_url(image: &RgbImage, quality: u8) -> Result<String> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;

    let mut data_url = String::with_capacity(DATA_URL_PREFIX.len() + buffer.len() * 4 / 3 + 4);
    data_url.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(&buffer, &mut data_url);
    Ok(data_url)
}
