use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::feedback::FeedbackDurations;

/// Per-outcome banner lifetimes in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedbackSettings {
    pub recognized_ms: u64,
    pub no_match_ms: u64,
    pub not_enrolled_ms: u64,
    pub no_data_ms: u64,
    pub error_ms: u64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            recognized_ms: 3000,
            no_match_ms: 1000,
            not_enrolled_ms: 1000,
            no_data_ms: 2000,
            error_ms: 3000,
        }
    }
}

impl FeedbackSettings {
    pub fn durations(&self) -> FeedbackDurations {
        FeedbackDurations {
            recognized: Duration::from_millis(self.recognized_ms),
            no_match: Duration::from_millis(self.no_match_ms),
            not_enrolled: Duration::from_millis(self.not_enrolled_ms),
            no_data: Duration::from_millis(self.no_data_ms),
            error: Duration::from_millis(self.error_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskSettings {
    /// Base URL of the recognition service; `/attendance/scan` is appended.
    pub service_url: String,
    pub auth_token: Option<String>,
    pub camera_device: String,
    /// Capture resolution requested from the camera (width, height).
    pub camera_size: (u32, u32),
    /// How long to wait for the first frame before reporting the camera busy.
    pub camera_start_timeout_ms: u64,
    /// Width of the frame submitted for recognition.
    pub target_width: u32,
    pub jpeg_quality: u8,
    pub snapshot_quality: u8,
    /// Delay between the end of one scan cycle and the start of the next.
    pub scan_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Start scanning as soon as the camera is streaming.
    pub auto_start: bool,
    pub feedback: FeedbackSettings,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8000".into(),
            auth_token: None,
            camera_device: "/dev/video0".into(),
            camera_size: (640, 480),
            camera_start_timeout_ms: 5_000,
            target_width: 500,
            jpeg_quality: 70,
            snapshot_quality: 80,
            scan_interval_ms: 500,
            request_timeout_ms: 10_000,
            auto_start: true,
            feedback: FeedbackSettings::default(),
        }
    }
}

impl KioskSettings {
    /// Reads settings from `path`, falling back to defaults when the file does
    /// not exist. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_url.trim().is_empty() {
            bail!("service_url must not be empty");
        }
        if self.target_width == 0 {
            bail!("target_width must be greater than zero");
        }
        if self.camera_size.0 == 0 || self.camera_size.1 == 0 {
            bail!("camera_size must be non-zero in both dimensions");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpeg_quality must be within 1..=100, got {}", self.jpeg_quality);
        }
        if !(1..=100).contains(&self.snapshot_quality) {
            bail!(
                "snapshot_quality must be within 1..=100, got {}",
                self.snapshot_quality
            );
        }
        if self.scan_interval_ms == 0 {
            bail!("scan_interval_ms must be greater than zero");
        }
        if self.camera_start_timeout_ms == 0 {
            bail!("camera_start_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn camera_start_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_start_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("kiosk-settings-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = KioskSettings::load(&scratch_path("absent.json")).unwrap();
        assert_eq!(settings, KioskSettings::default());
        assert_eq!(settings.scan_interval(), Duration::from_millis(500));
        assert_eq!(settings.target_width, 500);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let path = scratch_path("partial.json");
        fs::write(
            &path,
            r#"{ "service_url": "https://school.example/api", "feedback": { "no_match_ms": 1500 } }"#,
        )
        .unwrap();

        let settings = KioskSettings::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.service_url, "https://school.example/api");
        assert_eq!(settings.feedback.no_match_ms, 1500);
        assert_eq!(settings.feedback.recognized_ms, 3000);
        assert_eq!(settings.jpeg_quality, 70);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = scratch_path("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let result = KioskSettings::load(&path);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(KioskSettings::default().validate().is_ok());

        let zero_width = KioskSettings {
            target_width: 0,
            ..KioskSettings::default()
        };
        assert!(zero_width.validate().is_err());

        let bad_quality = KioskSettings {
            jpeg_quality: 0,
            ..KioskSettings::default()
        };
        assert!(bad_quality.validate().is_err());

        let no_interval = KioskSettings {
            scan_interval_ms: 0,
            ..KioskSettings::default()
        };
        assert!(no_interval.validate().is_err());

        let no_start_timeout = KioskSettings {
            camera_start_timeout_ms: 0,
            ..KioskSettings::default()
        };
        assert!(no_start_timeout.validate().is_err());
    }
}
