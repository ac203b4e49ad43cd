use std::path::PathBuf;

use clap::Parser;

use crate::settings::KioskSettings;

/// Attendance kiosk: streams the front camera to the recognition service and
/// reports scan results as JSON lines on stdout.
///
/// Operator commands are read from stdin, one per line: `toggle`, `start`,
/// `stop`, `retry`, `snapshot`, `status`, `close`.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON settings file; missing file means defaults
    #[arg(short, long, env = "KIOSK_CONFIG", default_value = "kiosk.json")]
    pub config: PathBuf,

    /// Recognition service base URL
    #[arg(long, env = "KIOSK_SERVICE_URL")]
    pub service_url: Option<String>,

    /// Bearer token sent with every scan request
    #[arg(long, env = "KIOSK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Camera capture device (e.g. /dev/video0)
    #[arg(long, env = "KIOSK_CAMERA")]
    pub camera: Option<String>,

    /// Camera capture resolution in pixels (width height)
    #[arg(long, env = "KIOSK_CAMERA_SIZE", value_delimiter = ' ', num_args = 2)]
    pub camera_size: Option<Vec<u32>>,

    /// Width of the frames submitted for recognition
    #[arg(long, env = "KIOSK_TARGET_WIDTH")]
    pub target_width: Option<u32>,

    /// JPEG quality of submitted frames (1-100)
    #[arg(long, env = "KIOSK_JPEG_QUALITY")]
    pub jpeg_quality: Option<u8>,

    /// Delay between scan cycles in milliseconds
    #[arg(long, env = "KIOSK_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Wait for an explicit `start` instead of scanning as soon as the camera is up
    #[arg(long)]
    pub no_auto_start: bool,
}

impl Args {
    /// Layers command-line and environment overrides on top of file settings.
    pub fn apply(&self, mut settings: KioskSettings) -> KioskSettings {
        if let Some(url) = &self.service_url {
            settings.service_url = url.clone();
        }
        if let Some(token) = &self.token {
            settings.auth_token = Some(token.clone());
        }
        if let Some(camera) = &self.camera {
            settings.camera_device = camera.clone();
        }
        if let Some([width, height]) = self.camera_size.as_deref() {
            settings.camera_size = (*width, *height);
        }
        if let Some(width) = self.target_width {
            settings.target_width = width;
        }
        if let Some(quality) = self.jpeg_quality {
            settings.jpeg_quality = quality;
        }
        if let Some(interval) = self.interval_ms {
            settings.scan_interval_ms = interval;
        }
        if self.no_auto_start {
            settings.auto_start = false;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let args = Args::parse_from([
            "attendance-kiosk",
            "--service-url",
            "https://api.example",
            "--camera-size",
            "1280",
            "720",
            "--interval-ms",
            "750",
            "--no-auto-start",
        ]);

        let settings = args.apply(KioskSettings::default());
        assert_eq!(settings.service_url, "https://api.example");
        assert_eq!(settings.camera_size, (1280, 720));
        assert_eq!(settings.scan_interval_ms, 750);
        assert!(!settings.auto_start);
        assert_eq!(settings.target_width, 500);
    }

    #[test]
    fn absent_flags_leave_settings_untouched() {
        let settings = Args::default().apply(KioskSettings::default());
        assert_eq!(settings, KioskSettings::default());
    }
}
