use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::overlay::DetectionBox;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScannerStatus {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerState {
    pub status: ScannerStatus,
    /// Operator toggle.
    pub enabled: bool,
    /// Camera is streaming.
    pub stream_live: bool,
    /// Completed round trips, successful or not.
    pub cycles: u64,
    pub skipped_frames: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub detection: Option<DetectionBox>,
}

impl ScannerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanning runs only while the stream is live and the operator wants it.
    pub fn should_run(&self) -> bool {
        self.enabled && self.stream_live
    }

    pub fn is_running(&self) -> bool {
        self.status == ScannerStatus::Running
    }

    pub fn record_cycle(&mut self, at: DateTime<Utc>) {
        self.cycles = self.cycles.saturating_add(1);
        self.last_cycle_at = Some(at);
    }

    /// Stores the new box; returns whether the overlay changed.
    pub fn replace_detection(&mut self, detection: Option<DetectionBox>) -> bool {
        if self.detection == detection {
            return false;
        }
        self.detection = detection;
        true
    }
}
