use std::io::Write;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{camera::DeviceState, feedback::ScanOutcome, overlay::DetectionBox};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// Everything the kiosk display needs to redraw, one event per change.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum KioskEvent {
    CameraStateChanged {
        state: DeviceState,
    },
    ScanningChanged {
        enabled: bool,
        running: bool,
    },
    DetectionBoxChanged {
        detection: Option<DetectionBox>,
    },
    FeedbackChanged {
        outcome: Option<ScanOutcome>,
        banner: String,
    },
    SnapshotCaptured {
        width: u32,
        height: u32,
        image: String,
    },
    Closed,
}

impl KioskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            KioskEvent::CameraStateChanged { .. } => "camera-state-changed",
            KioskEvent::ScanningChanged { .. } => "scanning-changed",
            KioskEvent::DetectionBoxChanged { .. } => "detection-box-changed",
            KioskEvent::FeedbackChanged { .. } => "feedback-changed",
            KioskEvent::SnapshotCaptured { .. } => "snapshot-captured",
            KioskEvent::Closed => "closed",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: KioskEvent);
}

impl EventSink for mpsc::UnboundedSender<KioskEvent> {
    fn emit(&self, event: KioskEvent) {
        let _ = self.send(event);
    }
}

/// Writes each event as one JSON line on stdout for the display process.
pub struct JsonLinesSink;

impl EventSink for JsonLinesSink {
    fn emit(&self, event: KioskEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(err) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
                    log_warn!("failed to write {} event: {err}", event.name());
                }
            }
            Err(err) => log_error!("failed to serialize {} event: {err}", event.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged_camel_case() {
        let value = serde_json::to_value(KioskEvent::DetectionBoxChanged {
            detection: Some(DetectionBox {
                top_pct: 10.0,
                left_pct: 20.0,
                width_pct: 30.0,
                height_pct: 40.0,
            }),
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "event": "detectionBoxChanged",
                "detection": { "topPct": 10.0, "leftPct": 20.0, "widthPct": 30.0, "heightPct": 40.0 }
            })
        );
    }

    #[test]
    fn json_lines_sink_writes_every_event() {
        let sink: &dyn EventSink = &JsonLinesSink;
        sink.emit(KioskEvent::ScanningChanged {
            enabled: true,
            running: false,
        });
        sink.emit(KioskEvent::Closed);
    }

    #[test]
    fn initial_camera_state_is_idle() {
        let value = serde_json::to_value(KioskEvent::CameraStateChanged {
            state: DeviceState::default(),
        })
        .unwrap();
        assert_eq!(value["state"]["status"], "idle");
    }

    #[test]
    fn denied_camera_state_carries_reason() {
        let value = serde_json::to_value(KioskEvent::CameraStateChanged {
            state: DeviceState::Denied {
                reason: "No camera found at /dev/video0.".into(),
            },
        })
        .unwrap();

        assert_eq!(value["event"], "cameraStateChanged");
        assert_eq!(value["state"]["status"], "denied");
        assert_eq!(value["state"]["reason"], "No camera found at /dev/video0.");
    }
}
