use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::recognition::{ScanResponse, ScanStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    Success,
    AlreadyMarked,
    NoMatch,
    NotEnrolled,
    NoEnrollmentData,
    ServiceError,
}

impl OutcomeKind {
    /// Recognized outcomes render as a confirmation, the rest as a warning.
    pub fn is_recognized(&self) -> bool {
        matches!(self, OutcomeKind::Success | OutcomeKind::AlreadyMarked)
    }
}

/// What the operator sees for one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub kind: OutcomeKind,
    /// Student name for recognized scans, a short status word otherwise.
    pub title: String,
    pub message: String,
    pub class_name: Option<String>,
    pub attendance_status: Option<String>,
    pub method: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanOutcome {
    /// Maps a service verdict to a displayable outcome. `pending` and unknown
    /// statuses have nothing to show.
    pub fn from_response(response: &ScanResponse, scanned_at: DateTime<Utc>) -> Option<Self> {
        let (kind, title, message) = match response.status() {
            ScanStatus::Success | ScanStatus::Exists => {
                let kind = if response.status() == ScanStatus::Success {
                    OutcomeKind::Success
                } else {
                    OutcomeKind::AlreadyMarked
                };
                let fallback = if kind == OutcomeKind::Success {
                    "Attendance recorded"
                } else {
                    "Attendance already recorded"
                };
                return Some(Self {
                    kind,
                    title: response
                        .student_name
                        .clone()
                        .unwrap_or_else(|| "Unknown student".to_string()),
                    message: response.message.clone().unwrap_or_else(|| fallback.to_string()),
                    class_name: response.class_name.clone(),
                    attendance_status: response.attendance_status.clone(),
                    method: response.method.clone(),
                    scanned_at,
                });
            }
            ScanStatus::NoMatch => (OutcomeKind::NoMatch, "Unknown", "Face not recognized".to_string()),
            ScanStatus::NotExist => (
                OutcomeKind::NotEnrolled,
                "Not Enrolled",
                "No enrolled person found".to_string(),
            ),
            ScanStatus::NoData => (
                OutcomeKind::NoEnrollmentData,
                "No Data",
                "No enrolled face data".to_string(),
            ),
            ScanStatus::Error => (
                OutcomeKind::ServiceError,
                "Error",
                response
                    .message
                    .clone()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "An error occurred".to_string()),
            ),
            ScanStatus::Pending | ScanStatus::Unknown => return None,
        };

        Some(Self {
            kind,
            title: title.to_string(),
            message,
            class_name: None,
            attendance_status: None,
            method: None,
            scanned_at,
        })
    }

    pub fn attendance_label(&self) -> Option<String> {
        self.attendance_status.as_deref().map(|status| match status {
            "present" => "Present".to_string(),
            "late" => "Late".to_string(),
            other => other.to_string(),
        })
    }

    pub fn method_label(&self) -> Option<&'static str> {
        self.method.as_deref().map(|method| match method {
            "Hybrid" => "Hybrid",
            "Distance" => "Face distance",
            _ => "SVM model",
        })
    }

    /// Single-line banner text, e.g. `Ayşe Demir (9-A) - Attendance recorded - Late - Hybrid @ 08:31:02`.
    pub fn banner(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        match &self.class_name {
            Some(class_name) => parts.push(format!("{} ({})", self.title, class_name)),
            None => parts.push(self.title.clone()),
        }
        parts.push(self.message.clone());
        if let Some(label) = self.attendance_label() {
            parts.push(label);
        }
        if let Some(label) = self.method_label() {
            parts.push(label.to_string());
        }
        format!(
            "{} @ {}",
            parts.join(" - "),
            self.scanned_at.with_timezone(&Local).format("%H:%M:%S")
        )
    }
}

/// How long each kind of outcome stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackDurations {
    pub recognized: Duration,
    pub no_match: Duration,
    pub not_enrolled: Duration,
    pub no_data: Duration,
    pub error: Duration,
}

impl Default for FeedbackDurations {
    fn default() -> Self {
        Self {
            recognized: Duration::from_millis(3000),
            no_match: Duration::from_millis(1000),
            not_enrolled: Duration::from_millis(1000),
            no_data: Duration::from_millis(2000),
            error: Duration::from_millis(3000),
        }
    }
}

impl FeedbackDurations {
    pub fn for_kind(&self, kind: OutcomeKind) -> Duration {
        match kind {
            OutcomeKind::Success | OutcomeKind::AlreadyMarked => self.recognized,
            OutcomeKind::NoMatch => self.no_match,
            OutcomeKind::NotEnrolled => self.not_enrolled,
            OutcomeKind::NoEnrollmentData => self.no_data,
            OutcomeKind::ServiceError => self.error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveFeedback {
    pub outcome: ScanOutcome,
    pub expires_at: Instant,
}

/// `Empty` or `Showing(outcome, expires_at)`.
///
/// Every `show` bumps `generation`; an expiry only clears the generation it
/// was armed for, so a late timer can never wipe a newer outcome.
#[derive(Debug, Clone, Default)]
pub struct FeedbackState {
    current: Option<ActiveFeedback>,
    generation: u64,
}

impl FeedbackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ActiveFeedback> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn show(&mut self, outcome: ScanOutcome, ttl: Duration, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.current = Some(ActiveFeedback {
            outcome,
            expires_at: now + ttl,
        });
        self.generation
    }

    /// Clears the banner if `generation` is still the one on screen.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.generation == generation && self.current.is_some() {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.current.take().is_some()
    }
}
