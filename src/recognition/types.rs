use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ScanRequest<'a> {
    pub image: &'a str,
}

/// Verdict reported by the recognition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    Exists,
    NoMatch,
    NotExist,
    NoData,
    Error,
    /// No face was found in the frame.
    Pending,
    Unknown,
}

impl ScanStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "success" => ScanStatus::Success,
            "exists" => ScanStatus::Exists,
            "no_match" => ScanStatus::NoMatch,
            "not_exist" => ScanStatus::NotExist,
            "no_data" => ScanStatus::NoData,
            "error" => ScanStatus::Error,
            "pending" => ScanStatus::Pending,
            _ => ScanStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ScanResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub attendance_status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// `[top, right, bottom, left]` in pixels of the submitted frame.
    #[serde(default, rename = "box")]
    pub face_box: Option<[f64; 4]>,
}

impl ScanResponse {
    pub fn status(&self) -> ScanStatus {
        ScanStatus::from_wire(&self.status)
    }
}
