pub mod client;
pub mod types;

pub use client::{HttpRecognitionClient, RecognitionClient, ScanFuture};
pub use types::{ScanRequest, ScanResponse, ScanStatus};
