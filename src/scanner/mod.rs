pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::ScanController;
pub use state::{ScannerState, ScannerStatus};
