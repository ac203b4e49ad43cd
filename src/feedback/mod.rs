pub mod controller;
pub mod state;

pub use controller::FeedbackController;
pub use state::{ActiveFeedback, FeedbackDurations, FeedbackState, OutcomeKind, ScanOutcome};
