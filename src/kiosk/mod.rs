pub mod commands;
pub mod controller;

pub use commands::{dispatch, run_operator_loop, OperatorCommand};
pub use controller::Kiosk;
