//! Interactive terminal front end.

pub mod command;
pub mod formatter;
mod runner;
mod ui;

pub use runner::{ClientOptions, run_client};
