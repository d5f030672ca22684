//! Utilities shared by the Lounge server and client packages.

pub mod logger;
pub mod time;
