//! Lounge chat client.
//!
//! A [`transport::Transport`] carries the wire events to a live server, or to
//! a [`simulation::LocalSimulation`] when no server answers. The
//! [`session::ChatSession`] façade keeps the observable chat view on top of it.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod identity;
pub mod session;
pub mod simulation;
pub mod transport;
