//! REST API for the analysis dispatcher.

pub mod server;
