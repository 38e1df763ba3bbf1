//! sqlgate - an HTTP gateway that runs SQL against several database engines.
//!
//! This library exposes the core modules for use in integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod server;
