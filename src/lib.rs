// Public API for integration tests and potential library usage

pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod protocol;
pub mod session;
pub mod types;
pub mod ws;
