// Public API for integration tests and the binary

pub mod config;
pub mod console;
pub mod identity;
pub mod peer;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod types;
pub mod words;
