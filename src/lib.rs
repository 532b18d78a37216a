// Public library re-exports for integration tests and external use.
pub mod cancel;
pub mod catalog;
pub mod checkers;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod findings;
pub mod orphans;
pub mod progress;
pub mod skip;
pub mod types;
pub mod utils;
pub mod verify;

pub use error::{Result, VerifyError};
pub use verify::{RunPhase, Verifier, verify};

// Keep main.rs thin and have it call into the library functions.
