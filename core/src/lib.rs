pub mod backoff;
pub mod config;
pub mod error;
pub mod telemetry;

pub use backoff::{poll_until, Deadline, PollOutcome, PollPolicy};
pub use config::Config;
pub use error::{Error, Result};
