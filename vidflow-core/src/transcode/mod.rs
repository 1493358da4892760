//! External encoder invocation.

pub mod engine;

pub use engine::{TranscodeEngine, TranscodeError, build_encoder_command};
