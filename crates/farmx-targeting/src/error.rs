//! Error types for the targeting library.
//!
//! Every failure in this crate is a caller bug: malformed geometry, wind or
//! calibration input. Nothing here is transient.

#![warn(missing_docs)]

use core::fmt;

/// Errors that can occur while mapping detections to spray targets.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetingError {
    /// Malformed geometry, wind or calibration input.
    /// The message names the offending value.
    InvalidInput(&'static str),
}

impl fmt::Display for TargetingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetingError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl core::error::Error for TargetingError {}
