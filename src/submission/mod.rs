//! # Submission
//!
//! Builds the sanitized write-once payload and hands it to the persistence
//! API exactly once.

pub mod assembler;
pub mod payload;
pub mod submitter;

pub use assembler::{SanitizationRules, SubmissionAssembler, SystemDefaults};
pub use payload::SubmissionPayload;
pub use submitter::{SubmissionReceipt, Submitter};
