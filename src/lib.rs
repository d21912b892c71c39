#![allow(clippy::doc_markdown)] // Allow technical terms like BMI, UUID in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Intake Flow
//!
//! Segmented flow engine for multi-step patient-intake questionnaires.
//!
//! ## Overview
//!
//! A questionnaire is data: a [`FlowDefinition`] naming its fields, the
//! ordered segments that group them, the skip rules between segments, the
//! per-field validation rules, the disqualification rules and any derived
//! fields. [`IntakeFlow`] drives one respondent through a definition:
//!
//! 1. answers go into a single [`fields::FieldStore`]
//! 2. derived fields (BMI) recompute when their inputs change
//! 3. `next()` validates only the active segment's fields, then checks
//!    disqualification, then lets the segment graph pick the next visible
//!    segment
//! 4. each transition is reported to abandonment telemetry without blocking
//! 5. at the end a sanitized write-once payload is assembled and submitted
//!
//! ## Module Organization
//!
//! - [`fields`] - Field values, schema and the owned store
//! - [`conditions`] - Declarative predicates shared by every rule type
//! - [`derived`] - Reactive computed fields
//! - [`segments`] - Segment graph and skip-rule navigator
//! - [`state_machine`] - Navigation states, events and guards
//! - [`validation`] - Per-segment validation gate
//! - [`eligibility`] - Disqualification rules
//! - [`telemetry`] - Abandonment telemetry, sessions and transports
//! - [`submission`] - Payload assembly and the submit-once submitter
//! - [`collaborators`] - Persistence and upload service seams
//! - [`definition`] - Flow definitions, builder and file loader
//! - [`flow`] - The flow controller
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intake_flow::conditions::Condition;
//! use intake_flow::config::IntakeConfig;
//! use intake_flow::fields::{FieldDef, FieldKind, FieldValue};
//! use intake_flow::segments::{Segment, SkipRule};
//! use intake_flow::validation::FieldRule;
//! use intake_flow::{FlowDefinition, IntakeFlow, NavigationOutcome};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = FlowDefinition::builder("longevity")
//!     .field("smoker", FieldDef::new(FieldKind::Text))
//!     .field("packs_per_day", FieldDef::new(FieldKind::Text))
//!     .field("email", FieldDef::new(FieldKind::Text))
//!     .segment(
//!         Segment::new("habits", ["smoker"])
//!             .with_skip_rule(SkipRule::skip_next(Condition::equals("smoker", "no"), 1)),
//!     )
//!     .segment(Segment::new("smoking", ["packs_per_day"]).conditional())
//!     .segment(Segment::new("contact", ["email"]))
//!     .rule("smoker", FieldRule::required())
//!     .rule("email", FieldRule::required())
//!     .build()?;
//!
//! let mut flow = IntakeFlow::from_config(Arc::new(definition), &IntakeConfig::default())?;
//! flow.start()?;
//! flow.set_field("smoker", FieldValue::text("no"))?;
//! assert_eq!(flow.next()?, NavigationOutcome::Advanced { from: 0, to: 2 });
//!
//! flow.set_field("email", FieldValue::text("pat@example.com"))?;
//! assert_eq!(flow.next()?, NavigationOutcome::ReadyToSubmit);
//! let receipt = flow.submit().await?;
//! println!("submitted {} fields", receipt.payload.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod collaborators;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod definition;
pub mod derived;
pub mod eligibility;
pub mod error;
pub mod fields;
pub mod flow;
pub mod logging;
pub mod segments;
pub mod state_machine;
pub mod submission;
pub mod telemetry;
pub mod validation;

pub use config::{ConfigManager, IntakeConfig};
pub use constants::{system, NONE_OF_THE_ABOVE};
// Telemetry event names; `events` alone would read as the state machine's
pub use constants::events as telemetry_events;
pub use definition::{FlowDefinition, FlowDefinitionBuilder, FlowDefinitionSpec};
pub use error::{IntakeError, Result};
pub use fields::{FieldKind, FieldStore, FieldValue};
pub use flow::{FlowSnapshot, IntakeFlow, NavigationOutcome, Progress};
pub use state_machine::FlowState;
pub use submission::{SubmissionPayload, SubmissionReceipt, SystemDefaults};
