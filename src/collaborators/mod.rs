//! # External Collaborators
//!
//! Trait seams for the services a flow talks to but does not own, each with
//! a thin reqwest-backed implementation.

pub mod persistence;
pub mod upload;

pub use persistence::{
    CreateResponse, HttpPersistenceClient, InMemoryPersistence, PersistenceApi, PersistenceError,
};
pub use upload::{HttpUploadClient, UploadError, UploadFile, UploadService};
