//! # MedFabric Common Library
//!
//! Shared code for the MedFabric annotation services:
//! - Error taxonomy
//! - Configuration loading and root folder resolution
//! - Database schema and row models
//! - Domain events and the post-commit event bus
//! - Utility functions

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{
    AuthError, Error, EvaluationError, ImageError, ImageSetError, PatientError, ReconcileError,
    Result, SessionError,
};
