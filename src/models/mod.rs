//! Data models for the session manager
//!
//! This module contains the core data structures:
//! - Enums for variant selection and lifecycle state
//! - Start options, exit records and status snapshots

pub mod enums;
pub mod status;

// Re-exports for convenient access
pub use enums::{SessionState, StopReason, Variant};
pub use status::{ExitRecord, SessionHandle, SessionStatus, StartOptions, StopOutcome};
