//! Email-verified intake for intern, developer, and cloud developer applications.
//!
//! Submissions are staged in memory until the applicant confirms control of their
//! email address with a one-time code; only then are they promoted to durable storage.

pub mod config;
pub mod error;
pub mod intake;
pub mod telemetry;
