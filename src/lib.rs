//! ticketd - ticket and label template compositor
//!
//! Renders editor scene documents with per-instance attributes into JPEG
//! (and optionally PDF) output.
//! This library exposes modules for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod rendering;
pub mod server;
pub mod services;
