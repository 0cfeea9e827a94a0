//! Artefact download, staging, and unpacking.
//!
//! # Sub-modules
//!
//! - [`download`] - Feed and artefact download trait and HTTP implementation.
//! - [`extraction`] - Archive extraction with path traversal protection.
//! - [`fetcher`] - Download-and-stage pipeline producing a payload path.
//! - [`staging`] - Temporary staging directories and interrupt cleanup.

pub mod download;
pub mod extraction;
pub mod fetcher;
pub mod staging;
