//! GitButler `but` installer library.
//!
//! This crate resolves the latest `but` release for the host, downloads and
//! stages the matching artefact, and installs, upgrades, or removes it. It is
//! used by the `but-installer` CLI binary and can be driven programmatically
//! for testing.
//!
//! # Modules
//!
//! - [`artefact`] - Download, staging, and archive extraction
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution with timeouts
//! - [`config`] - Installer settings and environment overrides
//! - [`error`] - Semantic error types
//! - [`install`] - Install/upgrade/uninstall state machine and swap strategies
//! - [`output`] - Quiet-aware progress and warning output
//! - [`platform`] - Host OS, architecture, and package manager detection
//! - [`probe`] - Installed version and search path probing
//! - [`release`] - Release feed parsing and artefact selection
//! - [`version`] - `major.minor.patch` parsing and ordering

pub mod artefact;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod install;
pub mod output;
pub mod platform;
pub mod probe;
pub mod release;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
