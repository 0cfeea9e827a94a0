//! Release feed retrieval and artefact selection.
//!
//! - [`feed`] parses the feed into [`feed::ReleaseInfo`].
//! - [`resolver`] fetches the feed and selects one trusted
//!   [`feed::BuildArtefact`] for the host.

pub mod feed;
pub mod resolver;
