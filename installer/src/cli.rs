//! CLI argument definitions for the `but` installer.
//!
//! Kept apart from the entrypoint so parsing can be tested without running
//! an install.

use clap::Parser;

/// Install, upgrade, or uninstall the GitButler `but` CLI.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "but-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install, upgrade, or uninstall the GitButler `but` CLI.\n\n",
    "The installer detects the host architecture and package manager, reads ",
    "the GitButler release feed, and installs the best matching build: a ",
    "native .deb or .rpm package, a single binary, or an archived bundle. ",
    "Running it again when the latest release is installed does nothing.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  BUT_INSTALLER_FEED_URL       Release feed to query\n",
    "  BUT_INSTALLER_BIN_DIR        Install directory [default: /usr/local/bin]\n",
    "  BUT_INSTALLER_APP_DIR        Bundle directory [default: /opt/gitbutler]\n",
    "  BUT_INSTALLER_PACKAGE_KIND   Force binary, deb, rpm, or appimage\n",
    "  RUST_LOG                     Diagnostic log filter\n\n",
    "EXAMPLES:\n",
    "  Install or upgrade:\n",
    "    $ sudo but-installer\n\n",
    "  Uninstall without prompting:\n",
    "    $ sudo but-installer --uninstall --force",
))]
pub struct Cli {
    /// Skip the uninstall confirmation prompt.
    #[arg(short, long)]
    pub force: bool,

    /// Suppress progress output (errors and security warnings still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Remove the installed binary and application directory.
    #[arg(long)]
    pub uninstall: bool,

    /// Increase diagnostic output (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,
}

impl Cli {
    /// Default `log` filter for the requested verbosity.
    ///
    /// `RUST_LOG` takes precedence when set.
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::cli::Cli;
    ///
    /// let cli = Cli { verbosity: 2, ..Cli::default() };
    /// assert_eq!(cli.log_filter(), log::LevelFilter::Trace);
    /// ```
    #[must_use]
    pub const fn log_filter(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
