//! Tests for installer CLI parsing.

use super::*;
use clap::error::ErrorKind;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["but-installer"]);
    assert_eq!(cli, Cli::default());
    assert_eq!(cli.log_filter(), log::LevelFilter::Warn);
}

#[rstest]
#[case(&["--force"])]
#[case(&["-f"])]
fn cli_parses_force(#[case] args: &[&str]) {
    let cli = Cli::parse_from(std::iter::once("but-installer").chain(args.iter().copied()));
    assert!(cli.force);
}

#[test]
fn cli_parses_uninstall_with_force_and_quiet() {
    let cli = Cli::parse_from(["but-installer", "--uninstall", "-f", "-q"]);
    assert!(cli.uninstall);
    assert!(cli.force);
    assert!(cli.quiet);
}

#[rstest]
#[case(&["-v"], 1, log::LevelFilter::Debug)]
#[case(&["-vv"], 2, log::LevelFilter::Trace)]
#[case(&["--verbose", "--verbose", "--verbose"], 3, log::LevelFilter::Trace)]
fn cli_counts_verbosity(
    #[case] args: &[&str],
    #[case] expected: u8,
    #[case] filter: log::LevelFilter,
) {
    let cli = Cli::parse_from(std::iter::once("but-installer").chain(args.iter().copied()));
    assert_eq!(cli.verbosity, expected);
    assert_eq!(cli.log_filter(), filter);
}

#[test]
fn quiet_conflicts_with_verbose() {
    let err = Cli::try_parse_from(["but-installer", "-q", "-v"]).expect_err("conflict");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
}

#[test]
fn unknown_flag_is_usage_error() {
    let err = Cli::try_parse_from(["but-installer", "--frobnicate"]).expect_err("unknown");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
#[case("--help", ErrorKind::DisplayHelp)]
#[case("-h", ErrorKind::DisplayHelp)]
#[case("--version", ErrorKind::DisplayVersion)]
fn help_and_version_exit_successfully(#[case] flag: &str, #[case] kind: ErrorKind) {
    let err = Cli::try_parse_from(["but-installer", flag]).expect_err("early exit");
    assert_eq!(err.kind(), kind);
    assert_eq!(err.exit_code(), 0);
}

#[test]
fn help_lists_environment_overrides() {
    let err = Cli::try_parse_from(["but-installer", "--help"]).expect_err("help");
    let text = err.to_string();
    assert!(text.contains("BUT_INSTALLER_BIN_DIR"));
    assert!(text.contains("--uninstall"));
}
