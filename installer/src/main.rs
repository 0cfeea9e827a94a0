//! `but` installer CLI entrypoint.
//!
//! Installs, upgrades, or uninstalls the GitButler `but` CLI system-wide.
//! All failures funnel through [`exit_code_for_run_result`], which prints
//! the error and picks the exit status.

use std::io::Write;

use but_installer::artefact::download::HttpDownloader;
use but_installer::artefact::extraction::ArchiveExtractor;
use but_installer::artefact::staging::{STAGING_REGISTRY, install_interrupt_handler};
use but_installer::cli::Cli;
use but_installer::command::SystemCommandExecutor;
use but_installer::config::InstallerConfig;
use but_installer::error::Result;
use but_installer::install::uninstall::TerminalConfirmer;
use but_installer::install::{InstallManager, Outcome};
use but_installer::output::{Reporter, write_stderr_line};
use but_installer::platform::PlatformDescriptor;
use but_installer::release::resolver::TRUSTED_ORIGIN;
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_filter())
        .parse_default_env()
        .format_timestamp(None)
        .init();
    if let Err(e) = install_interrupt_handler() {
        log::warn!("could not install interrupt handler: {e}");
    }

    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, Reporter::new(cli.quiet), &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<Outcome> {
    let config = InstallerConfig::from_env()?;
    let executor = SystemCommandExecutor::default();
    let platform = PlatformDescriptor::detect(&executor, config.package_kind);

    let manager = InstallManager {
        config: &config,
        platform: &platform,
        executor: &executor,
        downloader: &HttpDownloader,
        extractor: &ArchiveExtractor,
        staging_registry: &STAGING_REGISTRY,
        reporter: Reporter::new(cli.quiet),
    };

    if cli.uninstall {
        manager.uninstall(cli.force, &TerminalConfirmer, stderr)
    } else {
        manager.install(stderr)
    }
}

fn exit_code_for_run_result(
    result: Result<Outcome>,
    reporter: Reporter,
    stderr: &mut dyn Write,
) -> i32 {
    match result {
        Ok(outcome) => {
            reporter.info(stderr, outcome);
            0
        }
        Err(err) => {
            write_stderr_line(stderr, format_args!("error: {err}"));
            if err.is_security_relevant() {
                write_stderr_line(
                    stderr,
                    format_args!("Nothing was downloaded. Releases are only fetched from {TRUSTED_ORIGIN}."),
                );
            }
            1
        }
    }
}
