//! Behaviour-driven tests for uninstalling `but`.

#![cfg(unix)]

mod support;

use std::cell::RefCell;

use but_installer::error::InstallerError;
use but_installer::install::Outcome;
use but_installer::install::uninstall::{Confirmer, read_answer};
use but_installer::platform::PackageKind;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::Sandbox;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

/// Answers every prompt with a fixed line of input.
#[derive(Default)]
struct ScriptedConfirmer {
    answer: String,
    prompts: RefCell<Vec<String>>,
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_owned());
        read_answer(&mut self.answer.as_bytes())
    }
}

struct UninstallWorld {
    sandbox: Sandbox,
    confirmer: ScriptedConfirmer,
    result: Option<Result<Outcome, InstallerError>>,
}

impl UninstallWorld {
    fn outcome(&self) -> &Outcome {
        match self.result.as_ref().expect("uninstall has not run") {
            Ok(outcome) => outcome,
            Err(err) => panic!("uninstall failed: {err}"),
        }
    }

    fn run(&mut self, force: bool) {
        let mut stderr = Vec::new();
        self.result = Some(
            self.sandbox
                .manager()
                .uninstall(force, &self.confirmer, &mut stderr),
        );
    }
}

#[fixture]
fn world() -> UninstallWorld {
    UninstallWorld {
        sandbox: Sandbox::new(PackageKind::NativeBinary, "x86_64"),
        confirmer: ScriptedConfirmer::default(),
        result: None,
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("no but is installed")]
fn given_nothing_installed(world: &mut UninstallWorld) {
    assert!(!world.sandbox.target().exists());
}

#[given("but \"{version}\" is installed")]
fn given_installed(world: &mut UninstallWorld, version: String) {
    world.sandbox.install_binary(&version);
}

#[given("an application directory exists")]
fn given_app_dir(world: &mut UninstallWorld) {
    let bundle = world.sandbox.app_dir().join("GitButler.AppImage");
    std::fs::create_dir_all(world.sandbox.app_dir()).expect("create app dir");
    std::fs::write(bundle, "bundle").expect("write bundle");
}

#[given("the user answers \"{answer}\"")]
fn given_answer(world: &mut UninstallWorld, answer: String) {
    world.confirmer.answer = format!("{answer}\n");
}

#[when("uninstall runs with force")]
fn when_forced(world: &mut UninstallWorld) {
    world.run(true);
}

#[when("uninstall runs")]
fn when_confirmed(world: &mut UninstallWorld) {
    world.run(false);
}

#[then("nothing was uninstalled")]
fn then_nothing(world: &mut UninstallWorld) {
    assert_eq!(world.outcome(), &Outcome::NothingToUninstall);
}

#[then("the binary and application directory are removed")]
fn then_both_removed(world: &mut UninstallWorld) {
    let expected = Outcome::Uninstalled {
        removed: vec![
            world.sandbox.target(),
            world.sandbox.app_dir().to_path_buf(),
        ],
    };
    assert_eq!(world.outcome(), &expected);
    assert!(!world.sandbox.target().exists());
    assert!(!world.sandbox.app_dir().exists());
}

#[then("no confirmation was requested")]
fn then_not_prompted(world: &mut UninstallWorld) {
    assert!(world.confirmer.prompts.borrow().is_empty());
}

#[then("the uninstall is cancelled")]
fn then_cancelled(world: &mut UninstallWorld) {
    assert_eq!(world.outcome(), &Outcome::Cancelled);
    let prompts = world.confirmer.prompts.borrow();
    assert_eq!(prompts.len(), 1);
    assert!(prompts.iter().all(|prompt| prompt.contains("Remove")));
}

#[then("the binary is still present")]
fn then_still_present(world: &mut UninstallWorld) {
    assert!(world.sandbox.target().exists());
}

#[then("the binary is removed")]
fn then_removed(world: &mut UninstallWorld) {
    assert!(
        matches!(world.outcome(), Outcome::Uninstalled { .. }),
        "got {:?}",
        world.outcome()
    );
    assert!(world.sandbox.target().symlink_metadata().is_err());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/uninstall.feature", name = "Nothing to uninstall")]
fn scenario_nothing_to_uninstall(world: UninstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/uninstall.feature",
    name = "Forced uninstall removes without asking"
)]
fn scenario_forced_uninstall(world: UninstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/uninstall.feature",
    name = "Declined confirmation keeps the install"
)]
fn scenario_declined(world: UninstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/uninstall.feature",
    name = "Accepted confirmation removes the binary"
)]
fn scenario_accepted(world: UninstallWorld) {
    let _ = world;
}
