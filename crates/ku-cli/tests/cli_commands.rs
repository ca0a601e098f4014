#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STORY: &str = r#"*define
caption "Test Story"
game
*start
`Good morning.@ The train is late.\
select "Wait", *wait, "Walk", *walk
*wait
`You wait.
end
*walk
mov %0, 1
savegame 1
`You walk home.
end
"#;

/// A temp directory with the story and a trace choosing the second option.
fn test_story() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("story.txt"), STORY).unwrap();
    fs::write(
        dir.path().join("walk.json"),
        r#"[
    {"event": {"type": "pointer_press", "button": "left"}},
    {"event": {"type": "pointer_press", "button": "left"}},
    {"event": {"type": "key_down", "key": {"char": "2"}}}
]"#,
    )
    .unwrap();
    dir
}

fn kulisse() -> Command {
    Command::cargo_bin("kulisse").unwrap()
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_replays_trace() {
    let dir = test_story();
    kulisse()
        .args(["run", "story.txt", "--input", "walk.json"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Good morning."))
        .stdout(predicate::str::contains("The train is late."))
        .stdout(predicate::str::contains("[2] Walk"))
        .stdout(predicate::str::contains("You walk home."))
        .stdout(predicate::str::contains("You wait.").not());
}

#[test]
fn run_writes_saves_to_directory() {
    let dir = test_story();
    kulisse()
        .args(["run", "story.txt", "--input", "walk.json", "--saves", "saves"])
        .current_dir(dir.path())
        .assert()
        .success();
    assert!(dir.path().join("saves/save1.dat").is_file());
    assert!(dir.path().join("saves/gsave.dat").is_file());
}

#[test]
fn run_stops_when_trace_ends() {
    let dir = test_story();
    fs::write(dir.path().join("empty.json"), "[]").unwrap();
    kulisse()
        .args(["run", "story.txt", "--input", "empty.json"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Good morning."))
        .stdout(predicate::str::contains("The train is late.").not());
}

#[test]
fn run_reads_stdin() {
    let dir = test_story();
    kulisse()
        .args(["run", "story.txt"])
        .current_dir(dir.path())
        .write_stdin("\n\n1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("You wait."));
}

#[test]
fn run_rejects_bad_trace() {
    let dir = test_story();
    fs::write(dir.path().join("bad.json"), "{").unwrap();
    kulisse()
        .args(["run", "story.txt", "--input", "bad.json"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid trace"));
}

#[test]
fn run_missing_script() {
    kulisse()
        .args(["run", "nowhere.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn run_fatal_error_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.txt"), "*start\ngoto *gone\n").unwrap();
    kulisse()
        .args(["run", "broken.txt", "--saves", "saves"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: fatal: label *gone does not exist"));
    assert!(dir.path().join("saves/emergency.dat").is_file());
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_clean_script() {
    let dir = test_story();
    kulisse()
        .args(["check", "story.txt"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All checks passed"))
        .stdout(predicate::str::contains("4 labels"));
}

#[test]
fn check_reports_unknown_command_and_label() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bad.txt"),
        "*start\nclik\ngoto *nowhere\n",
    )
    .unwrap();
    kulisse()
        .args(["check", "bad.txt"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command: clik"))
        .stderr(predicate::str::contains("label *nowhere does not exist"))
        .stderr(predicate::str::contains("2 errors"));
}

#[test]
fn check_warnings_still_pass() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("warn.txt"), "mov %0, 1\n*start\nend\n").unwrap();
    kulisse()
        .args(["check", "warn.txt"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("1 warning"));
}

// ---------------------------------------------------------------------------
// labels
// ---------------------------------------------------------------------------

#[test]
fn labels_table() {
    let dir = test_story();
    kulisse()
        .args(["labels", "story.txt"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("*define"))
        .stdout(predicate::str::contains("*walk"))
        .stdout(predicate::str::contains("4 labels, entry *define"));
}

#[test]
fn labels_need_a_label() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("none.txt"), "; nothing here\n").unwrap();
    kulisse()
        .args(["labels", "none.txt"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("defines no labels"));
}

// ---------------------------------------------------------------------------
// slots
// ---------------------------------------------------------------------------

#[test]
fn slots_lists_saved_games() {
    let dir = test_story();
    kulisse()
        .args(["run", "story.txt", "--input", "walk.json", "--saves", "saves"])
        .current_dir(dir.path())
        .assert()
        .success();
    kulisse()
        .args(["slots", "--saves", "saves"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("*walk"))
        .stdout(predicate::str::contains("1 occupied slots"));
}

#[test]
fn slots_empty_directory() {
    let dir = TempDir::new().unwrap();
    kulisse()
        .args(["slots", "--saves"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved games"));
}

#[test]
fn slots_missing_directory() {
    kulisse()
        .args(["slots", "--saves", "/definitely/not/here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

// ---------------------------------------------------------------------------
// misc
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    kulisse()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("slots"));
}
