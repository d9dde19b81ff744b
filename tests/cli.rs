use assert_cmd::Command;
use predicates::prelude::*;

fn karaoke() -> Command {
    Command::cargo_bin("karaoke").unwrap()
}

#[test]
fn help_lists_subcommands() {
    karaoke()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn create_requires_a_source() {
    karaoke()
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<SOURCE>"));
}

#[test]
fn lyrics_and_lyrics_file_conflict() {
    karaoke()
        .args(["create", "https://example.com/v", "--lyrics", "la la", "--lyrics-file", "song.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn rejects_unknown_output_format() {
    karaoke()
        .args(["create", "https://example.com/v", "--format", "srt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'srt'"));
}
