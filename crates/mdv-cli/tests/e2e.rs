//! End-to-end tests for the mdv CLI.
//!
//! Tests invoke the `mdv` binary as a subprocess inside a temporary vault.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::SystemTime;

use tempfile::TempDir;

const SCHEMA: &str = r#"version: 2
types:
  person:
    default_path: people/
    name_field: name
    fields:
      name: { type: string, required: true }
      email: { type: string }
  event:
    default_path: events/
    fields:
      title: { type: string }
      owner: { type: ref, target: person }
traits: {}
"#;

const ALICE: &str = "---\ntype: person\nname: Alice Smith\nemail: alice@example.com\n---\n";
const KICKOFF: &str = "---\ntype: event\ntitle: Kickoff\nowner: \"[[people/alice]]\"\n---\n";

fn mdv_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mdv"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn vault(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn base_vault(extra: &[(&str, &str)]) -> TempDir {
    let mut files = vec![
        ("schema.yaml", SCHEMA),
        ("people/alice.md", ALICE),
        ("events/kickoff.md", KICKOFF),
    ];
    files.extend_from_slice(extra);
    vault(&files)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn read(dir: &TempDir, path: &str) -> String {
    fs::read_to_string(dir.path().join(path)).unwrap()
}

/// Every file under `dir` with its modification time.
fn mtimes(dir: &Path) -> BTreeMap<PathBuf, SystemTime> {
    let mut out = BTreeMap::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(mtimes(&path));
        } else {
            out.insert(path.clone(), fs::metadata(&path).unwrap().modified().unwrap());
        }
    }
    out
}

// === init ===

#[test]
fn e2e_init_creates_vault_structure() {
    let dir = TempDir::new().unwrap();
    let output = mdv_in(dir.path(), &["init", "."]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Initialized mdv vault"));

    assert!(dir.path().join("schema.yaml").exists());
    assert!(dir.path().join("mdv.yaml").exists());
    assert!(dir.path().join(".mdv").join("index").is_dir());

    let check = mdv_in(dir.path(), &["check"]);
    assert!(stdout(&check).contains("Checked 0 files"));
}

// === check ===

#[test]
fn e2e_check_clean_vault_passes() {
    let dir = base_vault(&[]);
    let output = mdv_in(dir.path(), &["check"]);
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("Checked 2 files: 0 error(s), 0 warning(s)"));
}

#[test]
fn e2e_check_missing_required_field_fails() {
    let dir = base_vault(&[("people/bob.md", "---\ntype: person\n---\n")]);
    let output = mdv_in(dir.path(), &["check"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("ERROR people/bob.md:1 Required field 'name' is missing"));

    fs::write(dir.path().join("people/bob.md"), "---\ntype: person\nname: Bob\n---\n").unwrap();
    assert!(mdv_in(dir.path(), &["check"]).status.success());
}

#[test]
fn e2e_check_strict_fails_on_warnings() {
    let dir = base_vault(&[("notes.md", "Ask [[alice]] about it.\n")]);

    let lenient = mdv_in(dir.path(), &["check"]);
    assert!(lenient.status.success());
    assert!(stdout(&lenient).contains("WARN  notes.md:1 Short reference [[alice]]"));

    let strict = mdv_in(dir.path(), &["check", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));
}

#[test]
fn e2e_check_json_report() {
    let dir = base_vault(&[
        ("people/bob.md", "---\ntype: person\n---\n"),
        ("people/cy.md", "---\ntype: person\n---\n"),
    ]);
    let output = mdv_in(dir.path(), &["check", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let report = json(&output);
    assert_eq!(report["file_count"], 4);
    assert_eq!(report["error_count"], 2);
    assert_eq!(report["issues"][0]["kind"], "missing_required_field");
    assert_eq!(report["summary"][0]["issue_type"], "missing_required_field");
    assert_eq!(report["summary"][0]["count"], 2);
}

#[test]
fn e2e_check_by_file_groups_issues() {
    let dir = base_vault(&[("people/bob.md", "---\ntype: person\n---\n")]);
    let output = mdv_in(dir.path(), &["check", "--by-file"]);
    let text = stdout(&output);
    let header = text.lines().position(|l| l == "people/bob.md").unwrap();
    assert!(text.lines().nth(header + 1).unwrap().contains("Required field 'name'"));
}

#[test]
fn e2e_check_fix_previews_then_applies() {
    let dir = base_vault(&[("notes.md", "Ask [[alice]] about it.\n")]);

    let preview = mdv_in(dir.path(), &["check", "--fix"]);
    assert!(preview.status.success());
    assert!(stdout(&preview).contains("Replace [[alice]] with [[people/alice]]"));
    assert_eq!(read(&dir, "notes.md"), "Ask [[alice]] about it.\n");

    let applied = mdv_in(dir.path(), &["check", "--fix", "--confirm"]);
    assert!(applied.status.success());
    assert_eq!(read(&dir, "notes.md"), "Ask [[people/alice]] about it.\n");

    let again = mdv_in(dir.path(), &["check", "--fix"]);
    assert!(stdout(&again).contains("No fixable issues"));
    assert!(mdv_in(dir.path(), &["check", "--strict"]).status.success());
}

#[test]
fn e2e_previews_leave_files_and_timestamps_alone() {
    let dir = base_vault(&[
        ("notes.md", "Ask [[alice]] about [[people/carol]].\n"),
        ("events/sync.md", "---\ntype: event\nowner: \"[[people/carol]]\"\n---\n"),
    ]);
    let before = mtimes(dir.path());

    for args in [
        &["check", "--fix"][..],
        &["check", "--create-missing"],
        &["schema", "rename", "type", "event", "meeting"],
        &["schema", "rename", "type", "event", "meeting", "--rename-default-path"],
        &["schema", "rename", "field", "person", "email", "email_address"],
    ] {
        let output = mdv_in(dir.path(), args);
        assert!(output.status.success(), "{args:?}: {}", stdout(&output));
        assert_eq!(mtimes(dir.path()), before, "{args:?} touched the vault");
    }
}

#[test]
fn e2e_check_create_missing_only_creates_certain_pages() {
    let dir = base_vault(&[
        ("events/sync.md", "---\ntype: event\nowner: \"[[people/carol]]\"\n---\n"),
        ("notes.md", "See [[somewhere/else]].\n"),
    ]);

    let preview = mdv_in(dir.path(), &["check", "--create-missing"]);
    let text = stdout(&preview);
    assert!(text.contains("people/carol.md (person) for [[people/carol]]"));
    assert!(text.contains("[[somewhere/else]] (unknown)"));
    assert!(!dir.path().join("people/carol.md").exists());

    let applied = mdv_in(dir.path(), &["check", "--create-missing", "--confirm"]);
    assert!(stdout(&applied).contains("Created 1 page(s)"));
    let stub = read(&dir, "people/carol.md");
    assert!(stub.starts_with("---\ntype: person\nname: carol\n"));
    assert!(!dir.path().join("somewhere/else.md").exists());
}

// === reindex ===

#[test]
fn e2e_reindex_then_stale_warning() {
    let dir = base_vault(&[]);
    let output = mdv_in(dir.path(), &["reindex"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("from 2 files"));
    assert!(dir.path().join(".mdv/index/mdv.db").exists());

    assert!(mdv_in(dir.path(), &["check", "--strict"]).status.success());

    fs::write(dir.path().join("people/alice.md"), ALICE.replace("alice@", "a@")).unwrap();
    let stale = mdv_in(dir.path(), &["check"]);
    assert!(stale.status.success());
    assert!(stdout(&stale).contains("Index is stale: 1 modified"));

    mdv_in(dir.path(), &["reindex"]);
    assert!(mdv_in(dir.path(), &["check", "--strict"]).status.success());
}

// === schema rename ===

#[test]
fn e2e_rename_type_preview_changes_nothing() {
    let dir = base_vault(&[]);
    let output = mdv_in(dir.path(), &["schema", "rename", "type", "event", "meeting", "--json"]);
    assert!(output.status.success());

    let plan = json(&output);
    assert_eq!(plan["preview"], true);
    assert_eq!(plan["default_path_rename_available"], true);
    assert_eq!(plan["default_path_old"], "events/");
    assert_eq!(plan["default_path_new"], "meetings/");
    assert!(plan["changes"].as_array().unwrap().len() >= 2);

    assert_eq!(read(&dir, "schema.yaml"), SCHEMA);
    assert_eq!(read(&dir, "events/kickoff.md"), KICKOFF);
}

#[test]
fn e2e_rename_type_with_default_path_moves_files() {
    let dir = base_vault(&[("notes.md", "Agenda for [[events/kickoff]].\n")]);
    let output = mdv_in(
        dir.path(),
        &["schema", "rename", "type", "event", "meeting", "--rename-default-path", "--confirm"],
    );
    assert!(output.status.success(), "{}", stdout(&output));

    assert!(!dir.path().join("events/kickoff.md").exists());
    assert!(read(&dir, "meetings/kickoff.md").contains("type: meeting"));
    assert_eq!(read(&dir, "notes.md"), "Agenda for [[meetings/kickoff]].\n");
    assert!(read(&dir, "schema.yaml").contains("default_path: meetings/"));

    assert!(mdv_in(dir.path(), &["check", "--strict"]).status.success());
}

#[test]
fn e2e_rename_field_applies_to_one_type() {
    let dir = base_vault(&[]);
    let output = mdv_in(
        dir.path(),
        &["schema", "rename", "field", "person", "email", "email_address", "--confirm"],
    );
    assert!(output.status.success());
    assert!(read(&dir, "people/alice.md").contains("email_address: alice@example.com"));
    assert!(mdv_in(dir.path(), &["check", "--strict"]).status.success());
}

#[test]
fn e2e_rename_field_conflict_blocks_everything() {
    let dana = "---\ntype: person\nname: Dana\nemail: d@example.com\nmail: old@example.com\n---\n";
    let dir = base_vault(&[("people/dana.md", dana)]);
    let output = mdv_in(
        dir.path(),
        &["schema", "rename", "field", "person", "email", "mail", "--confirm"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("CONFLICT people/dana.md:5"));

    assert_eq!(read(&dir, "people/dana.md"), dana);
    assert_eq!(read(&dir, "people/alice.md"), ALICE);
    assert_eq!(read(&dir, "schema.yaml"), SCHEMA);
}

#[test]
fn e2e_rename_unknown_type_is_an_error() {
    let dir = base_vault(&[]);
    let output = mdv_in(dir.path(), &["schema", "rename", "type", "gig", "meeting"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown type 'gig'"));
}

// === completions ===

#[test]
fn e2e_completions_for_bash() {
    let dir = TempDir::new().unwrap();
    let output = mdv_in(dir.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("mdv"));
}
