//! End-to-end tests for the `immosync` binary.

use assert_cmd::Command;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const LISTING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<openimmo>
  <uebertragung art="ONLINE" umfang="VOLL" version="1.2.7" sendersoftware="OOF"/>
  <anbieter>
    <anbieternr>foo-123</anbieternr>
    <immobilie>
      <objektkategorie><objektart><wohnung wohnungtyp="ETAGE"/></objektart></objektkategorie>
      <geo><plz>52078</plz><ort>Aachen</ort></geo>
      <kontaktperson><vorname>Erika</vorname><name>Muster</name><personennummer>117</personennummer></kontaktperson>
      <preise><kaufpreis>150000</kaufpreis></preise>
      <freitexte><objekttitel>Schöne Immobilie</objekttitel></freitexte>
      <anhaenge>
        <anhang gruppe="TITELBILD"><daten><pfad>Titel.jpg</pfad></daten></anhang>
        <anhang gruppe="BILD"><daten><pfad>Bad.jpg</pfad></daten></anhang>
      </anhaenge>
      <verwaltung_techn><openimmo_obid>AB123</openimmo_obid></verwaltung_techn>
    </immobilie>
  </anbieter>
</openimmo>"#;

struct Workspace {
    _dir: TempDir,
    db: PathBuf,
    project: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("site");
        fs::create_dir_all(project.join("incoming")).unwrap();
        Self {
            db: dir.path().join("immosync.db"),
            project,
            _dir: dir,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("immosync").unwrap();
        cmd.env_remove("IMMOSYNC_TEST_DB")
            .env_remove("RUST_LOG")
            .arg("--db")
            .arg(&self.db)
            .arg("--project-dir")
            .arg(&self.project);
        cmd
    }

    fn init_with_provider(&self) {
        self.cmd().arg("init").assert().success();
        self.cmd()
            .args(["provider", "add", "foo-123", "--name", "Foo Immobilien"])
            .assert()
            .success();
    }

    fn archive(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.project.join("incoming").join(name);
        write_zip(&path, entries);
        path
    }
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn commands_require_init() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["provider", "list"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn provider_add_and_list() {
    let ws = Workspace::new();
    ws.init_with_provider();
    ws.cmd()
        .args(["provider", "add", "bar-456", "--disabled"])
        .assert()
        .success();

    let assert = ws.cmd().args(["--json", "provider", "list"]).assert().success();
    let output = json(&assert.get_output().stdout);

    assert_eq!(output["count"], 2);
    assert_eq!(output["providers"][0]["external_key"], "bar-456");
    assert_eq!(output["providers"][0]["enabled"], false);
    assert_eq!(output["providers"][1]["name"], "Foo Immobilien");
    assert_eq!(output["providers"][1]["enabled"], true);
}

#[test]
fn import_moves_archive_to_backup() {
    let ws = Workspace::new();
    ws.init_with_provider();
    fs::create_dir(ws.project.join("backup")).unwrap();
    let archive = ws.archive(
        "demo.zip",
        &[("data.xml", LISTING_XML), ("Titel.jpg", "t"), ("Bad.jpg", "b")],
    );

    let assert = ws
        .cmd()
        .args(["--json", "import", "incoming", "--backup-dir", "backup"])
        .assert()
        .success();
    let output = json(&assert.get_output().stdout);

    assert_eq!(output["processed"], 1);
    assert_eq!(output["failed"], 0);
    let stats = &output["archives"][0]["stats"]["providers"]["foo-123"];
    assert_eq!(stats["created"], 1);
    assert_eq!(stats["updated"], 0);
    assert_eq!(stats["deleted"], 0);

    assert!(!archive.exists());
    assert!(ws.project.join("backup/demo.zip").exists());
    assert!(ws
        .project
        .join("files/openimmo/foo-123/AB123/Titel.jpg")
        .exists());

    // Same delivery again: nothing changes, the backup gets a suffix.
    ws.archive(
        "demo.zip",
        &[("data.xml", LISTING_XML), ("Titel.jpg", "t"), ("Bad.jpg", "b")],
    );
    let assert = ws
        .cmd()
        .args(["--json", "import", "incoming", "--backup-dir", "backup"])
        .assert()
        .success();
    let output = json(&assert.get_output().stdout);
    assert_eq!(
        output["archives"][0]["stats"]["providers"]["foo-123"]["created"],
        0
    );
    assert!(ws.project.join("backup/demo_1.zip").exists());
}

#[test]
fn imported_listing_is_assigned_to_registered_agent() {
    let ws = Workspace::new();
    ws.init_with_provider();
    ws.cmd()
        .args([
            "agent",
            "add",
            "foo-123",
            "117",
            "--firstname",
            "Erika",
            "--lastname",
            "Muster",
            "--email",
            "erika@example.com",
        ])
        .assert()
        .success();
    ws.archive("demo.zip", &[("data.xml", LISTING_XML)]);

    ws.cmd().args(["import", "incoming"]).assert().success();

    let assert = ws
        .cmd()
        .args(["--json", "agent", "list", "foo-123"])
        .assert()
        .success();
    let output = json(&assert.get_output().stdout);
    assert_eq!(output["count"], 1);
    assert_eq!(output["agents"][0]["external_id"], "117");
    assert_eq!(output["agents"][0]["email"], "erika@example.com");
    assert_eq!(output["agents"][0]["listings"], 1);
}

#[test]
fn agent_add_requires_known_provider() {
    let ws = Workspace::new();
    ws.init_with_provider();
    ws.cmd()
        .args(["agent", "add", "bar-456", "117"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn failed_archive_is_removed_and_reported() {
    let ws = Workspace::new();
    ws.init_with_provider();
    let archive = ws.archive("resources_only.zip", &[("Titel.jpg", "t")]);

    ws.cmd()
        .args(["import", "incoming"])
        .assert()
        .failure()
        .code(3);

    assert!(!archive.exists());
    assert!(!ws.project.join("files").exists());
}

#[test]
fn import_respects_max_files() {
    let ws = Workspace::new();
    ws.init_with_provider();
    ws.archive("a.zip", &[("data.xml", LISTING_XML)]);
    let second = ws.archive("b.zip", &[("data.xml", LISTING_XML)]);

    let assert = ws
        .cmd()
        .args(["--json", "import", "incoming"])
        .assert()
        .success();
    assert_eq!(json(&assert.get_output().stdout)["processed"], 1);
    assert!(second.exists());
}

#[test]
fn prune_reports_counts() {
    let ws = Workspace::new();
    ws.init_with_provider();

    let assert = ws
        .cmd()
        .args(["--json", "prune", "--retention-days", "0"])
        .assert()
        .success();
    let output = json(&assert.get_output().stdout);
    assert_eq!(output["stale"], 0);
    assert_eq!(output["pruned"], 0);
}
