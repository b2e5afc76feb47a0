//! Push against a SQLite database file
#![cfg(feature = "rusqlite")]

use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const USERS: &str = r#"{
    "tables": [{ "name": "users" }],
    "columns": [
        { "table": "users", "name": "id", "type": "integer", "notNull": true },
        { "table": "users", "name": "name", "type": "text" }
    ],
    "pks": [{ "table": "users", "columns": ["id"] }]
}"#;

const USERS_WITHOUT_NAME: &str = r#"{
    "tables": [{ "name": "users" }],
    "columns": [
        { "table": "users", "name": "id", "type": "integer", "notNull": true }
    ],
    "pks": [{ "table": "users", "columns": ["id"] }]
}"#;

fn driftless(dir: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("driftless"));
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn project(schema: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("driftless.toml"),
        r#"
dialect = "sqlite"
schema = "schema/*.json"

[dbCredentials]
url = "./dev.db"
"#,
    )
    .unwrap();
    fs::create_dir_all(temp.path().join("schema")).unwrap();
    write_schema(temp.path(), schema);
    temp
}

fn write_schema(dir: &Path, schema: &str) {
    fs::write(dir.join("schema").join("users.json"), schema).unwrap();
}

fn user_columns(db: &Path) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('users') ORDER BY cid")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn push_creates_tables() {
    let temp = project(USERS);

    driftless(temp.path())
        .arg("push")
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 statement(s)."));

    assert_eq!(user_columns(&temp.path().join("dev.db")), vec!["id", "name"]);
}

#[test]
fn second_push_has_nothing_to_do() {
    let temp = project(USERS);
    driftless(temp.path()).arg("push").assert().success();

    driftless(temp.path())
        .arg("push")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to push."));
}

#[test]
fn explain_leaves_database_untouched() {
    let temp = project(USERS);

    driftless(temp.path())
        .args(["push", "--explain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE `users`"));

    assert!(user_columns(&temp.path().join("dev.db")).is_empty());
}

#[test]
fn data_loss_needs_force() {
    let temp = project(USERS);
    driftless(temp.path()).arg("push").assert().success();
    Connection::open(temp.path().join("dev.db"))
        .unwrap()
        .execute("INSERT INTO users (id, name) VALUES (1, 'ada')", [])
        .unwrap();

    write_schema(temp.path(), USERS_WITHOUT_NAME);
    driftless(temp.path())
        .arg("push")
        .assert()
        .code(130)
        .stderr(predicate::str::contains("--force"));
    assert_eq!(user_columns(&temp.path().join("dev.db")), vec!["id", "name"]);

    driftless(temp.path())
        .args(["push", "--force"])
        .assert()
        .success();
    assert_eq!(user_columns(&temp.path().join("dev.db")), vec!["id"]);
}
