//! SQLite reconciliation tests
//!
//! SQLite cannot alter columns or constraints in place, so most changes here
//! either go through a shadow column or rebuild the table. Plans are applied
//! to an in-memory database to check that rows survive.

use driftless_migrations::{
    ApplyOptions, DataProbe, Ddl, Dialect, HintKind, InterimSnapshot, MigrationPlan, NoRenames,
    StatementExecutor, apply, export, generate,
};
use rusqlite::Connection;

// =============================================================================
// Helper Functions
// =============================================================================

struct Db<'a>(&'a Connection);

impl StatementExecutor for Db<'_> {
    fn execute(&mut self, sql: &str) -> Result<(), String> {
        self.0.execute_batch(sql).map_err(|e| e.to_string())
    }
}

impl DataProbe for Db<'_> {
    fn row_count(&self, _schema: &str, table: &str) -> Option<u64> {
        self.0
            .query_row(&format!("SELECT count(*) FROM `{table}`"), [], |row| {
                row.get::<_, i64>(0)
            })
            .ok()
            .map(|n| n as u64)
    }
}

fn model(json: &str) -> Ddl {
    let snapshot = InterimSnapshot::from_json(json).expect("valid snapshot json");
    Ddl::try_from_interim(&snapshot, Dialect::SQLite).expect("valid model")
}

fn plan(from: &Ddl, to: &Ddl) -> MigrationPlan {
    generate(from, to, &mut NoRenames, None).expect("plan")
}

fn types(plan: &MigrationPlan) -> Vec<&'static str> {
    plan.operations.iter().map(|op| op.type_name()).collect()
}

/// A database holding `ddl`
fn database(ddl: &Ddl) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    apply(&export(ddl), &mut Db(&conn), ApplyOptions::default()).expect("create schema");
    conn
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM `{table}`"), [], |row| row.get(0))
        .unwrap()
}

fn items(qty_type: &str, extra: &str) -> Ddl {
    model(&format!(
        r#"{{
            "tables": [{{ "name": "items" }}],
            "columns": [
                {{ "table": "items", "name": "id", "type": "integer", "notNull": true }},
                {{ "table": "items", "name": "qty", "type": "{qty_type}" }},
                {{ "table": "items", "name": "note", "type": "text" }}
            ],
            "pks": [{{ "table": "items", "columns": ["id"] }}]
            {extra}
        }}"#
    ))
}

fn seed(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO items (id, qty, note) VALUES (1, '5', 'sentinel-a');
         INSERT INTO items (id, qty, note) VALUES (2, '12', 'sentinel-b');
         INSERT INTO items (id, qty, note) VALUES (3, NULL, 'sentinel-c');",
    )
    .unwrap();
}

// =============================================================================
// Shadow columns
// =============================================================================

#[test]
fn test_type_change_uses_shadow_column() {
    let from = items("text", "");
    let to = items("integer", "");

    let plan = plan(&from, &to);
    assert_eq!(
        types(&plan),
        vec!["rename_column", "add_column", "copy_column_data", "drop_column"]
    );
    assert_eq!(
        plan.sql(),
        vec![
            "ALTER TABLE `items` RENAME COLUMN `qty` TO `__qty_old`;",
            "ALTER TABLE `items` ADD `qty` INTEGER;",
            "UPDATE `items` SET `qty` = CAST(`__qty_old` AS INTEGER);",
            "ALTER TABLE `items` DROP COLUMN `__qty_old`;",
        ]
    );
}

#[test]
fn test_shadow_column_preserves_rows() {
    let from = items("text", "");
    let to = items("integer", "");
    let conn = database(&from);
    seed(&conn);

    let report = apply(&plan(&from, &to), &mut Db(&conn), ApplyOptions::default()).unwrap();
    assert_eq!(report.applied.len(), 4);
    assert_eq!(count(&conn, "items"), 3, "no rows lost");

    let rows: Vec<(i64, Option<i64>, String)> = conn
        .prepare("SELECT id, qty, note FROM items ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, Some(5), "sentinel-a".to_string()),
            (2, Some(12), "sentinel-b".to_string()),
            (3, None, "sentinel-c".to_string()),
        ]
    );

    let kind: String = conn
        .query_row("SELECT typeof(qty) FROM items WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kind, "integer");
}

// =============================================================================
// Table recreation
// =============================================================================

#[test]
fn test_check_constraint_rebuilds_table() {
    let from = items("integer", "");
    let to = items(
        "integer",
        r#", "checks": [{ "table": "items", "name": "qty_positive", "value": "qty > 0" }]"#,
    );

    let plan = plan(&from, &to);
    assert_eq!(types(&plan), vec!["recreate_table"]);

    let sql = plan.sql();
    assert_eq!(sql.first().map(String::as_str), Some("PRAGMA foreign_keys=OFF;"));
    assert!(sql[1].starts_with("CREATE TABLE `__new_items`"));
    assert!(sql[1].contains("CONSTRAINT `qty_positive` CHECK(qty > 0)"));
    assert_eq!(
        sql[2],
        "INSERT INTO `__new_items`(`id`, `qty`, `note`) SELECT `id`, `qty`, `note` FROM `items`;"
    );
    assert_eq!(sql.last().map(String::as_str), Some("PRAGMA foreign_keys=ON;"));
}

#[test]
fn test_rebuild_preserves_rows() {
    let from = items("integer", "");
    let to = items(
        "integer",
        r#", "checks": [{ "table": "items", "name": "qty_positive", "value": "qty > 0" }]"#,
    );
    let conn = database(&from);
    seed(&conn);

    apply(&plan(&from, &to), &mut Db(&conn), ApplyOptions::default()).unwrap();
    assert_eq!(count(&conn, "items"), 3);
    let note: String = conn
        .query_row("SELECT note FROM items WHERE id = 2", [], |row| row.get(0))
        .unwrap();
    assert_eq!(note, "sentinel-b");

    let violation = conn.execute("INSERT INTO items (id, qty) VALUES (9, 0)", []);
    assert!(violation.is_err(), "check is enforced after the rebuild");
}

#[test]
fn test_not_null_column_without_default_rebuilds() {
    let from = items("integer", "");
    let to = model(
        r#"{
            "tables": [{ "name": "items" }],
            "columns": [
                { "table": "items", "name": "id", "type": "integer", "notNull": true },
                { "table": "items", "name": "qty", "type": "integer" },
                { "table": "items", "name": "note", "type": "text" },
                { "table": "items", "name": "sku", "type": "text", "notNull": true }
            ],
            "pks": [{ "table": "items", "columns": ["id"] }]
        }"#,
    );

    let plan = plan(&from, &to);
    assert_eq!(types(&plan), vec!["recreate_table"]);
    assert!(
        plan.hints
            .iter()
            .any(|h| h.kind == HintKind::MayFailOnExistingRows),
        "unknown row counts are assumed non-empty"
    );

    // an empty table cannot fail the rebuild
    let conn = database(&from);
    let probed = generate(&from, &to, &mut NoRenames, Some(&Db(&conn))).unwrap();
    assert!(probed.hints.is_empty(), "unexpected hints: {:?}", probed.hints);
    apply(&probed, &mut Db(&conn), ApplyOptions::default()).unwrap();
    conn.execute("INSERT INTO items (id, sku) VALUES (1, 'a')", [])
        .unwrap();
}

#[test]
fn test_nullable_column_is_added_in_place() {
    let from = items("integer", "");
    let to = model(
        r#"{
            "tables": [{ "name": "items" }],
            "columns": [
                { "table": "items", "name": "id", "type": "integer", "notNull": true },
                { "table": "items", "name": "qty", "type": "integer" },
                { "table": "items", "name": "note", "type": "text" },
                { "table": "items", "name": "active", "type": "integer", "notNull": true,
                  "default": { "kind": "literal", "value": "1" } }
            ],
            "pks": [{ "table": "items", "columns": ["id"] }]
        }"#,
    );

    let plan = plan(&from, &to);
    assert_eq!(
        plan.sql(),
        vec!["ALTER TABLE `items` ADD `active` INTEGER DEFAULT 1 NOT NULL;"]
    );
}

// =============================================================================
// Foreign keys
// =============================================================================

fn blog() -> Ddl {
    model(
        r#"{
            "tables": [{ "name": "posts" }, { "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true },
                { "table": "posts", "name": "id", "type": "integer", "notNull": true },
                { "table": "posts", "name": "author_id", "type": "integer" }
            ],
            "pks": [
                { "table": "users", "columns": ["id"] },
                { "table": "posts", "columns": ["id"] }
            ],
            "fks": [
                { "table": "posts", "columns": ["author_id"], "tableTo": "users", "columnsTo": ["id"] }
            ]
        }"#,
    )
}

#[test]
fn test_foreign_keys_are_inlined() {
    let empty = Ddl::new(Dialect::SQLite);
    let plan = plan(&empty, &blog());
    let sql = plan.sql();
    assert_eq!(sql.len(), 2, "no separate constraint statements: {sql:#?}");
    assert!(sql[0].starts_with("CREATE TABLE `users`"));
    assert!(sql[1].starts_with("CREATE TABLE `posts`"));
    assert!(sql[1].contains(
        "CONSTRAINT `posts_author_id_users_id_fk` FOREIGN KEY (`author_id`) REFERENCES `users`(`id`)"
    ));

    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    apply(&plan, &mut Db(&conn), ApplyOptions::default()).unwrap();
}

#[test]
fn test_referencing_table_dropped_first() {
    let empty = Ddl::new(Dialect::SQLite);
    let plan = plan(&blog(), &empty);
    assert_eq!(
        plan.sql(),
        vec!["DROP TABLE `posts`;", "DROP TABLE `users`;"]
    );

    let conn = database(&blog());
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    apply(&plan, &mut Db(&conn), ApplyOptions::default()).unwrap();
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_model_round_trips_through_interim_form() {
    let ddl = blog();
    let again = Ddl::try_from_interim(&InterimSnapshot::from_ddl(&ddl), Dialect::SQLite).unwrap();
    assert!(plan(&ddl, &again).is_empty());
    assert!(plan(&again, &ddl).is_empty());
}

#[test]
fn test_applying_a_plan_stops_at_failure() {
    let from = items("integer", "");
    let to = items(
        "integer",
        r#", "checks": [{ "table": "items", "name": "qty_positive", "value": "qty > 0" }]"#,
    );
    let conn = database(&from);
    conn.execute("INSERT INTO items (id, qty) VALUES (1, -4)", [])
        .unwrap();

    let err = apply(&plan(&from, &to), &mut Db(&conn), ApplyOptions::default()).unwrap_err();
    assert!(err.statement.starts_with("INSERT INTO `__new_items`"));
    assert_eq!(err.applied.len(), 2, "pragma and create ran before the copy");
}
