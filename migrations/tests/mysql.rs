//! MySQL and SingleStore reconciliation tests

use driftless_migrations::{
    DeterministicResolver, Dialect, HintKind, InterimSnapshot, MigrationError, MigrationPlan,
    NoRenames, RenameResolver, diff_snapshots,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn snapshot(json: &str) -> InterimSnapshot {
    InterimSnapshot::from_json(json).expect("valid snapshot json")
}

fn plan_with(
    dialect: Dialect,
    prev: &InterimSnapshot,
    cur: &InterimSnapshot,
    resolver: &mut dyn RenameResolver,
) -> MigrationPlan {
    diff_snapshots(prev, cur, dialect, resolver).expect("plan")
}

fn types(plan: &MigrationPlan) -> Vec<&'static str> {
    plan.operations.iter().map(|op| op.type_name()).collect()
}

fn users(name_type: &str) -> InterimSnapshot {
    snapshot(&format!(
        r#"{{
            "tables": [{{ "name": "users" }}],
            "columns": [
                {{ "table": "users", "name": "id", "type": "int", "notNull": true }},
                {{ "table": "users", "name": "name", "type": "{name_type}", "notNull": true }}
            ],
            "pks": [{{ "table": "users", "columns": ["id"] }}]
        }}"#
    ))
}

// =============================================================================
// MySQL
// =============================================================================

#[test]
fn test_text_default_is_an_expression() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "id", "type": "int", "notNull": true }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "int", "notNull": true },
                { "table": "users", "name": "name", "type": "text", "notNull": true,
                  "default": { "kind": "literal", "value": "hey" } }
            ]
        }"#,
    );

    let plan = plan_with(Dialect::MySQL, &prev, &cur, &mut NoRenames);
    assert_eq!(
        plan.sql(),
        vec!["ALTER TABLE `users` ADD `name` text NOT NULL DEFAULT ('hey');"]
    );
}

#[test]
fn test_type_change_modifies_column() {
    let plan = plan_with(
        Dialect::MySQL,
        &users("varchar(50)"),
        &users("varchar(255)"),
        &mut NoRenames,
    );
    assert_eq!(
        plan.sql(),
        vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(255) NOT NULL;"]
    );
    assert!(plan.hints.iter().any(|h| h.kind == HintKind::TypeChange));
}

#[test]
fn test_unique_rename_is_drop_and_add() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "email", "type": "varchar(255)" }],
            "uniques": [{ "table": "users", "columns": ["email"] }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "email", "type": "varchar(255)" }],
            "uniques": [{ "table": "users", "name": "email_uq", "columns": ["email"] }]
        }"#,
    );

    let plan = plan_with(Dialect::MySQL, &prev, &cur, &mut NoRenames);
    assert_eq!(
        plan.sql(),
        vec![
            "ALTER TABLE `users` DROP INDEX `users_email_unique`;",
            "ALTER TABLE `users` ADD CONSTRAINT `email_uq` UNIQUE(`email`);",
        ]
    );
}

#[test]
fn test_table_rename() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "t1" }],
            "columns": [{ "table": "t1", "name": "id", "type": "int", "notNull": true }],
            "pks": [{ "table": "t1", "columns": ["id"] }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "t2" }],
            "columns": [{ "table": "t2", "name": "id", "type": "int", "notNull": true }],
            "pks": [{ "table": "t2", "columns": ["id"] }]
        }"#,
    );

    let mut resolver = DeterministicResolver::new(Dialect::MySQL, ["t1->t2"]).unwrap();
    let plan = plan_with(Dialect::MySQL, &prev, &cur, &mut resolver);
    // the primary key is always named PRIMARY, so nothing follows the table
    assert_eq!(plan.sql(), vec!["RENAME TABLE `t1` TO `t2`;"]);
    assert_eq!(plan.renames[0].to_string(), "t1->t2");
}

#[test]
fn test_partial_index_is_rejected() {
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "email", "type": "varchar(255)" }],
            "indexes": [{ "table": "users", "columns": [{ "value": "email" }], "where": "email is not null" }]
        }"#,
    );

    let err = diff_snapshots(
        &InterimSnapshot::default(),
        &cur,
        Dialect::MySQL,
        &mut NoRenames,
    )
    .unwrap_err();
    assert!(matches!(err, MigrationError::Schema(_)), "got: {err}");
    assert!(err.to_string().contains("partial indexes"));
}

// =============================================================================
// SingleStore
// =============================================================================

#[test]
fn test_singlestore_rejects_foreign_keys() {
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "posts" }, { "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "int", "notNull": true },
                { "table": "posts", "name": "author_id", "type": "int" }
            ],
            "pks": [{ "table": "users", "columns": ["id"] }],
            "fks": [{ "table": "posts", "columns": ["author_id"], "tableTo": "users", "columnsTo": ["id"] }]
        }"#,
    );

    let err = diff_snapshots(
        &InterimSnapshot::default(),
        &cur,
        Dialect::SingleStore,
        &mut NoRenames,
    )
    .unwrap_err();
    assert!(matches!(err, MigrationError::Schema(_)), "got: {err}");
}

#[test]
fn test_singlestore_type_change_rebuilds_table() {
    let plan = plan_with(
        Dialect::SingleStore,
        &users("varchar(50)"),
        &users("text"),
        &mut NoRenames,
    );
    assert_eq!(types(&plan), vec!["recreate_table"]);

    let sql = plan.sql();
    assert!(sql[0].starts_with("CREATE TABLE `__new_users` ("), "got: {sql:#?}");
    assert_eq!(
        sql[1],
        "INSERT INTO `__new_users`(`id`, `name`) SELECT `id`, `name` FROM `users`;"
    );
    assert_eq!(sql[2], "DROP TABLE `users`;");
    assert_eq!(sql[3], "ALTER TABLE `__new_users` RENAME TO `users`;");
    assert!(plan.hints.iter().any(|h| h.kind == HintKind::TypeChange));
}
