//! PostgreSQL reconciliation tests
//!
//! Snapshots go in as interim JSON and come out as rendered statements, the
//! same path `driftless generate` takes.

use driftless_migrations::{
    DeterministicResolver, Dialect, HeuristicResolver, HintKind, InterimSnapshot, MigrationPlan,
    NoRenames, RenameResolver, diff_snapshots,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn snapshot(json: &str) -> InterimSnapshot {
    InterimSnapshot::from_json(json).expect("valid snapshot json")
}

fn plan_with(
    prev: &InterimSnapshot,
    cur: &InterimSnapshot,
    resolver: &mut dyn RenameResolver,
) -> MigrationPlan {
    diff_snapshots(prev, cur, Dialect::PostgreSQL, resolver).expect("plan")
}

fn plan(prev: &InterimSnapshot, cur: &InterimSnapshot) -> MigrationPlan {
    plan_with(prev, cur, &mut NoRenames)
}

fn types(plan: &MigrationPlan) -> Vec<&'static str> {
    plan.operations.iter().map(|op| op.type_name()).collect()
}

fn position(sql: &[String], needle: &str) -> usize {
    sql.iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("no statement contains {needle:?} in {sql:#?}"))
}

fn users_with_id() -> InterimSnapshot {
    snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true }],
            "pks": [{ "table": "users", "columns": ["id"] }]
        }"#,
    )
}

// =============================================================================
// Columns
// =============================================================================

#[test]
fn test_add_column_with_default() {
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true },
                { "table": "users", "name": "name", "type": "text", "notNull": true,
                  "default": { "kind": "literal", "value": "hey" } }
            ],
            "pks": [{ "table": "users", "columns": ["id"] }]
        }"#,
    );

    let plan = plan(&users_with_id(), &cur);
    assert_eq!(types(&plan), vec!["add_column"]);
    assert_eq!(
        plan.sql(),
        vec![r#"ALTER TABLE "users" ADD COLUMN "name" text NOT NULL DEFAULT 'hey';"#]
    );
}

#[test]
fn test_identity_removal_recreates_column() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true,
                          "identity": { "type": "always" } }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true }]
        }"#,
    );

    let plan = plan(&prev, &cur);
    assert_eq!(
        types(&plan),
        vec![
            "rename_column",
            "add_column",
            "copy_column_data",
            "alter_column",
            "drop_column",
        ],
        "identity removal must go through a shadow column"
    );

    let sql = plan.sql();
    assert_eq!(sql[0], r#"ALTER TABLE "users" RENAME COLUMN "id" TO "__id_old";"#);
    assert_eq!(sql[1], r#"ALTER TABLE "users" ADD COLUMN "id" integer;"#);
    assert_eq!(sql[2], r#"UPDATE "users" SET "id" = "__id_old";"#);
    assert_eq!(sql[3], r#"ALTER TABLE "users" ALTER COLUMN "id" SET NOT NULL;"#);
    assert_eq!(sql[4], r#"ALTER TABLE "users" DROP COLUMN "__id_old";"#);
    assert!(!sql.iter().any(|s| s.contains("DROP IDENTITY")));
}

#[test]
fn test_type_change_is_in_place() {
    let prev = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "age", "type": "text" }] }"#,
    );
    let cur = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "age", "type": "integer" }] }"#,
    );

    let plan = plan(&prev, &cur);
    assert_eq!(
        plan.sql(),
        vec![r#"ALTER TABLE "users" ALTER COLUMN "age" SET DATA TYPE integer USING "age"::integer;"#]
    );
    assert!(plan.hints.iter().any(|h| h.kind == HintKind::TypeChange));
}

#[test]
fn test_shadow_name_skips_taken_names() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "identity": { "type": "byDefault" } },
                { "table": "users", "name": "__id_old", "type": "text" }
            ]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer" },
                { "table": "users", "name": "__id_old", "type": "text" }
            ]
        }"#,
    );

    let plan = plan(&prev, &cur);
    assert_eq!(
        plan.sql()[0],
        r#"ALTER TABLE "users" RENAME COLUMN "id" TO "__id_old_1";"#
    );
}

#[test]
fn test_key_columns_survive_a_shadow_replacement() {
    let users = |identity: &str| {
        snapshot(&format!(
            r#"{{
                "tables": [{{ "name": "users" }}, {{ "name": "posts" }}],
                "columns": [
                    {{ "table": "users", "name": "id", "type": "integer", "notNull": true {identity} }},
                    {{ "table": "posts", "name": "user_id", "type": "integer" }}
                ],
                "pks": [{{ "table": "users", "columns": ["id"] }}],
                "fks": [{{ "table": "posts", "columns": ["user_id"], "tableTo": "users", "columnsTo": ["id"] }}]
            }}"#
        ))
    };
    let prev = users(r#", "identity": { "type": "always" }"#);
    let cur = users("");

    let sql = plan(&prev, &cur).sql();
    let drop_fk = position(&sql, r#"DROP CONSTRAINT "posts_user_id_users_id_fkey""#);
    let drop_pk = position(&sql, r#"DROP CONSTRAINT "users_pkey""#);
    let rename = position(&sql, r#"RENAME COLUMN "id" TO "__id_old""#);
    let not_null = position(&sql, r#"ALTER COLUMN "id" SET NOT NULL"#);
    let drop_shadow = position(&sql, r#"DROP COLUMN "__id_old""#);
    let add_pk = position(&sql, r#"ADD CONSTRAINT "users_pkey" PRIMARY KEY("id")"#);
    let add_fk = position(&sql, r#"ADD CONSTRAINT "posts_user_id_users_id_fkey""#);

    assert!(drop_fk < drop_pk, "{sql:#?}");
    assert!(drop_pk < rename, "{sql:#?}");
    assert!(rename < not_null && not_null < drop_shadow, "{sql:#?}");
    assert!(drop_shadow < add_pk, "{sql:#?}");
    assert!(add_pk < add_fk, "{sql:#?}");
}

// =============================================================================
// Renames
// =============================================================================

#[test]
fn test_table_rename_with_hint() {
    let prev = snapshot(
        r#"{
            "schemas": [{ "name": "ns" }],
            "tables": [{ "schema": "ns", "name": "t1" }],
            "columns": [{ "schema": "ns", "table": "t1", "name": "id", "type": "integer", "notNull": true }],
            "pks": [{ "schema": "ns", "table": "t1", "columns": ["id"] }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "schemas": [{ "name": "ns" }],
            "tables": [{ "schema": "ns", "name": "t2" }],
            "columns": [{ "schema": "ns", "table": "t2", "name": "id", "type": "integer", "notNull": true }],
            "pks": [{ "schema": "ns", "table": "t2", "columns": ["id"] }]
        }"#,
    );

    let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, ["ns.t1->ns.t2"]).unwrap();
    let plan = plan_with(&prev, &cur, &mut resolver);

    let ops = types(&plan);
    assert_eq!(ops.iter().filter(|t| **t == "rename_table").count(), 1);
    assert!(!ops.contains(&"create_table"));
    assert!(!ops.contains(&"drop_table"));
    assert_eq!(plan.sql()[0], r#"ALTER TABLE "ns"."t1" RENAME TO "t2";"#);
    assert!(
        plan.sql()
            .contains(&r#"ALTER TABLE "ns"."t2" RENAME CONSTRAINT "t1_pkey" TO "t2_pkey";"#.to_string()),
        "synthesized key name follows the table: {:#?}",
        plan.sql()
    );
    assert_eq!(plan.renames.len(), 1);
    assert_eq!(plan.renames[0].to_string(), "ns.t1->ns.t2");
}

#[test]
fn test_explicit_constraint_name_is_kept_on_rename() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "t1" }],
            "columns": [{ "table": "t1", "name": "id", "type": "integer", "notNull": true }],
            "pks": [{ "table": "t1", "name": "my_key", "columns": ["id"] }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "t2" }],
            "columns": [{ "table": "t2", "name": "id", "type": "integer", "notNull": true }],
            "pks": [{ "table": "t2", "name": "my_key", "columns": ["id"] }]
        }"#,
    );

    let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, ["t1->t2"]).unwrap();
    let plan = plan_with(&prev, &cur, &mut resolver);
    assert_eq!(plan.sql(), vec![r#"ALTER TABLE "t1" RENAME TO "t2";"#]);
}

#[test]
fn test_column_rename_by_heuristic() {
    let prev = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "name", "type": "text" }] }"#,
    );
    let cur = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "full_name", "type": "text" }] }"#,
    );

    let plan = plan_with(&prev, &cur, &mut HeuristicResolver);
    assert_eq!(
        plan.sql(),
        vec![r#"ALTER TABLE "users" RENAME COLUMN "name" TO "full_name";"#]
    );

    let plan = self::plan(&prev, &cur);
    assert_eq!(types(&plan), vec!["drop_column", "add_column"]);
    assert!(plan.has_destructive_hints());
}

#[test]
fn test_strict_resolver_refuses_to_guess() {
    let prev = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "name", "type": "text" }] }"#,
    );
    let cur = snapshot(
        r#"{ "tables": [{ "name": "users" }],
             "columns": [{ "table": "users", "name": "full_name", "type": "text" }] }"#,
    );

    let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, Vec::<String>::new())
        .unwrap()
        .strict();
    let err = diff_snapshots(&prev, &cur, Dialect::PostgreSQL, &mut resolver).unwrap_err();
    assert!(err.to_string().contains("ambiguous"), "unexpected error: {err}");
}

#[test]
fn test_schema_rename() {
    let prev = snapshot(
        r#"{ "schemas": [{ "name": "audit" }],
             "tables": [{ "schema": "audit", "name": "events" }],
             "columns": [{ "schema": "audit", "table": "events", "name": "id", "type": "integer" }] }"#,
    );
    let cur = snapshot(
        r#"{ "schemas": [{ "name": "archive" }],
             "tables": [{ "schema": "archive", "name": "events" }],
             "columns": [{ "schema": "archive", "table": "events", "name": "id", "type": "integer" }] }"#,
    );

    let mut resolver =
        DeterministicResolver::new(Dialect::PostgreSQL, ["audit->archive"]).unwrap();
    let plan = plan_with(&prev, &cur, &mut resolver);
    assert_eq!(
        plan.sql(),
        vec![r#"ALTER SCHEMA "audit" RENAME TO "archive";"#]
    );
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_constraints_dropped_before_their_columns() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true },
                { "table": "users", "name": "email", "type": "text" }
            ],
            "uniques": [{ "table": "users", "columns": ["email"] }],
            "checks": [{ "table": "users", "name": "email_shape", "value": "email like '%@%'" }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true }]
        }"#,
    );

    let sql = plan(&prev, &cur).sql();
    let drop_column = position(&sql, r#"DROP COLUMN "email""#);
    assert!(position(&sql, r#"DROP CONSTRAINT "users_email_key""#) < drop_column);
    assert!(position(&sql, r#"DROP CONSTRAINT "email_shape""#) < drop_column);
}

#[test]
fn test_reordered_checks_plan_nothing() {
    let users = |checks: &str| {
        snapshot(&format!(
            r#"{{
                "tables": [{{ "name": "users" }}],
                "columns": [{{ "table": "users", "name": "age", "type": "integer" }}],
                "checks": {checks}
            }}"#
        ))
    };
    let prev = users(
        r#"[{ "table": "users", "value": "age > 0" }, { "table": "users", "value": "age < 200" }]"#,
    );
    let cur = users(
        r#"[{ "table": "users", "value": "age < 200" }, { "table": "users", "value": "age > 0" }]"#,
    );

    let plan = plan(&prev, &cur);
    assert!(plan.operations.is_empty(), "{:#?}", plan.sql());
}

#[test]
fn test_tables_created_in_dependency_order() {
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "comments" }, { "name": "posts" }, { "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true },
                { "table": "posts", "name": "id", "type": "integer", "notNull": true },
                { "table": "posts", "name": "author_id", "type": "integer" },
                { "table": "comments", "name": "post_id", "type": "integer" }
            ],
            "pks": [
                { "table": "users", "columns": ["id"] },
                { "table": "posts", "columns": ["id"] }
            ],
            "fks": [
                { "table": "posts", "columns": ["author_id"], "tableTo": "users", "columnsTo": ["id"] },
                { "table": "comments", "columns": ["post_id"], "tableTo": "posts", "columnsTo": ["id"],
                  "onDelete": "cascade" }
            ]
        }"#,
    );

    let plan = plan(&InterimSnapshot::empty(Dialect::PostgreSQL), &cur);
    let sql = plan.sql();
    let users = position(&sql, r#"CREATE TABLE "users""#);
    let posts = position(&sql, r#"CREATE TABLE "posts""#);
    let comments = position(&sql, r#"CREATE TABLE "comments""#);
    assert!(users < posts && posts < comments);

    let fk = position(&sql, "FOREIGN KEY");
    assert!(fk > comments, "foreign keys are added after every table exists");
    assert!(sql.iter().any(|s| s.ends_with("ON DELETE CASCADE;")));
}

#[test]
fn test_views_rebuilt_around_column_type_change() {
    let prev = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "age", "type": "text" }],
            "views": [{ "name": "adults", "definition": "select age from users" }]
        }"#,
    );
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [{ "table": "users", "name": "age", "type": "integer" }],
            "views": [{ "name": "adults", "definition": "select age from users" }]
        }"#,
    );

    let plan = plan(&prev, &cur);
    assert_eq!(types(&plan), vec!["drop_view", "alter_column", "create_view"]);
}

// =============================================================================
// Hints
// =============================================================================

#[test]
fn test_not_null_without_default_is_flagged() {
    let cur = snapshot(
        r#"{
            "tables": [{ "name": "users" }],
            "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true },
                { "table": "users", "name": "email", "type": "text", "notNull": true }
            ],
            "pks": [{ "table": "users", "columns": ["id"] }]
        }"#,
    );

    let plan = plan(&users_with_id(), &cur);
    assert!(
        plan.hints
            .iter()
            .any(|h| h.kind == HintKind::MayFailOnExistingRows && h.operation == Some(0))
    );
}

#[test]
fn test_table_drop_is_destructive() {
    let plan = plan(&users_with_id(), &InterimSnapshot::empty(Dialect::PostgreSQL));
    assert_eq!(plan.sql(), vec![r#"DROP TABLE "users";"#]);
    assert!(plan.has_destructive_hints());
}
