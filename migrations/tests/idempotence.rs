//! A schema diffed against itself plans nothing, in every dialect

use driftless_migrations::{Ddl, Dialect, InterimSnapshot, NoRenames, export, generate};

const SCHEMA: &str = r#"{
    "tables": [{ "name": "users" }, { "name": "posts" }],
    "columns": [
        { "table": "users", "name": "id", "type": "integer", "notNull": true },
        { "table": "users", "name": "email", "type": "varchar(255)", "notNull": true },
        { "table": "users", "name": "active", "type": "boolean", "notNull": true,
          "default": { "kind": "literal", "value": "true" } },
        { "table": "users", "name": "bio", "type": "text" },
        { "table": "posts", "name": "id", "type": "integer", "notNull": true },
        { "table": "posts", "name": "author_id", "type": "integer" },
        { "table": "posts", "name": "score", "type": "integer",
          "default": { "kind": "literal", "value": "0" } }
    ],
    "pks": [
        { "table": "users", "columns": ["id"] },
        { "table": "posts", "columns": ["id"] }
    ],
    "uniques": [{ "table": "users", "columns": ["email"] }],
    "checks": [{ "table": "posts", "value": "score >= 0" }],
    "indexes": [{ "table": "posts", "columns": [{ "value": "author_id" }] }],
    "views": [{ "name": "active_users", "definition": "select id, email from users" }]
}"#;

const FOREIGN_KEY: &str = r#"{
    "fks": [{ "table": "posts", "columns": ["author_id"], "tableTo": "users", "columnsTo": ["id"] }]
}"#;

fn model(dialect: Dialect) -> Ddl {
    let mut snapshot = InterimSnapshot::from_json(SCHEMA).unwrap();
    if dialect != Dialect::SingleStore {
        snapshot
            .merge(InterimSnapshot::from_json(FOREIGN_KEY).unwrap())
            .unwrap();
    }
    Ddl::try_from_interim(&snapshot, dialect)
        .unwrap_or_else(|errors| panic!("{dialect}: {errors}"))
}

const DIALECTS: [Dialect; 6] = [
    Dialect::PostgreSQL,
    Dialect::CockroachDB,
    Dialect::MySQL,
    Dialect::SingleStore,
    Dialect::SQLite,
    Dialect::MSSQL,
];

#[test]
fn test_self_diff_is_empty() {
    for dialect in DIALECTS {
        let ddl = model(dialect);
        let plan = generate(&ddl, &ddl, &mut NoRenames, None).unwrap();
        assert!(plan.is_empty(), "{dialect}: {:#?}", plan.sql());
        assert!(plan.hints.is_empty(), "{dialect}: {:#?}", plan.hints);
    }
}

#[test]
fn test_export_creates_every_table_and_view() {
    for dialect in DIALECTS {
        let sql = export(&model(dialect)).sql();
        assert!(!sql.is_empty(), "{dialect}");
        assert_eq!(
            sql.iter().filter(|s| s.starts_with("CREATE TABLE")).count(),
            2,
            "{dialect}: {sql:#?}"
        );
        assert!(
            sql.iter().any(|s| s.contains("VIEW") && s.contains("active_users")),
            "{dialect}: {sql:#?}"
        );
    }
}
