//! Migration file writer
//!
//! Each migration lives in its own directory:
//!
//! ```text
//! {out}/0000_init/migration.sql
//! {out}/0000_init/snapshot.json
//! {out}/0001_add_posts/migration.sql
//! ...
//! ```
//!
//! `snapshot.json` is the interim snapshot the migration brings the database
//! to, chained to its predecessor through `id`/`prevId`.

use crate::error::MigrationError;
use crate::interim::InterimSnapshot;
use crate::migration::MigrationPlan;
use crate::utils::slugify;
use driftless_types::Dialect;
use serde::{Deserialize, Serialize};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `prevId` of the first migration in a chain
pub const ORIGIN_ID: &str = "00000000-0000-0000-0000-000000000000";

const SQL_FILE: &str = "migration.sql";
const SNAPSHOT_FILE: &str = "snapshot.json";

/// A snapshot as stored next to its migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub id: String,
    pub prev_id: String,
    /// Renames accepted when this migration was generated, as hint strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renames: Vec<String>,
    #[serde(flatten)]
    pub snapshot: InterimSnapshot,
}

/// A migration directory found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    pub idx: u32,
    pub tag: String,
    pub dir: PathBuf,
}

impl MigrationEntry {
    pub fn sql_path(&self) -> PathBuf {
        self.dir.join(SQL_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }
}

/// Migration writer for creating migration files
pub struct MigrationWriter {
    out: PathBuf,
    breakpoints: bool,
}

impl MigrationWriter {
    pub fn new(out: impl Into<PathBuf>) -> Self {
        Self {
            out: out.into(),
            breakpoints: true,
        }
    }

    /// Set whether to use breakpoints in generated SQL
    pub fn with_breakpoints(mut self, enabled: bool) -> Self {
        self.breakpoints = enabled;
        self
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.out
    }

    /// Migration directories in index order
    pub fn migrations(&self) -> io::Result<Vec<MigrationEntry>> {
        if !self.out.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.out)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let tag = entry.file_name().to_string_lossy().into_owned();
            let Some(idx) = parse_idx(&tag) else {
                continue;
            };
            entries.push(MigrationEntry {
                idx,
                tag,
                dir: entry.path(),
            });
        }
        entries.sort_by(|a, b| a.idx.cmp(&b.idx).then_with(|| a.tag.cmp(&b.tag)));
        Ok(entries)
    }

    /// The snapshot written with the latest migration, if any
    pub fn latest_snapshot(&self) -> Result<Option<StoredSnapshot>, MigrationError> {
        let Some(entry) = self.migrations()?.pop() else {
            return Ok(None);
        };
        let path = entry.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let stored: StoredSnapshot = serde_json::from_str(&text)
            .map_err(crate::error::SnapshotError::from)?;
        Ok(Some(stored))
    }

    /// The state the next migration starts from: the latest snapshot, or an
    /// empty one when nothing has been written yet
    pub fn previous_snapshot(&self, dialect: Dialect) -> Result<InterimSnapshot, MigrationError> {
        Ok(self
            .latest_snapshot()?
            .map(|s| s.snapshot)
            .unwrap_or_else(|| InterimSnapshot::empty(dialect)))
    }

    /// Write `plan` and the snapshot it leads to as the next migration
    pub fn write(
        &self,
        name: Option<&str>,
        plan: &MigrationPlan,
        current: &InterimSnapshot,
    ) -> Result<MigrationEntry, MigrationError> {
        if plan.is_empty() {
            return Err(MigrationError::NoChanges);
        }

        fs::create_dir_all(&self.out)?;
        let prev_id = self
            .latest_snapshot()?
            .map_or_else(|| ORIGIN_ID.to_string(), |s| s.id);
        let existing = self.migrations()?;
        let idx = existing.last().map_or(0, |e| e.idx + 1);
        let slug = match name.map(slugify) {
            Some(s) if !s.is_empty() => s,
            _ if existing.is_empty() => "init".to_string(),
            _ => "migration".to_string(),
        };
        let tag = format!("{:04}_{}", idx, slug);
        let dir = self.out.join(&tag);
        fs::create_dir_all(&dir)?;

        let mut sql = plan.to_sql(self.breakpoints);
        sql.push('\n');
        fs::write(dir.join(SQL_FILE), sql)?;

        let mut snapshot = current.clone();
        snapshot.dialect = Some(plan.dialect);
        let stored = StoredSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            prev_id,
            renames: plan.renames.iter().map(ToString::to_string).collect(),
            snapshot,
        };
        let json = serde_json::to_string_pretty(&stored).map_err(crate::error::SnapshotError::from)?;
        fs::write(dir.join(SNAPSHOT_FILE), json)?;

        tracing::info!(tag = %tag, statements = plan.sql().len(), "migration written");
        Ok(MigrationEntry { idx, tag, dir })
    }
}

fn parse_idx(tag: &str) -> Option<u32> {
    let (idx, rest) = tag.split_once('_')?;
    if idx.len() != 4 || rest.is_empty() {
        return None;
    }
    idx.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::diff_snapshots;
    use crate::resolver::NoRenames;
    use tempfile::TempDir;

    fn users(extra_column: bool) -> InterimSnapshot {
        let mut json = String::from(
            r#"{ "dialect": "sqlite", "tables": [{ "name": "users" }], "columns": [
                { "table": "users", "name": "id", "type": "integer", "notNull": true }"#,
        );
        if extra_column {
            json.push_str(r#", { "table": "users", "name": "bio", "type": "text" }"#);
        }
        json.push_str("] }");
        InterimSnapshot::from_json(&json).unwrap()
    }

    #[test]
    fn test_writes_chained_migrations() {
        let dir = TempDir::new().unwrap();
        let writer = MigrationWriter::new(dir.path());

        let prev = writer.previous_snapshot(Dialect::SQLite).unwrap();
        assert!(prev.is_empty());

        let first = users(false);
        let plan = diff_snapshots(&prev, &first, Dialect::SQLite, &mut NoRenames).unwrap();
        let entry = writer.write(None, &plan, &first).unwrap();
        assert_eq!(entry.tag, "0000_init");
        assert!(entry.sql_path().exists());

        let stored = writer.latest_snapshot().unwrap().unwrap();
        assert_eq!(stored.prev_id, ORIGIN_ID);
        assert_eq!(stored.snapshot.tables, first.tables);

        let second = users(true);
        let prev = writer.previous_snapshot(Dialect::SQLite).unwrap();
        let plan = diff_snapshots(&prev, &second, Dialect::SQLite, &mut NoRenames).unwrap();
        let entry = writer.write(Some("Add bio"), &plan, &second).unwrap();
        assert_eq!(entry.tag, "0001_add_bio");

        let latest = writer.latest_snapshot().unwrap().unwrap();
        assert_eq!(latest.prev_id, stored.id, "snapshots chain through prevId");
        let sql = fs::read_to_string(entry.sql_path()).unwrap();
        assert!(sql.contains("ADD `bio` TEXT"), "unexpected sql: {sql}");
    }

    #[test]
    fn test_empty_plan_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let writer = MigrationWriter::new(dir.path());
        let plan = diff_snapshots(&users(false), &users(false), Dialect::SQLite, &mut NoRenames)
            .unwrap();
        let err = writer.write(None, &plan, &users(false)).unwrap_err();
        assert!(matches!(err, MigrationError::NoChanges));
        assert!(writer.migrations().unwrap().is_empty());
    }

    #[test]
    fn test_ignores_unrelated_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("meta")).unwrap();
        fs::create_dir_all(dir.path().join("0003_x")).unwrap();
        let writer = MigrationWriter::new(dir.path());
        let entries = writer.migrations().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].idx, 3);
    }
}
