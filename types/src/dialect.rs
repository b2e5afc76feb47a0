//! Unified database dialect enum
//!
//! A single source of truth for identifying the SQL back end a schema targets.
//! Each dialect knows its default namespace and whether it supports
//! namespaces at all; everything else dialect-specific lives in the grammars.

/// SQL dialect for database-specific behavior
///
/// # Examples
///
/// ```
/// use driftless_types::Dialect;
///
/// assert_eq!(Dialect::PostgreSQL.default_namespace(), "public");
/// assert!(!Dialect::SQLite.supports_namespaces());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// PostgreSQL
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "postgres", alias = "pg"))]
    PostgreSQL,

    /// MySQL
    MySQL,

    /// SQLite - also covers libsql and turso
    #[cfg_attr(feature = "serde", serde(alias = "turso", alias = "libsql"))]
    SQLite,

    /// CockroachDB - Postgres wire protocol with its own ALTER rules
    #[cfg_attr(feature = "serde", serde(alias = "cockroach", alias = "crdb"))]
    CockroachDB,

    /// SingleStore - MySQL grammar, no foreign keys
    SingleStore,

    /// Microsoft SQL Server
    #[cfg_attr(feature = "serde", serde(alias = "sqlserver"))]
    MSSQL,
}

impl Dialect {
    /// Every supported dialect, in declaration order
    pub const ALL: [Dialect; 6] = [
        Dialect::PostgreSQL,
        Dialect::MySQL,
        Dialect::SQLite,
        Dialect::CockroachDB,
        Dialect::SingleStore,
        Dialect::MSSQL,
    ];

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// Supports common aliases:
    /// - PostgreSQL: `"postgresql"`, `"postgres"`, `"pg"`
    /// - SQLite: `"sqlite"`, `"turso"`, `"libsql"`
    /// - CockroachDB: `"cockroachdb"`, `"cockroach"`, `"crdb"`
    /// - MSSQL: `"mssql"`, `"sqlserver"`
    ///
    /// ```
    /// use driftless_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("crdb"), Some(Dialect::CockroachDB));
    /// assert_eq!(Dialect::parse("oracle"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let is = |names: &[&str]| names.iter().any(|n| s.eq_ignore_ascii_case(n));

        if is(&["postgresql", "postgres", "pg"]) {
            Some(Dialect::PostgreSQL)
        } else if is(&["mysql"]) {
            Some(Dialect::MySQL)
        } else if is(&["sqlite", "turso", "libsql"]) {
            Some(Dialect::SQLite)
        } else if is(&["cockroachdb", "cockroach", "crdb"]) {
            Some(Dialect::CockroachDB)
        } else if is(&["singlestore"]) {
            Some(Dialect::SingleStore)
        } else if is(&["mssql", "sqlserver"]) {
            Some(Dialect::MSSQL)
        } else {
            None
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
            Dialect::SQLite => "sqlite",
            Dialect::CockroachDB => "cockroachdb",
            Dialect::SingleStore => "singlestore",
            Dialect::MSSQL => "mssql",
        }
    }

    /// Namespace an unqualified entity belongs to.
    ///
    /// MySQL-family dialects use the current database, represented as `""`.
    #[must_use]
    pub const fn default_namespace(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL | Dialect::CockroachDB => "public",
            Dialect::MySQL | Dialect::SingleStore => "",
            Dialect::SQLite => "main",
            Dialect::MSSQL => "dbo",
        }
    }

    /// Whether tables can live in user-created namespaces
    #[must_use]
    pub const fn supports_namespaces(&self) -> bool {
        matches!(
            self,
            Dialect::PostgreSQL | Dialect::CockroachDB | Dialect::MSSQL
        )
    }

    /// Whether this dialect belongs to the Postgres family
    #[must_use]
    pub const fn is_postgres_family(&self) -> bool {
        matches!(self, Dialect::PostgreSQL | Dialect::CockroachDB)
    }

    /// Whether this dialect belongs to the MySQL family
    #[must_use]
    pub const fn is_mysql_family(&self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::SingleStore)
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or_else(|| DialectParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectParseError(pub String);

impl core::fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown dialect '{}'", self.0)
    }
}

impl std::error::Error for DialectParseError {}
