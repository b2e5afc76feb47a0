//! Parsed column types
//!
//! Declared type strings (`varchar(100)`, `int unsigned`,
//! `timestamp(3) with time zone`, `text[]`) are parsed exactly once into a
//! [`ColumnType`]. Everything downstream compares and renders the structured
//! value; unknown types are kept verbatim as [`ColumnType::Custom`].

use crate::Dialect;

/// Integer storage width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum IntWidth {
    Tiny,
    Small,
    Medium,
    Regular,
    Big,
}

/// A typed column type with explicit parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "camelCase"))]
pub enum ColumnType {
    Integer { width: IntWidth, unsigned: bool },
    /// Postgres `serial` family
    Serial { width: IntWidth },
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Real,
    Double,
    Boolean,
    Char { length: Option<u32> },
    Varchar { length: Option<u32> },
    Text,
    Blob,
    Json,
    Jsonb,
    Date,
    Time { precision: Option<u32>, with_tz: bool },
    Timestamp { precision: Option<u32>, with_tz: bool },
    DateTime { precision: Option<u32> },
    Interval,
    Uuid,
    Array {
        element: Box<ColumnType>,
        dimensions: u32,
    },
    Custom { name: String },
}

/// Error produced when a known type carries malformed parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError {
    pub input: String,
    pub reason: String,
}

impl core::fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid type '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for TypeParseError {}

impl ColumnType {
    /// Parse a declared type string for the given dialect.
    ///
    /// ```
    /// use driftless_types::{ColumnType, Dialect, IntWidth};
    ///
    /// let ty = ColumnType::parse("int(11) unsigned", Dialect::MySQL).unwrap();
    /// assert_eq!(ty, ColumnType::Integer { width: IntWidth::Regular, unsigned: true });
    ///
    /// let ty = ColumnType::parse("character varying(20)", Dialect::PostgreSQL).unwrap();
    /// assert_eq!(ty, ColumnType::Varchar { length: Some(20) });
    /// ```
    pub fn parse(input: &str, dialect: Dialect) -> Result<Self, TypeParseError> {
        let original = input.trim();
        let mut lower = original
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        let mut dimensions = 0u32;
        while let Some(stripped) = lower.strip_suffix("[]") {
            lower = stripped.trim_end().to_string();
            dimensions += 1;
        }
        if dimensions > 0 {
            let element_src = original
                .trim_end_matches(|c: char| c == '[' || c == ']' || c.is_whitespace());
            let element = match Self::parse_scalar(&lower, element_src, dialect)? {
                Some(ty) => ty,
                None => ColumnType::Custom {
                    name: element_src.to_string(),
                },
            };
            return Ok(ColumnType::Array {
                element: Box::new(element),
                dimensions,
            });
        }

        Ok(Self::parse_scalar(&lower, original, dialect)?.unwrap_or_else(|| {
            ColumnType::Custom {
                name: original.to_string(),
            }
        }))
    }

    /// Parse a non-array type. `Ok(None)` means "not a known type".
    fn parse_scalar(
        lower: &str,
        original: &str,
        dialect: Dialect,
    ) -> Result<Option<Self>, TypeParseError> {
        let mut s = lower.to_string();

        let unsigned = match s.strip_suffix(" unsigned") {
            Some(rest) => {
                s = rest.trim_end().to_string();
                true
            }
            None => false,
        };

        let mut with_tz = None;
        if let Some(rest) = s.strip_suffix(" with time zone") {
            s = rest.trim_end().to_string();
            with_tz = Some(true);
        } else if let Some(rest) = s.strip_suffix(" without time zone") {
            s = rest.trim_end().to_string();
            with_tz = Some(false);
        }

        let (name, params) = match s.find('(') {
            Some(open) => {
                let Some(close) = s.rfind(')') else {
                    return Err(invalid(original, "unbalanced parentheses"));
                };
                if close < open || !s[close + 1..].trim().is_empty() {
                    // e.g. enum('a','b') collate x: leave to Custom
                    return Ok(None);
                }
                let params: Vec<String> = s[open + 1..close]
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .collect();
                (s[..open].trim().to_string(), params)
            }
            None => (s.clone(), Vec::new()),
        };

        if dialect == Dialect::MSSQL && params.iter().any(|p| p == "max") {
            return Ok(None);
        }

        let known = is_known(&name);
        if !known {
            return Ok(None);
        }

        let numbers = params
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| invalid(original, &format!("parameter '{}' is not a number", p)))
            })
            .collect::<Result<Vec<u32>, _>>()?;
        let first = numbers.first().copied();
        let second = numbers.get(1).copied();

        let int = |width| ColumnType::Integer { width, unsigned };

        let ty = match name.as_str() {
            "tinyint" => int(IntWidth::Tiny),
            "smallint" | "int2" => int(IntWidth::Small),
            "mediumint" => int(IntWidth::Medium),
            "integer" | "int" | "int4" => int(IntWidth::Regular),
            "bigint" | "int8" => int(IntWidth::Big),
            _ if unsigned => return Ok(None),
            "smallserial" | "serial2" => ColumnType::Serial {
                width: IntWidth::Small,
            },
            "serial" | "serial4" => ColumnType::Serial {
                width: IntWidth::Regular,
            },
            "bigserial" | "serial8" => ColumnType::Serial {
                width: IntWidth::Big,
            },
            "numeric" | "decimal" => ColumnType::Decimal {
                precision: first,
                scale: second,
            },
            "real" | "float4" => ColumnType::Real,
            "double precision" | "double" | "float8" => ColumnType::Double,
            "float" => {
                if dialect.is_mysql_family() {
                    ColumnType::Real
                } else {
                    ColumnType::Double
                }
            }
            "boolean" | "bool" => ColumnType::Boolean,
            "bit" if dialect == Dialect::MSSQL => ColumnType::Boolean,
            "char" | "character" => ColumnType::Char { length: first },
            "varchar" | "character varying" => ColumnType::Varchar { length: first },
            "text" => ColumnType::Text,
            "bytea" | "blob" => ColumnType::Blob,
            "json" => ColumnType::Json,
            "jsonb" => ColumnType::Jsonb,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time {
                precision: first,
                with_tz: with_tz.unwrap_or(false),
            },
            "timetz" => ColumnType::Time {
                precision: first,
                with_tz: true,
            },
            "timestamp" => ColumnType::Timestamp {
                precision: first,
                with_tz: with_tz.unwrap_or(false),
            },
            "timestamptz" => ColumnType::Timestamp {
                precision: first,
                with_tz: true,
            },
            "datetime" => ColumnType::DateTime { precision: first },
            "interval" => ColumnType::Interval,
            "uuid" => ColumnType::Uuid,
            "uniqueidentifier" if dialect == Dialect::MSSQL => ColumnType::Uuid,
            _ => return Ok(None),
        };

        if with_tz.is_some() && !matches!(ty, ColumnType::Time { .. } | ColumnType::Timestamp { .. })
        {
            return Err(invalid(original, "time zone qualifier on a non-temporal type"));
        }

        Ok(Some(ty))
    }

    /// Render this type in the given dialect's syntax
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        use Dialect::*;

        match self {
            ColumnType::Integer { width, unsigned } => {
                let base = match (dialect, width) {
                    (SQLite, _) => "integer",
                    (PostgreSQL | CockroachDB, IntWidth::Tiny | IntWidth::Small) => "smallint",
                    (PostgreSQL | CockroachDB, IntWidth::Medium | IntWidth::Regular) => "integer",
                    (PostgreSQL | CockroachDB, IntWidth::Big) => "bigint",
                    (MSSQL, IntWidth::Medium) => "int",
                    (_, IntWidth::Tiny) => "tinyint",
                    (_, IntWidth::Small) => "smallint",
                    (_, IntWidth::Medium) => "mediumint",
                    (_, IntWidth::Regular) => "int",
                    (_, IntWidth::Big) => "bigint",
                };
                if *unsigned && dialect.is_mysql_family() {
                    format!("{} unsigned", base)
                } else {
                    base.to_string()
                }
            }
            ColumnType::Serial { width } => match (dialect, width) {
                (PostgreSQL | CockroachDB, IntWidth::Tiny | IntWidth::Small) => "smallserial",
                (PostgreSQL | CockroachDB, IntWidth::Big) => "bigserial",
                (PostgreSQL | CockroachDB, _) => "serial",
                (SQLite, _) => "integer",
                (_, IntWidth::Big) => "bigint",
                (_, _) => "int",
            }
            .to_string(),
            ColumnType::Decimal { precision, scale } => {
                let name = match dialect {
                    PostgreSQL | CockroachDB | SQLite => "numeric",
                    _ => "decimal",
                };
                match (precision, scale) {
                    (Some(p), Some(s)) => format!("{}({}, {})", name, p, s),
                    (Some(p), None) => format!("{}({})", name, p),
                    _ => name.to_string(),
                }
            }
            ColumnType::Real => match dialect {
                MySQL | SingleStore => "float",
                _ => "real",
            }
            .to_string(),
            ColumnType::Double => match dialect {
                PostgreSQL | CockroachDB => "double precision",
                MySQL | SingleStore => "double",
                SQLite => "real",
                MSSQL => "float",
            }
            .to_string(),
            ColumnType::Boolean => match dialect {
                SQLite => "integer",
                MSSQL => "bit",
                _ => "boolean",
            }
            .to_string(),
            ColumnType::Char { length } => with_length("char", *length),
            ColumnType::Varchar { length } => with_length("varchar", *length),
            ColumnType::Text => "text".to_string(),
            ColumnType::Blob => match dialect {
                PostgreSQL | CockroachDB => "bytea",
                MSSQL => "varbinary(max)",
                _ => "blob",
            }
            .to_string(),
            ColumnType::Json => match dialect {
                MSSQL => "nvarchar(max)",
                _ => "json",
            }
            .to_string(),
            ColumnType::Jsonb => match dialect {
                PostgreSQL | CockroachDB => "jsonb",
                MSSQL => "nvarchar(max)",
                _ => "json",
            }
            .to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time { precision, with_tz } => {
                let base = with_length("time", *precision);
                if *with_tz && dialect.is_postgres_family() {
                    format!("{} with time zone", base)
                } else {
                    base
                }
            }
            ColumnType::Timestamp { precision, with_tz } => match dialect {
                PostgreSQL | CockroachDB => {
                    let base = with_length("timestamp", *precision);
                    if *with_tz {
                        format!("{} with time zone", base)
                    } else {
                        base
                    }
                }
                MSSQL if *with_tz => with_length("datetimeoffset", *precision),
                MSSQL => with_length("datetime2", *precision),
                _ => with_length("timestamp", *precision),
            },
            ColumnType::DateTime { precision } => match dialect {
                PostgreSQL | CockroachDB => with_length("timestamp", *precision),
                MSSQL => with_length("datetime2", *precision),
                _ => with_length("datetime", *precision),
            },
            ColumnType::Interval => "interval".to_string(),
            ColumnType::Uuid => match dialect {
                PostgreSQL | CockroachDB => "uuid",
                MSSQL => "uniqueidentifier",
                MySQL | SingleStore => "varchar(36)",
                SQLite => "text",
            }
            .to_string(),
            ColumnType::Array {
                element,
                dimensions,
            } => {
                if dialect.is_postgres_family() {
                    let mut sql = element.to_sql(dialect);
                    for _ in 0..*dimensions {
                        sql.push_str("[]");
                    }
                    sql
                } else {
                    ColumnType::Json.to_sql(dialect)
                }
            }
            ColumnType::Custom { name } => name.clone(),
        }
    }

    /// Whether literal defaults for this type are written without quotes
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer { .. }
                | ColumnType::Serial { .. }
                | ColumnType::Decimal { .. }
                | ColumnType::Real
                | ColumnType::Double
        )
    }

    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer { .. } | ColumnType::Serial { .. }
        )
    }

    #[must_use]
    pub fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }
}

fn with_length(name: &str, length: Option<u32>) -> String {
    match length {
        Some(n) => format!("{}({})", name, n),
        None => name.to_string(),
    }
}

fn invalid(input: &str, reason: &str) -> TypeParseError {
    TypeParseError {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "tinyint"
            | "smallint"
            | "int2"
            | "mediumint"
            | "integer"
            | "int"
            | "int4"
            | "bigint"
            | "int8"
            | "smallserial"
            | "serial2"
            | "serial"
            | "serial4"
            | "bigserial"
            | "serial8"
            | "numeric"
            | "decimal"
            | "real"
            | "float4"
            | "double precision"
            | "double"
            | "float8"
            | "float"
            | "boolean"
            | "bool"
            | "bit"
            | "char"
            | "character"
            | "varchar"
            | "character varying"
            | "text"
            | "bytea"
            | "blob"
            | "json"
            | "jsonb"
            | "date"
            | "time"
            | "timetz"
            | "timestamp"
            | "timestamptz"
            | "datetime"
            | "interval"
            | "uuid"
            | "uniqueidentifier"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(s: &str) -> ColumnType {
        ColumnType::parse(s, Dialect::PostgreSQL).unwrap()
    }

    #[test]
    fn test_integer_aliases_collapse() {
        assert_eq!(pg("int"), pg("integer"));
        assert_eq!(pg("int4"), pg("INTEGER"));
        assert_eq!(pg("int8"), pg("bigint"));
        assert_eq!(pg("integer").to_sql(Dialect::PostgreSQL), "integer");
    }

    #[test]
    fn test_mysql_unsigned_and_display_width() {
        let ty = ColumnType::parse("INT(11) UNSIGNED", Dialect::MySQL).unwrap();
        assert_eq!(
            ty,
            ColumnType::Integer {
                width: IntWidth::Regular,
                unsigned: true
            }
        );
        assert_eq!(ty.to_sql(Dialect::MySQL), "int unsigned");
        assert_eq!(ty.to_sql(Dialect::PostgreSQL), "integer");
    }

    #[test]
    fn test_varchar_and_decimal_params() {
        assert_eq!(pg("varchar(100)"), ColumnType::Varchar { length: Some(100) });
        assert_eq!(
            pg("numeric(10, 2)"),
            ColumnType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(pg("numeric(10,2)").to_sql(Dialect::MySQL), "decimal(10, 2)");
    }

    #[test]
    fn test_invalid_parameters_are_errors() {
        let err = ColumnType::parse("varchar(abc)", Dialect::PostgreSQL).unwrap_err();
        assert!(err.reason.contains("abc"), "unexpected reason: {}", err.reason);
    }

    #[test]
    fn test_timestamps_with_time_zone() {
        assert_eq!(
            pg("timestamp(3) with time zone"),
            ColumnType::Timestamp {
                precision: Some(3),
                with_tz: true
            }
        );
        assert_eq!(pg("timestamptz"), pg("timestamp with time zone"));
        assert_eq!(
            pg("timestamp without time zone").to_sql(Dialect::PostgreSQL),
            "timestamp"
        );
    }

    #[test]
    fn test_arrays() {
        let ty = pg("text[][]");
        assert_eq!(
            ty,
            ColumnType::Array {
                element: Box::new(ColumnType::Text),
                dimensions: 2
            }
        );
        assert_eq!(ty.to_sql(Dialect::PostgreSQL), "text[][]");

        let custom = pg("mood[]");
        assert_eq!(custom.to_sql(Dialect::PostgreSQL), "mood[]");
    }

    #[test]
    fn test_unknown_types_are_preserved() {
        let ty = ColumnType::parse("enum('a','b')", Dialect::MySQL).unwrap();
        assert_eq!(ty.to_sql(Dialect::MySQL), "enum('a','b')");

        let ty = ColumnType::parse("nvarchar(max)", Dialect::MSSQL).unwrap();
        assert_eq!(
            ty,
            ColumnType::Custom {
                name: "nvarchar(max)".into()
            }
        );

        assert_eq!(pg("geometry(Point, 4326)").to_sql(Dialect::PostgreSQL), "geometry(Point, 4326)");
    }

    #[test]
    fn test_dialect_rendering() {
        assert_eq!(ColumnType::Boolean.to_sql(Dialect::MSSQL), "bit");
        assert_eq!(ColumnType::Boolean.to_sql(Dialect::SQLite), "integer");
        assert_eq!(ColumnType::Uuid.to_sql(Dialect::MSSQL), "uniqueidentifier");
        assert_eq!(ColumnType::Double.to_sql(Dialect::PostgreSQL), "double precision");
        assert_eq!(
            ColumnType::Timestamp {
                precision: None,
                with_tz: true
            }
            .to_sql(Dialect::MSSQL),
            "datetimeoffset"
        );
    }

    #[test]
    fn test_mssql_bit_is_boolean() {
        let ty = ColumnType::parse("bit", Dialect::MSSQL).unwrap();
        assert!(ty.is_boolean());
    }
}
