//! Storage column types per dialect

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static VARCHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^VARCHAR\(\d+\)$").expect("varchar regex is valid"));

/// Storage dialect a form declares in its `db` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
    Mongo,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mongo => "mongo",
        }
    }

    fn is_sql(self) -> bool {
        !matches!(self, Self::Mongo)
    }

    /// Dialect type for a logical type name (STRING, NUMBER, ...)
    fn logical(self, name: &str) -> Option<&'static str> {
        let mapped = match (self, name) {
            (Self::Mysql | Self::Postgres | Self::Sqlite, "STRING") => "VARCHAR(255)",
            (Self::Mysql | Self::Postgres | Self::Sqlite, "TEXT") => "TEXT",
            (Self::Mysql, "NUMBER") => "INT",
            (Self::Postgres | Self::Sqlite, "NUMBER") => "INTEGER",
            (Self::Mysql | Self::Postgres, "BOOLEAN") => "BOOLEAN",
            (Self::Sqlite, "BOOLEAN") => "INTEGER",
            (Self::Mysql, "DATETIME") => "DATETIME",
            (Self::Postgres, "DATETIME") => "TIMESTAMP",
            (Self::Sqlite, "DATETIME" | "JSON" | "OBJECT") => "TEXT",
            (Self::Mysql, "JSON" | "OBJECT") => "JSON",
            (Self::Postgres, "JSON" | "OBJECT") => "JSONB",
            (Self::Mongo, "STRING" | "TEXT") => "string",
            (Self::Mongo, "NUMBER") => "int",
            (Self::Mongo, "BOOLEAN") => "bool",
            (Self::Mongo, "DATETIME") => "date",
            (Self::Mongo, "OBJECT" | "JSON") => "object",
            _ => return None,
        };
        Some(mapped)
    }

    /// Native types accepted verbatim
    pub fn native_types(self) -> &'static [&'static str] {
        match self {
            Self::Mysql => &["VARCHAR(255)", "TEXT", "INT", "BOOLEAN", "DATETIME", "JSON"],
            Self::Postgres => &["TEXT", "VARCHAR(255)", "INTEGER", "BOOLEAN", "TIMESTAMP", "JSONB"],
            Self::Sqlite => &["TEXT", "VARCHAR(255)", "INTEGER", "REAL", "NUMERIC", "BLOB"],
            Self::Mongo => &["string", "int", "bool", "date", "object"],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "mongo" => Ok(Self::Mongo),
            other => Err(format!(
                "unknown db '{other}', expected one of sqlite, postgres, mysql, mongo"
            )),
        }
    }
}

/// Resolve a declared `db_type` into the column type used by `dialect`
pub fn column_type(dialect: Dialect, declared: &str) -> Result<String, String> {
    let normalized = declared.trim().to_ascii_uppercase();

    if let Some(mapped) = dialect.logical(&normalized) {
        return Ok(mapped.to_string());
    }

    if let Some(native) = dialect
        .native_types()
        .iter()
        .find(|native| native.eq_ignore_ascii_case(&normalized))
    {
        return Ok((*native).to_string());
    }

    if dialect.is_sql() && VARCHAR.is_match(&normalized) {
        return Ok(normalized);
    }

    Err(format!(
        "invalid db_type '{declared}' for {dialect}, allowed: {}",
        dialect.native_types().join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_names_map_per_dialect() {
        assert_eq!(column_type(Dialect::Postgres, "json").unwrap(), "JSONB");
        assert_eq!(column_type(Dialect::Sqlite, "boolean").unwrap(), "INTEGER");
        assert_eq!(column_type(Dialect::Mysql, "Number").unwrap(), "INT");
        assert_eq!(column_type(Dialect::Mongo, "datetime").unwrap(), "date");
    }

    #[test]
    fn native_and_varchar_types_pass_through() {
        assert_eq!(column_type(Dialect::Postgres, "timestamp").unwrap(), "TIMESTAMP");
        assert_eq!(column_type(Dialect::Mongo, "bool").unwrap(), "bool");
        assert_eq!(column_type(Dialect::Mysql, "varchar(32)").unwrap(), "VARCHAR(32)");
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(column_type(Dialect::Mongo, "VARCHAR(10)").is_err());
        assert!(column_type(Dialect::Sqlite, "UUID").is_err());
    }

    #[test]
    fn dialect_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
