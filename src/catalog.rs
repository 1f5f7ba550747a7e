// ABOUTME: Table-schema catalog consumed by the backup engine
// ABOUTME: Validates descriptors, loads them from TOML, and computes a deterministic schema hash

use crate::error::BackupError;
use crate::utils;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Record type tag reserved for the meta record; no table may use it.
pub const RESERVED_TABLE_NAME: &str = "meta";

/// Closed set of column kinds driving value conversion
///
/// Kinds describe how a value travels through the backup stream, not the exact SQL type
/// of the column. Anything the catalog spells in an unrecognised way becomes
/// [`ColumnKind::Opaque`] and is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnKind {
    Bool,
    Int { bits: u8 },
    Uint { bits: u8 },
    Float { bits: u8 },
    Timestamp,
    Bytes,
    Json,
    Text,
    Opaque(String),
}

impl ColumnKind {
    /// Whether the kind holds integers (signed or unsigned)
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Int { .. } | ColumnKind::Uint { .. })
    }
}

impl FromStr for ColumnKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ColumnKind::Bool,
            "int8" | "tinyint" => ColumnKind::Int { bits: 8 },
            "int16" | "smallint" => ColumnKind::Int { bits: 16 },
            "int32" | "int" | "integer" => ColumnKind::Int { bits: 32 },
            "int64" | "bigint" => ColumnKind::Int { bits: 64 },
            "uint8" => ColumnKind::Uint { bits: 8 },
            "uint16" => ColumnKind::Uint { bits: 16 },
            "uint32" | "uint" => ColumnKind::Uint { bits: 32 },
            "uint64" => ColumnKind::Uint { bits: 64 },
            "float32" | "real" => ColumnKind::Float { bits: 32 },
            "float64" | "double" | "float" => ColumnKind::Float { bits: 64 },
            "timestamp" | "datetime" | "timestamptz" => ColumnKind::Timestamp,
            "bytes" | "blob" | "bytea" => ColumnKind::Bytes,
            "json" | "jsonb" => ColumnKind::Json,
            "text" | "string" | "varchar" => ColumnKind::Text,
            other => ColumnKind::Opaque(other.to_string()),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ColumnKind {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnKind> for String {
    fn from(kind: ColumnKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Bool => write!(f, "bool"),
            ColumnKind::Int { bits } => write!(f, "int{}", bits),
            ColumnKind::Uint { bits } => write!(f, "uint{}", bits),
            ColumnKind::Float { bits } => write!(f, "float{}", bits),
            ColumnKind::Timestamp => write!(f, "timestamp"),
            ColumnKind::Bytes => write!(f, "bytes"),
            ColumnKind::Json => write!(f, "json"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Opaque(name) => write!(f, "{}", name),
        }
    }
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    #[serde(default)]
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_index(mut self, name: &str, unique: bool, columns: &[&str]) -> Self {
        self.indexes.push(IndexSchema {
            name: name.to_string(),
            unique,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns used to order rows during export: the primary key, or every column
    pub fn order_columns(&self) -> Vec<&str> {
        if self.primary_key.is_empty() {
            self.column_names()
        } else {
            self.primary_key.iter().map(String::as_str).collect()
        }
    }

    /// Column set deciding whether an imported row updates or inserts
    ///
    /// The primary key wins; otherwise the first unique index. `None` means the table is
    /// written with plain inserts.
    pub fn conflict_key(&self) -> Option<Vec<&str>> {
        if !self.primary_key.is_empty() {
            return Some(self.primary_key.iter().map(String::as_str).collect());
        }
        self.indexes
            .iter()
            .find(|idx| idx.unique && !idx.columns.is_empty())
            .map(|idx| idx.columns.iter().map(String::as_str).collect())
    }

    /// Positions of the `auto_increment` columns within a row
    pub fn increment_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.auto_increment)
            .map(|(idx, _)| idx)
    }

    fn validate(&self) -> Result<(), String> {
        utils::validate_identifier(&self.name).map_err(|e| e.to_string())?;

        if self.name.eq_ignore_ascii_case(RESERVED_TABLE_NAME) {
            return Err(format!(
                "table name '{}' is reserved for the meta record",
                self.name
            ));
        }

        if self.columns.is_empty() {
            return Err(format!("table '{}' has no columns", self.name));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            utils::validate_identifier(&column.name)
                .map_err(|e| format!("table '{}': {}", self.name, e))?;
            if !seen.insert(column.name.as_str()) {
                return Err(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, column.name
                ));
            }
            if column.auto_increment && !column.kind.is_integer() {
                return Err(format!(
                    "column {}.{} is auto_increment but of kind {}",
                    self.name, column.name, column.kind
                ));
            }
        }

        for key in &self.primary_key {
            if !seen.contains(key.as_str()) {
                return Err(format!(
                    "table '{}' primary key names unknown column '{}'",
                    self.name, key
                ));
            }
        }

        for index in &self.indexes {
            utils::validate_identifier(&index.name)
                .map_err(|e| format!("table '{}': {}", self.name, e))?;
            if let Some(missing) = index.columns.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(format!(
                    "index '{}' on table '{}' names unknown column '{}'",
                    index.name, self.name, missing
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<TableSchema>,
}

/// Read-only set of table descriptors, indexed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableSchema>,
}

impl Catalog {
    pub fn new(tables: Vec<TableSchema>) -> Result<Self> {
        let mut indexed = BTreeMap::new();
        for table in tables {
            table.validate().map_err(BackupError::InvalidCatalog)?;
            let key = table.name.to_lowercase();
            if indexed.contains_key(&key) {
                return Err(BackupError::InvalidCatalog(format!(
                    "table '{}' is declared more than once",
                    table.name
                ))
                .into());
            }
            indexed.insert(key, table);
        }
        Ok(Self { tables: indexed })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let parsed: CatalogFile = toml::from_str(raw).context("Failed to parse catalog TOML")?;
        Self::new(parsed.tables)
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file at {}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid catalog file at {}", path))
    }

    /// Look up a table by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_lowercase())
    }

    /// All tables, ordered by lowercase name
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Deterministic SHA-256 over table, column, primary-key and index metadata
    pub fn schema_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for table in self.tables.values() {
            hasher.update(format!("table:{}\n", table.name).as_bytes());
            for column in &table.columns {
                hasher.update(
                    format!(
                        "column:{}:{}:{}:{}:{}\n",
                        column.name,
                        column.kind,
                        column.nullable,
                        column.unique,
                        column.auto_increment
                    )
                    .as_bytes(),
                );
            }
            hasher.update(format!("pk:{}\n", table.primary_key.join(",")).as_bytes());

            let mut indexes: Vec<&IndexSchema> = table.indexes.iter().collect();
            indexes.sort_by(|a, b| a.name.cmp(&b.name));
            for index in indexes {
                hasher.update(
                    format!(
                        "index:{}:{}:{}\n",
                        index.name,
                        index.unique,
                        index.columns.join(",")
                    )
                    .as_bytes(),
                );
            }
        }
        format!("{:x}", hasher.finalize())
    }
}
