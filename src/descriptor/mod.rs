//! Description registry: per-database column metadata.
//!
//! Every logical column a query may reference is described by a row in a
//! descriptor file: its client-facing name, the server-side expression it
//! expands to, its type, and (for enum types) the enum table that maps raw
//! values to display names.
//!
//! The registry is loaded once at process start and is read-only afterwards;
//! share it behind an `Arc` and read without synchronization.
//!
//! # Example
//!
//! ```ignore
//! use flowql::descriptor::Registry;
//!
//! let registry = Registry::load(Path::new("db_descriptions"))?;
//! let byte = registry.lookup("flow_log", "byte")?;
//! assert_eq!(byte.server_name, "byte_tx+byte_rx");
//! ```

mod loader;

pub use loader::LoadError;

use std::collections::HashMap;
use std::path::Path;

/// Result type for registry operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Column type tag, one per descriptor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Id,
    Time,
    Resource,
    Ip,
    Int,
    IntEnum,
    String,
    StringEnum,
    Map,
}

impl ColumnType {
    /// Parse the `Type` column of a descriptor row.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(ColumnType::Id),
            "time" => Some(ColumnType::Time),
            "resource" => Some(ColumnType::Resource),
            "ip" => Some(ColumnType::Ip),
            "int" => Some(ColumnType::Int),
            "int_enum" => Some(ColumnType::IntEnum),
            "string" => Some(ColumnType::String),
            "string_enum" => Some(ColumnType::StringEnum),
            "map" => Some(ColumnType::Map),
            _ => None,
        }
    }

    /// True for the enum-typed columns that go through the translation tier.
    pub fn is_enum(self) -> bool {
        matches!(self, ColumnType::IntEnum | ColumnType::StringEnum)
    }
}

/// Aggregation class of a metric column, derived from its category.
///
/// Zero-masked metrics are latency-like: a stored zero means "not measured"
/// and must be filtered out of every aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricClass {
    /// Summable counter (bytes, packets, row counts).
    Counter,
    /// Zero-masked measurement (rtt, srt and friends).
    Delay,
}

/// Per-audience read permission, a 3-digit bitmask in the descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission(pub [bool; 3]);

impl Permission {
    pub fn parse(s: &str) -> Option<Self> {
        let mut bits = [false; 3];
        if s.len() != 3 {
            return None;
        }
        for (i, c) in s.chars().enumerate() {
            bits[i] = match c {
                '0' => false,
                '1' => true,
                _ => return None,
            };
        }
        Some(Permission(bits))
    }

    pub fn allows(&self, audience: usize) -> bool {
        self.0.get(audience).copied().unwrap_or(false)
    }
}

/// Immutable metadata for one logical column.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Name the query dialect uses.
    pub name: String,
    /// Alias presented back to clients (usually equal to `name`).
    pub client_name: String,
    /// Server-side expression the name expands to.
    pub server_name: String,
    /// Type tag.
    pub kind: ColumnType,
    /// Enum table reference for `int_enum` / `string_enum` columns.
    pub enum_file: Option<String>,
    /// Display category; selects the aggregation class for metrics.
    pub category: String,
    /// Audience permission bits.
    pub permission: Permission,
    /// Deprecated columns still resolve but are logged.
    pub deprecated: bool,
}

impl Descriptor {
    /// Aggregation class when this descriptor names a metric.
    pub fn metric_class(&self) -> MetricClass {
        if self.category.eq_ignore_ascii_case("delay") {
            MetricClass::Delay
        } else {
            MetricClass::Counter
        }
    }
}

/// One entry of an enum table: raw value and its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub value: String,
    pub display: String,
}

/// All descriptors of a single database, split into tags and metrics.
///
/// Insertion order of the files is preserved; lookups go through name
/// indexes built at load time.
#[derive(Debug, Default)]
pub struct Database {
    tags: Vec<Descriptor>,
    metrics: Vec<Descriptor>,
    tag_index: HashMap<String, usize>,
    metric_index: HashMap<String, usize>,
}

impl Database {
    pub(crate) fn push_tag(&mut self, d: Descriptor) {
        self.tag_index.insert(d.name.clone(), self.tags.len());
        self.tags.push(d);
    }

    pub(crate) fn push_metric(&mut self, d: Descriptor) {
        self.metric_index.insert(d.name.clone(), self.metrics.len());
        self.metrics.push(d);
    }

    pub fn tag(&self, name: &str) -> Option<&Descriptor> {
        self.tag_index.get(name).map(|&i| &self.tags[i])
    }

    pub fn metric(&self, name: &str) -> Option<&Descriptor> {
        self.metric_index.get(name).map(|&i| &self.metrics[i])
    }

    pub fn tags(&self) -> &[Descriptor] {
        &self.tags
    }

    pub fn metrics(&self) -> &[Descriptor] {
        &self.metrics
    }
}

/// Process-wide description registry. Load once, then read-only.
#[derive(Debug, Default)]
pub struct Registry {
    databases: HashMap<String, Database>,
    enums: HashMap<String, Vec<EnumValue>>,
}

impl Registry {
    /// Load every database directory and enum table under `dir`.
    pub fn load(dir: &Path) -> LoadResult<Registry> {
        loader::load_dir(dir)
    }

    pub(crate) fn insert_database(&mut self, name: String, db: Database) {
        self.databases.insert(name, db);
    }

    pub(crate) fn insert_enum(&mut self, name: String, values: Vec<EnumValue>) {
        self.enums.insert(name, values);
    }

    pub fn database(&self, db: &str) -> Option<&Database> {
        self.databases.get(db)
    }

    /// Look up a descriptor by name, searching tags first, then metrics.
    ///
    /// Fails with [`LoadError::NotFound`] when the database or the name is
    /// unknown.
    pub fn lookup(&self, db: &str, name: &str) -> LoadResult<&Descriptor> {
        self.database(db)
            .and_then(|d| d.tag(name).or_else(|| d.metric(name)))
            .ok_or_else(|| LoadError::NotFound {
                db: db.to_string(),
                name: name.to_string(),
            })
    }

    /// Look up the values of an enum table.
    pub fn lookup_enum(&self, name: &str) -> LoadResult<&[EnumValue]> {
        self.enums
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| LoadError::NotFound {
                db: "enum".to_string(),
                name: name.to_string(),
            })
    }
}
