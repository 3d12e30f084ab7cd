//! Descriptor file loading.
//!
//! Layout of a descriptions directory:
//!
//! ```text
//! db_descriptions/
//!   flow_log/           one directory per database
//!     tag               tag descriptors
//!     metric            metric descriptors
//!   enum/               shared enum tables, one file per enum
//!     tap_side
//! ```
//!
//! Files are comma-separated with padded whitespace. Lines starting with `#`
//! are column headers, blank lines separate categories; both are skipped.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ColumnType, Database, Descriptor, EnumValue, Permission, Registry};

/// Errors raised while loading or querying the registry.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Identifier (or database) not present in the registry.
    #[error("'{name}' is not described in '{db}'")]
    NotFound { db: String, name: String },

    /// A descriptor row is missing required fields or carries bad values.
    #[error("malformed descriptor row in {file}: {message}")]
    Malformed { file: String, message: String },

    /// Underlying filesystem failure.
    #[error("failed to read descriptions: {0}")]
    Io(#[from] std::io::Error),
}

const ENUM_DIR: &str = "enum";

/// Load a full descriptions directory into a [`Registry`].
pub fn load_dir(dir: &Path) -> Result<Registry, LoadError> {
    let mut registry = Registry::default();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ENUM_DIR {
            load_enums(&entry.path(), &mut registry)?;
        } else {
            let db = load_database(&entry.path())?;
            info!(
                database = %name,
                tags = db.tags().len(),
                metrics = db.metrics().len(),
                "loaded descriptors"
            );
            registry.insert_database(name, db);
        }
    }

    Ok(registry)
}

fn load_database(dir: &Path) -> Result<Database, LoadError> {
    let mut db = Database::default();
    for d in parse_descriptor_file(&dir.join("tag"))? {
        db.push_tag(d);
    }
    for d in parse_descriptor_file(&dir.join("metric"))? {
        db.push_metric(d);
    }
    Ok(db)
}

fn load_enums(dir: &Path, registry: &mut Registry) -> Result<(), LoadError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let values = parse_enum_file(&entry.path())?;
        debug!(name = %name, values = values.len(), "loaded enum table");
        registry.insert_enum(name, values);
    }
    Ok(())
}

/// Parse one descriptor file into rows.
fn parse_descriptor_file(path: &Path) -> Result<Vec<Descriptor>, LoadError> {
    let file = path.display().to_string();
    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        rows.push(parse_descriptor_row(line, &file, lineno + 1)?);
    }

    Ok(rows)
}

fn parse_descriptor_row(line: &str, file: &str, lineno: usize) -> Result<Descriptor, LoadError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 8 {
        return Err(LoadError::Malformed {
            file: file.to_string(),
            message: format!("line {}: expected 8 fields, found {}", lineno, fields.len()),
        });
    }

    let malformed = |message: String| LoadError::Malformed {
        file: file.to_string(),
        message: format!("line {}: {}", lineno, message),
    };

    let name = fields[0];
    if name.is_empty() {
        return Err(malformed("empty Name field".into()));
    }

    let kind = ColumnType::parse(fields[3])
        .ok_or_else(|| malformed(format!("unknown type '{}'", fields[3])))?;
    let permission = Permission::parse(fields[6])
        .ok_or_else(|| malformed(format!("bad permission mask '{}'", fields[6])))?;
    let deprecated = match fields[7] {
        "0" => false,
        "1" => true,
        other => return Err(malformed(format!("bad deprecated flag '{}'", other))),
    };

    if kind.is_enum() && fields[4].is_empty() {
        warn!(column = %name, "enum column without an enum file");
    }

    Ok(Descriptor {
        name: name.to_string(),
        client_name: fields[1].to_string(),
        server_name: fields[2].to_string(),
        kind,
        enum_file: (!fields[4].is_empty()).then(|| fields[4].to_string()),
        category: fields[5].to_string(),
        permission,
        deprecated,
    })
}

/// Parse one enum table: `value, display_name` per row.
fn parse_enum_file(path: &Path) -> Result<Vec<EnumValue>, LoadError> {
    let file = path.display().to_string();
    let content = fs::read_to_string(path)?;
    let mut values = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(LoadError::Malformed {
                file: file.clone(),
                message: format!("line {}: expected 2 fields, found {}", lineno + 1, fields.len()),
            });
        }
        values.push(EnumValue {
            value: fields[0].to_string(),
            display: fields[1].to_string(),
        });
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor_row() {
        let row = "byte      , byte      , byte_tx+byte_rx , int , , Traffic , 111 , 0";
        let d = parse_descriptor_row(row, "metric", 1).unwrap();
        assert_eq!(d.name, "byte");
        assert_eq!(d.server_name, "byte_tx+byte_rx");
        assert_eq!(d.kind, ColumnType::Int);
        assert_eq!(d.enum_file, None);
        assert!(!d.deprecated);
    }

    #[test]
    fn test_parse_descriptor_row_enum() {
        let row = "tap_side , tap_side , tap_side , int_enum , tap_side , Capture , 111 , 0";
        let d = parse_descriptor_row(row, "tag", 1).unwrap();
        assert_eq!(d.kind, ColumnType::IntEnum);
        assert_eq!(d.enum_file.as_deref(), Some("tap_side"));
    }

    #[test]
    fn test_parse_descriptor_row_short() {
        let row = "byte , byte , byte_tx+byte_rx , int";
        let err = parse_descriptor_row(row, "metric", 3).unwrap_err();
        match err {
            LoadError::Malformed { message, .. } => {
                assert!(message.contains("expected 8 fields"));
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_descriptor_row_bad_type() {
        let row = "byte , byte , byte_tx , varchar , , Traffic , 111 , 0";
        assert!(parse_descriptor_row(row, "metric", 1).is_err());
    }
}
