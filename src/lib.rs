//! # FlowQL
//!
//! A query translator for a flow-observability platform: compiles the
//! FlowQL analytical SQL dialect into canonical ClickHouse SQL.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowql::prelude::*;
//!
//! let registry = Registry::load(Path::new("db_descriptions"))?;
//! let sql = translate(&registry, "flow_log", "select byte from l4_flow_log")?;
//! assert_eq!(sql, "SELECT byte_tx+byte_rx AS byte FROM flow_log.l4_flow_log");
//! ```
//!
//! ## Architecture
//!
//! The translator is a pure function from (input SQL, descriptors) to output
//! SQL, built as a short pipeline:
//!
//! ```text
//! input SQL ──parse──▶ Statement ──engine──▶ Model ──plan──▶ SubViews ──▶ output SQL
//!                          │                    ▲
//!                          └── Registry ────────┘
//!                              (descriptors, loaded once)
//! ```
//!
//! Aggregates that cannot be computed in a single pass split the query into
//! an inner subquery (per-interval bindings such as `SUM(x) AS _sum_x`) and
//! an outer tier that combines them (`MAX(_sum_x)`); enum-typed tags add a
//! final translation tier. The [`view`] module owns that layering; the
//! [`engine`] decides when it applies.

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod parse;
pub mod view;

pub use engine::{translate, Engine};
pub use error::{QueryError, QueryResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::descriptor::{Descriptor, LoadError, Registry};
    pub use crate::engine::{translate, Engine};
    pub use crate::error::{QueryError, QueryResult};
}
