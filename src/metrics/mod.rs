//! Metric aggregation machinery.
//!
//! Every aggregate the dialect exposes ([`AggKind`]) knows three renderings:
//!
//! - an **inner binding** contributed to the inner subquery
//!   (`SUM(x) AS _sum_x`, `groupArrayIf(x, x != 0) AS _grouparray_x`),
//! - an **outer form** that references the binding from the metrics tier
//!   (`MAX(_sum_x)`, `AVGArray(arrayFilter(x -> x!=0, _grouparray_x))`),
//! - where one exists, a **direct form** usable when the whole query stays
//!   in a single tier (`SUM(x)`, `AVGIf(x, x != 0)`).
//!
//! Arithmetic over aggregates is a [`MetricExpr`] tree rendered as
//! `plus/minus/multiply/divide` calls. `time(col, step)` bucketing lives in
//! [`time_bucket`].

mod function;
mod time_bucket;

pub use function::{AggKind, ArithOp, FuncCall, MetricExpr, MetricField};
pub use time_bucket::TimeBucket;

/// Derive an identifier fragment from a server-side expression by spelling
/// out operator characters (`byte_tx+byte_rx` → `byte_tx_plus_byte_rx`).
pub fn format_field(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    for c in expr.chars() {
        match c {
            '+' => out.push_str("_plus_"),
            '-' => out.push_str("_minus_"),
            '*' => out.push_str("_multiply_"),
            '/' => out.push_str("_div_"),
            '(' | ')' | ',' | '.' | ' ' => out.push('_'),
            _ => out.push(c),
        }
    }
    out
}
