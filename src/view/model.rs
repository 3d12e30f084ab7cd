//! The mutable query model populated during parsing.

use super::filter::Filters;
use super::node::{Group, Limit, Node, Order};

/// Query time window and bucketing parameters.
///
/// Bounds use 0 as "unset"; repeated constraints intersect — the lower bound
/// only ever rises and the upper bound only ever falls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Time {
    pub time_start: i64,
    pub time_end: i64,
    /// User-requested reporting step, seconds. 0 until a `time()` call sets it.
    pub interval: u64,
    /// Base step of the underlying datasource, seconds.
    pub datasource_interval: u64,
    pub window_size: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            time_start: 0,
            time_end: 0,
            interval: 0,
            datasource_interval: 60,
            window_size: 1,
        }
    }
}

impl Time {
    pub fn add_time_start(&mut self, time_start: i64) {
        if time_start > self.time_start {
            self.time_start = time_start;
        }
    }

    pub fn add_time_end(&mut self, time_end: i64) {
        if self.time_end == 0 || time_end < self.time_end {
            self.time_end = time_end;
        }
    }

    pub fn add_interval(&mut self, interval: u64) {
        self.interval = interval;
    }

    pub fn add_window_size(&mut self, window_size: u64) {
        self.window_size = window_size;
    }

    /// Interval used by `Time_interval` references: the requested step, or
    /// the datasource step when no `time()` grouping set one.
    pub fn effective_interval(&self) -> u64 {
        if self.interval > 0 {
            self.interval
        } else {
            self.datasource_interval
        }
    }

    /// Number of datasource buckets the window spans. Used by Spread and
    /// Rspread to detect missing buckets.
    pub fn bucket_count(&self) -> u64 {
        if self.time_end > self.time_start && self.datasource_interval > 0 {
            (self.time_end - self.time_start) as u64 / self.datasource_interval + 1
        } else {
            1
        }
    }
}

/// Whether the metrics tier is split into inner and outer subqueries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsLevel {
    #[default]
    Unlay,
    Layered,
}

/// Accumulates every node parsed from the input statement. Insertion order
/// is preserved and drives projection order in the output.
#[derive(Debug, Default)]
pub struct Model {
    pub time: Time,
    pub tags: Vec<Node>,
    pub filters: Filters,
    pub havings: Filters,
    pub from: Vec<String>,
    pub groups: Vec<Group>,
    pub orders: Vec<Order>,
    pub limit: Limit,
    pub metrics_level: MetricsLevel,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, node: Node) {
        self.tags.push(node);
    }

    pub fn add_table(&mut self, value: impl Into<String>) {
        self.from.push(value.into());
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }
}
