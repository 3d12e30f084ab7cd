//! `time(col, step)` bucketing.
//!
//! The bucketing tag rounds rows down to `step`-second intervals and expands
//! each bucket into `window_size` reporting rows via `arrayJoin`. In a
//! layered query the inner tier first rounds to the datasource interval and
//! binds it as `_time`; the outer tier re-buckets `_time` to the requested
//! step.

use crate::view::{Group, GroupFlag, Model, Node, Tag, TagFlag, With};

/// One `time(col, step) AS alias` projection.
#[derive(Debug, Clone)]
pub struct TimeBucket {
    pub column: String,
    pub step: u64,
    pub alias: String,
}

impl TimeBucket {
    pub fn new(column: impl Into<String>, step: u64, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            step,
            alias: alias.into(),
        }
    }

    /// `0, 1, ...` offsets covering the window.
    fn window_list(window_size: u64) -> String {
        (0..window_size.max(1))
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Rounded-and-expanded bucket expression over `source`.
    fn bucket_with(&self, source: &str, window_size: u64) -> With {
        With::new(
            format!(
                "toStartOfInterval({source}, toIntervalSecond({step})) + toIntervalSecond(arrayJoin([{list}]) * {step})",
                step = self.step,
                list = Self::window_list(window_size),
            ),
            format!("_time_{}", self.step),
        )
    }

    /// Single-tier form: bucket the raw column directly.
    pub fn apply_unlay(&self, model: &mut Model) {
        model.time.add_interval(self.step);
        let with = self.bucket_with(&self.column, model.time.window_size);
        let internal = with.alias.clone();
        model.add_tag(Node::Tag(
            Tag::new(format!("toUnixTimestamp({internal})"))
                .with_alias(self.alias.clone())
                .with_withs(vec![with]),
        ));
        model.add_group(Group::new(self.alias.clone()));
    }

    /// Layered form: the inner tier groups rows to the datasource interval
    /// as `_time`; the outer tier re-buckets `_time` to the requested step.
    pub fn apply_layered(&self, model: &mut Model) {
        model.time.add_interval(self.step);

        let inner_with = With::new(
            format!(
                "toStartOfInterval({}, toIntervalSecond({}))",
                self.column, model.time.datasource_interval
            ),
            "_time",
        );
        model.add_tag(Node::Tag(
            Tag::new("_time")
                .with_flag(TagFlag::MetricsInner)
                .with_withs(vec![inner_with]),
        ));
        model.add_group(Group::new("_time").with_flag(GroupFlag::MetricsInner));

        let outer_with = self.bucket_with("_time", model.time.window_size);
        let internal = outer_with.alias.clone();
        model.add_tag(Node::Tag(
            Tag::new(format!("toUnixTimestamp({internal})"))
                .with_alias(self.alias.clone())
                .with_flag(TagFlag::MetricsOuter)
                .with_withs(vec![outer_with]),
        ));
        model.add_group(Group::new(self.alias.clone()).with_flag(GroupFlag::MetricsOuter));
    }
}
