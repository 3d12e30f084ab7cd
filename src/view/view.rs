//! Layering planner and SQL serializer.
//!
//! A [`View`] turns a [`Model`] into an ordered chain of [`SubView`]s —
//! inner aggregation, metrics aggregation, translation — then links each
//! tier's FROM to the previous tier and writes the outermost one.

use super::filter::Filters;
use super::model::{MetricsLevel, Model};
use super::node::{FuncFlag, Group, GroupFlag, Limit, Node, Order, Tag, TagFlag, With};

/// A FROM-clause entry: a literal table or a nested subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum FromEntry {
    Table(String),
    Sub(Box<SubView>),
}

impl FromEntry {
    pub fn write_to(&self, buf: &mut String) {
        match self {
            FromEntry::Table(name) => buf.push_str(name),
            FromEntry::Sub(sub) => {
                buf.push('(');
                sub.write_to(buf);
                buf.push(')');
            }
        }
    }
}

/// One tier of the emitted SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubView {
    pub tags: Vec<Node>,
    pub filters: Filters,
    pub from: Vec<FromEntry>,
    pub groups: Vec<Group>,
    pub havings: Filters,
    pub orders: Vec<Order>,
    pub limit: Limit,
}

/// Keep the first occurrence of each serialized string.
fn dedup_by_sql<T, F: Fn(&T) -> String>(items: &[T], key: F) -> Vec<&T> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let k = key(item);
        if !seen.contains(&k) {
            seen.push(k);
            out.push(item);
        }
    }
    out
}

impl SubView {
    /// WITH bindings contributed by every node of this tier.
    fn withs(&self) -> Vec<&With> {
        let mut withs: Vec<&With> = Vec::new();
        for tag in &self.tags {
            withs.extend(tag.withs());
        }
        withs.extend(self.filters.withs());
        for group in &self.groups {
            withs.extend(&group.withs);
        }
        withs.extend(self.havings.withs());
        withs
    }

    pub fn write_to(&self, buf: &mut String) {
        let withs = self.withs();
        if !withs.is_empty() {
            let withs = dedup_by_sql(&withs, |w| w.to_sql_string());
            buf.push_str("WITH ");
            for (i, w) in withs.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                w.write_to(buf);
            }
            buf.push(' ');
        }
        if !self.tags.is_empty() {
            let tags = dedup_by_sql(&self.tags, |t| t.to_sql_string());
            buf.push_str("SELECT ");
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                tag.write_to(buf);
            }
        }
        if !self.from.is_empty() {
            buf.push_str(" FROM ");
            for (i, entry) in self.from.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                entry.write_to(buf);
            }
        }
        if !self.filters.is_empty() {
            buf.push_str(" PREWHERE ");
            self.filters.write_to(buf);
        }
        if !self.groups.is_empty() {
            let groups = dedup_by_sql(&self.groups, |g| g.to_sql_string());
            buf.push_str(" GROUP BY ");
            for (i, group) in groups.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                group.write_to(buf);
            }
        }
        if !self.havings.is_empty() {
            buf.push_str(" HAVING ");
            self.havings.write_to(buf);
        }
        if !self.orders.is_empty() {
            buf.push_str(" ORDER BY ");
            for (i, order) in self.orders.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                order.write_to(buf);
            }
        }
        self.limit.write_to(buf);
    }

    pub fn to_sql_string(&self) -> String {
        let mut buf = String::new();
        self.write_to(&mut buf);
        buf
    }
}

/// Plans and serializes the tier chain for one model.
#[derive(Debug)]
pub struct View {
    model: Model,
}

impl View {
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    /// Produce the final SQL string.
    pub fn to_sql(self) -> String {
        let mut levels = Self::plan(self.model);

        // Link each tier's FROM to the tier below it, then write the
        // outermost tier. The chain is strict: every subview is referenced
        // by at most one successor.
        let mut chained: Option<SubView> = None;
        for mut level in levels.drain(..) {
            if let Some(prev) = chained.take() {
                level.from.push(FromEntry::Sub(Box::new(prev)));
            }
            chained = Some(level);
        }

        match chained {
            Some(outermost) => outermost.to_sql_string(),
            None => String::new(),
        }
    }

    /// Split the model into its tier chain.
    fn plan(model: Model) -> Vec<SubView> {
        let mut tags_inner: Vec<Node> = Vec::new();
        let mut tags_metrics: Vec<Node> = Vec::new();
        let mut tags_trans: Vec<Node> = Vec::new();
        let mut funcs_inner: Vec<Node> = Vec::new();
        let mut funcs_metrics: Vec<Node> = Vec::new();
        let mut inner_names: Vec<String> = Vec::new();

        for node in model.tags {
            match &node {
                Node::Tag(tag) => match tag.flag {
                    TagFlag::Metrics => {
                        // The metrics tier re-selects the tag by its inner
                        // visible name.
                        let visible = tag.visible_name().to_string();
                        inner_names.push(visible.clone());
                        tags_metrics.push(Node::Tag(Tag::new(visible)));
                        tags_inner.push(node);
                    }
                    TagFlag::Trans => tags_trans.push(node),
                    TagFlag::MetricsInner => {
                        inner_names.push(tag.visible_name().to_string());
                        funcs_inner.push(node);
                    }
                    TagFlag::MetricsOuter => funcs_metrics.push(node),
                },
                Node::Func(func) => match func.flag {
                    FuncFlag::Inner => funcs_inner.push(node),
                    FuncFlag::Outer => funcs_metrics.push(node),
                },
            }
        }

        let mut levels = Vec::new();
        match model.metrics_level {
            MetricsLevel::Unlay => {
                // Single tier: inner tags plus the direct metric forms,
                // carrying every clause of the model unchanged.
                let mut tags = tags_inner;
                tags.extend(funcs_metrics);
                levels.push(SubView {
                    tags,
                    filters: model.filters,
                    from: model.from.into_iter().map(FromEntry::Table).collect(),
                    groups: model.groups,
                    havings: model.havings,
                    orders: model.orders,
                    limit: model.limit,
                });
            }
            MetricsLevel::Layered => {
                let mut groups_inner: Vec<Group> = Vec::new();
                let mut groups_metrics: Vec<Group> = Vec::new();
                let mut group_values_inner: Vec<String> = Vec::new();
                for group in model.groups {
                    match group.flag {
                        GroupFlag::Default => {
                            groups_metrics.push(Group::new(group.value.clone()));
                            group_values_inner.push(group.value.clone());
                            groups_inner.push(group);
                        }
                        GroupFlag::MetricsInner => groups_inner.push(group),
                        GroupFlag::MetricsOuter => groups_metrics.push(group),
                    }
                }

                // Every inner group key must be selectable by the metrics
                // tier; synthesize bare tags for keys the user did not
                // project.
                for value in &group_values_inner {
                    if !inner_names.iter().any(|n| n == value) {
                        tags_inner.push(Node::Tag(Tag::new(value.clone())));
                    }
                }

                let mut inner_tags = tags_inner;
                inner_tags.extend(funcs_inner);
                levels.push(SubView {
                    tags: inner_tags,
                    filters: model.filters,
                    from: model.from.into_iter().map(FromEntry::Table).collect(),
                    groups: groups_inner,
                    ..Default::default()
                });

                let mut metrics_tags = tags_metrics;
                metrics_tags.extend(funcs_metrics);
                levels.push(SubView {
                    tags: metrics_tags,
                    groups: groups_metrics,
                    havings: model.havings,
                    orders: model.orders,
                    limit: model.limit,
                    ..Default::default()
                });
            }
        }

        if !tags_trans.is_empty() {
            levels.push(SubView {
                tags: tags_trans,
                ..Default::default()
            });
        }

        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::node::FuncNode;

    #[test]
    fn test_unlay_single_tier() {
        let mut model = Model::new();
        model.add_tag(Node::Tag(Tag::new("byte_tx+byte_rx").with_alias("byte")));
        model.add_table("flow_log.l4_flow_log");
        let sql = View::new(model).to_sql();
        assert_eq!(sql, "SELECT byte_tx+byte_rx AS byte FROM flow_log.l4_flow_log");
    }

    #[test]
    fn test_layered_nests_from() {
        let mut model = Model::new();
        model.metrics_level = MetricsLevel::Layered;
        model.add_tag(Node::Func(FuncNode::inner("SUM(byte_tx)", "_sum_byte_tx")));
        model.add_tag(Node::Func(FuncNode::outer("MAX(_sum_byte_tx)", "max_byte_tx")));
        model.add_table("flow_log.l4_flow_log");
        let sql = View::new(model).to_sql();
        assert_eq!(
            sql,
            "SELECT MAX(_sum_byte_tx) AS max_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log)"
        );
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let nodes = vec![
            Node::Tag(Tag::new("a")),
            Node::Tag(Tag::new("b")),
            Node::Tag(Tag::new("a")),
        ];
        let once: Vec<String> = dedup_by_sql(&nodes, |n| n.to_sql_string())
            .into_iter()
            .map(|n| n.to_sql_string())
            .collect();
        let deduped: Vec<Node> = dedup_by_sql(&nodes, |n| n.to_sql_string())
            .into_iter()
            .cloned()
            .collect();
        let twice: Vec<String> = dedup_by_sql(&deduped, |n| n.to_sql_string())
            .into_iter()
            .map(|n| n.to_sql_string())
            .collect();
        assert_eq!(once, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_group_key_synthesized_in_inner_select() {
        let mut model = Model::new();
        model.metrics_level = MetricsLevel::Layered;
        model.add_tag(Node::Func(FuncNode::inner("SUM(byte_tx)", "_sum_byte_tx")));
        model.add_tag(Node::Func(FuncNode::outer("MAX(_sum_byte_tx)", "max_byte_tx")));
        model.add_table("flow_log.l4_flow_log");
        model.add_group(Group::new("pod"));
        let sql = View::new(model).to_sql();
        assert_eq!(
            sql,
            "SELECT MAX(_sum_byte_tx) AS max_byte_tx FROM (SELECT pod, SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log GROUP BY pod) GROUP BY pod"
        );
    }

    #[test]
    fn test_trans_tier_wraps_everything() {
        let mut model = Model::new();
        model.add_tag(Node::Tag(Tag::new("tap_side").with_alias("_tap_side")));
        model.add_tag(Node::Tag(
            Tag::new("transform(_tap_side, [0, 1, 2], ['rest', 'c', 's'], '')")
                .with_alias("tap_side")
                .with_flag(TagFlag::Trans),
        ));
        model.add_table("flow_log.l4_flow_log");
        let sql = View::new(model).to_sql();
        assert_eq!(
            sql,
            "SELECT transform(_tap_side, [0, 1, 2], ['rest', 'c', 's'], '') AS tap_side FROM (SELECT tap_side AS _tap_side FROM flow_log.l4_flow_log)"
        );
    }
}
