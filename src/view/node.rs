//! Algebraic nodes of the view model.
//!
//! Every element of the emitted SQL is a node that knows how to serialize
//! itself into the output buffer and which `WITH` bindings it depends on.
//! The hierarchy is a flat sum type; adding a variant forces every match
//! site to handle it.

/// Layer flag of a projected tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagFlag {
    /// Projected in the inner tier and re-selected by alias in the metrics
    /// tier.
    #[default]
    Metrics,
    /// Inner tier only.
    MetricsInner,
    /// Metrics tier only.
    MetricsOuter,
    /// Deferred to the final translation tier.
    Trans,
}

/// Tier assignment of a function node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncFlag {
    /// Contributes a binding to the inner subquery.
    Inner,
    /// References inner bindings from the metrics subquery.
    Outer,
}

/// Layer flag of a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupFlag {
    /// Grouped in the inner tier and re-grouped unchanged in the metrics
    /// tier.
    #[default]
    Default,
    MetricsInner,
    MetricsOuter,
}

/// Sort direction; serializes lowercase, `asc` when unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A named CTE binding `expr AS name`, local to one subview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct With {
    pub value: String,
    pub alias: String,
}

impl With {
    pub fn new(value: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            alias: alias.into(),
        }
    }

    pub fn write_to(&self, buf: &mut String) {
        buf.push_str(&self.value);
        buf.push_str(" AS ");
        buf.push_str(&self.alias);
    }

    pub fn to_sql_string(&self) -> String {
        let mut buf = String::new();
        self.write_to(&mut buf);
        buf
    }
}

/// A projected column: server-side expression plus optional alias.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    pub value: String,
    pub alias: String,
    pub flag: TagFlag,
    pub withs: Vec<With>,
}

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_flag(mut self, flag: TagFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_withs(mut self, withs: Vec<With>) -> Self {
        self.withs = withs;
        self
    }

    /// Name under which the next tier can re-select this tag.
    pub fn visible_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.value
        } else {
            &self.alias
        }
    }
}

/// A rendered aggregate (or arithmetic composite over aggregates).
#[derive(Debug, Clone, PartialEq)]
pub struct FuncNode {
    pub expr: String,
    pub alias: String,
    pub flag: FuncFlag,
    pub withs: Vec<With>,
}

impl FuncNode {
    pub fn inner(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
            flag: FuncFlag::Inner,
            withs: Vec::new(),
        }
    }

    pub fn outer(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
            flag: FuncFlag::Outer,
            withs: Vec::new(),
        }
    }

    pub fn with_withs(mut self, withs: Vec<With>) -> Self {
        self.withs = withs;
        self
    }
}

/// A node in a projection list.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Tag(Tag),
    Func(FuncNode),
}

impl Node {
    pub fn write_to(&self, buf: &mut String) {
        let (value, alias) = match self {
            Node::Tag(t) => (&t.value, &t.alias),
            Node::Func(f) => (&f.expr, &f.alias),
        };
        buf.push_str(value);
        if !alias.is_empty() {
            buf.push_str(" AS ");
            buf.push_str(alias);
        }
    }

    pub fn to_sql_string(&self) -> String {
        let mut buf = String::new();
        self.write_to(&mut buf);
        buf
    }

    pub fn withs(&self) -> &[With] {
        match self {
            Node::Tag(t) => &t.withs,
            Node::Func(f) => &f.withs,
        }
    }
}

/// A grouping key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub value: String,
    pub flag: GroupFlag,
    pub withs: Vec<With>,
}

impl Group {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_flag(mut self, flag: GroupFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn write_to(&self, buf: &mut String) {
        buf.push_str(&self.value);
    }

    pub fn to_sql_string(&self) -> String {
        self.value.clone()
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub value: String,
    pub dir: Direction,
}

impl Order {
    pub fn new(value: impl Into<String>, dir: Direction) -> Self {
        Self {
            value: value.into(),
            dir,
        }
    }

    pub fn write_to(&self, buf: &mut String) {
        buf.push_str(&self.value);
        buf.push(' ');
        buf.push_str(self.dir.as_str());
    }

    pub fn to_sql_string(&self) -> String {
        let mut buf = String::new();
        self.write_to(&mut buf);
        buf
    }
}

/// LIMIT / OFFSET. Offset-first `LIMIT m, n` when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Limit {
    /// Always called by the serializer; writes nothing when unset.
    pub fn write_to(&self, buf: &mut String) {
        match (self.limit, self.offset) {
            (Some(n), Some(m)) => {
                buf.push_str(" LIMIT ");
                buf.push_str(&m.to_string());
                buf.push_str(", ");
                buf.push_str(&n.to_string());
            }
            (Some(n), None) => {
                buf.push_str(" LIMIT ");
                buf.push_str(&n.to_string());
            }
            _ => {}
        }
    }
}
