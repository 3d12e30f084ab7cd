//! Translation engine: parsed statement → view model → SQL.
//!
//! The engine owns the clause walk order, which matters for the output:
//! FROM and WHERE first (the time window must be known before any
//! window-derived expression renders), then the layering decision over the
//! whole projection list, then GROUP BY (group keys instantiate their bound
//! projections, notably time buckets), then the remaining SELECT items in
//! input order, then HAVING, ORDER BY and LIMIT.

use tracing::{debug, warn};

use crate::descriptor::{ColumnType, Descriptor, MetricClass, Registry};
use crate::error::{QueryError, QueryResult};
use crate::metrics::{AggKind, ArithOp, FuncCall, MetricExpr, MetricField, TimeBucket};
use crate::parse::{self, BinaryOp, Expr, OrderDir, SelectItem, Statement};
use crate::view::{
    CmpOp, Direction, FilterNode, FuncNode, Group, Limit, LogicOp, MetricsLevel, Model, Node,
    Order, Tag, TagFlag, View,
};

/// Translates FlowQL statements against one database of the registry.
///
/// Stateless between calls; hosting services may run many engines in
/// parallel over the same registry.
pub struct Engine<'r> {
    registry: &'r Registry,
    db: String,
}

/// A classified SELECT item.
enum Projection {
    Time(TimeBucket),
    Metric { expr: MetricExpr, alias: String },
    Column { desc: Descriptor, alias: Option<String> },
}

impl Projection {
    /// Name under which GROUP BY and ORDER BY can reference this item.
    fn visible_name(&self) -> &str {
        match self {
            Projection::Time(bucket) => &bucket.alias,
            Projection::Metric { alias, .. } => alias,
            Projection::Column { desc, alias } => alias.as_deref().unwrap_or(&desc.name),
        }
    }
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry, db: impl Into<String>) -> Self {
        Self {
            registry,
            db: db.into(),
        }
    }

    /// Translate one statement into its canonical ClickHouse SQL.
    pub fn translate(&self, source: &str) -> QueryResult<String> {
        let statement = parse::parse(source)?;
        let model = self.build_model(statement)?;
        let sql = View::new(model).to_sql();
        debug!(db = %self.db, sql = %sql, "translated statement");
        Ok(sql)
    }

    fn build_model(&self, stmt: Statement) -> QueryResult<Model> {
        let mut model = Model::new();

        let table = if stmt.from.contains('.') {
            stmt.from.clone()
        } else {
            format!("{}.{}", self.db, stmt.from)
        };
        model.add_table(table);

        if let Some(expr) = &stmt.where_clause {
            let node = self.build_filter(expr, &mut model)?;
            model.filters.append(node);
        }

        let projections = stmt
            .select
            .iter()
            .map(|item| self.classify(item))
            .collect::<QueryResult<Vec<_>>>()?;

        let layered = self.decide_layering(&projections, stmt.having.as_ref())?;
        if layered {
            model.metrics_level = MetricsLevel::Layered;
        }

        // GROUP BY first: keys bound to time buckets emit their projection
        // here, ahead of the remaining select items.
        let mut consumed = vec![false; projections.len()];
        for key in &stmt.group_by {
            self.build_group(key, &projections, &mut consumed, &mut model, layered)?;
        }

        for (i, projection) in projections.into_iter().enumerate() {
            if consumed[i] {
                continue;
            }
            self.build_projection(projection, &mut model, layered)?;
        }

        if let Some(expr) = &stmt.having {
            let node = self.build_having(expr, &mut model, layered)?;
            model.havings.append(node);
        }

        for item in &stmt.order_by {
            let dir = match item.dir {
                Some(OrderDir::Desc) => Direction::Desc,
                _ => Direction::Asc,
            };
            model.add_order(Order::new(item.name.clone(), dir));
        }

        model.limit = Limit {
            limit: stmt.limit,
            offset: stmt.offset,
        };

        Ok(model)
    }

    // =========================================================================
    // Identifier resolution
    // =========================================================================

    /// Tags shadow metrics when both describe the same name.
    fn lookup(&self, name: &str) -> QueryResult<&Descriptor> {
        let db = self
            .registry
            .database(&self.db)
            .ok_or_else(|| QueryError::UnknownColumn {
                db: self.db.clone(),
                name: name.to_string(),
            })?;
        db.tag(name)
            .or_else(|| db.metric(name))
            .ok_or_else(|| QueryError::UnknownColumn {
                db: self.db.clone(),
                name: name.to_string(),
            })
    }

    /// Resolve an aggregate operand into a metric field.
    fn lookup_field(&self, name: &str) -> QueryResult<MetricField> {
        let desc = self.lookup(name)?;
        if desc.deprecated {
            warn!(db = %self.db, column = %name, "deprecated column referenced");
        }
        Ok(MetricField {
            name: desc.name.clone(),
            expr: desc.server_name.clone(),
            class: match desc.kind {
                ColumnType::Int => desc.metric_class(),
                _ => MetricClass::Counter,
            },
            is_ip: desc.kind == ColumnType::Ip,
        })
    }

    // =========================================================================
    // Projections
    // =========================================================================

    fn classify(&self, item: &SelectItem) -> QueryResult<Projection> {
        match &item.expr {
            Expr::Call { name, args } if name.eq_ignore_ascii_case("time") => {
                let (column, step) = match args.as_slice() {
                    [Expr::Ident(column), Expr::Number(step)] => (column, step),
                    _ => {
                        return Err(QueryError::InvalidArgument {
                            func: "time".into(),
                            message: "expected time(column, step)".into(),
                        });
                    }
                };
                let desc = self.lookup(column)?;
                let step: u64 = step.parse().map_err(|_| QueryError::InvalidArgument {
                    func: "time".into(),
                    message: format!("invalid step '{step}'"),
                })?;
                let alias = item
                    .alias
                    .clone()
                    .unwrap_or_else(|| format!("time_{step}"));
                Ok(Projection::Time(TimeBucket::new(
                    desc.server_name.clone(),
                    step,
                    alias,
                )))
            }
            Expr::Ident(name) => {
                let desc = self.lookup(name)?.clone();
                Ok(Projection::Column {
                    desc,
                    alias: item.alias.clone(),
                })
            }
            _ => {
                let expr = self.build_metric_expr(&item.expr)?;
                let alias = match &item.alias {
                    Some(alias) => alias.clone(),
                    None => expr
                        .calls()
                        .first()
                        .map(|c| format!("{}_{}", c.kind.name().to_ascii_lowercase(), c.field.name))
                        .unwrap_or_default(),
                };
                Ok(Projection::Metric { expr, alias })
            }
        }
    }

    fn build_metric_expr(&self, expr: &Expr) -> QueryResult<MetricExpr> {
        match expr {
            Expr::Number(n) => Ok(MetricExpr::Literal(n.clone())),
            Expr::Ident(name) if name.eq_ignore_ascii_case("time_interval") => {
                Ok(MetricExpr::Interval)
            }
            Expr::Ident(name) => {
                // A bare column inside arithmetic contributes its server
                // expression verbatim.
                Ok(MetricExpr::Literal(self.lookup(name)?.server_name.clone()))
            }
            Expr::Call { name, args } => Ok(MetricExpr::Call(self.build_func_call(name, args)?)),
            Expr::Binary { op, left, right } => {
                let op = match op {
                    BinaryOp::Add => ArithOp::Plus,
                    BinaryOp::Sub => ArithOp::Minus,
                    BinaryOp::Mul => ArithOp::Multiply,
                    BinaryOp::Div => ArithOp::Divide,
                    _ => {
                        return Err(QueryError::Malformed(
                            "boolean operator in a projection".into(),
                        ));
                    }
                };
                Ok(MetricExpr::Binary {
                    op,
                    left: Box::new(self.build_metric_expr(left)?),
                    right: Box::new(self.build_metric_expr(right)?),
                })
            }
            _ => Err(QueryError::Malformed(
                "unsupported expression in a projection".into(),
            )),
        }
    }

    fn build_func_call(&self, name: &str, args: &[Expr]) -> QueryResult<FuncCall> {
        let kind =
            AggKind::parse(name).ok_or_else(|| QueryError::UnknownFunction(name.to_string()))?;
        if args.len() != kind.arity() {
            return Err(QueryError::InvalidArgument {
                func: kind.name().into(),
                message: format!("expected {} argument(s), found {}", kind.arity(), args.len()),
            });
        }
        let field = match &args[0] {
            Expr::Ident(column) => self.lookup_field(column)?,
            _ => {
                return Err(QueryError::InvalidArgument {
                    func: kind.name().into(),
                    message: "first argument must be a column".into(),
                });
            }
        };
        let arg = match args.get(1) {
            None => None,
            Some(Expr::Number(n)) => Some(n.clone()),
            Some(_) => {
                return Err(QueryError::InvalidArgument {
                    func: kind.name().into(),
                    message: "second argument must be numeric".into(),
                });
            }
        };
        Ok(FuncCall { kind, field, arg })
    }

    /// One pass over select and having decides the metrics level: any call
    /// without a single-tier form splits the whole query.
    fn decide_layering(
        &self,
        projections: &[Projection],
        having: Option<&Expr>,
    ) -> QueryResult<bool> {
        let mut forces = false;
        let mut uniq: Option<String> = None;

        let mut inspect = |call: &FuncCall| {
            if call.kind == AggKind::Uniq {
                uniq = Some(format!("Uniq({})", call.field.name));
            } else if call.forces_layering() {
                forces = true;
            }
        };

        for projection in projections {
            if let Projection::Metric { expr, .. } = projection {
                for call in expr.calls() {
                    inspect(call);
                }
            }
        }
        if let Some(expr) = having {
            self.walk_agg_calls(expr, &mut |call| inspect(call))?;
        }

        // Uniq works on raw rows; it cannot coexist with aggregates that
        // demand the inner subquery.
        if forces {
            if let Some(name) = uniq {
                return Err(QueryError::LayerConflict(name));
            }
        }
        Ok(forces)
    }

    /// Visit every aggregate call in a boolean expression tree.
    fn walk_agg_calls(
        &self,
        expr: &Expr,
        visit: &mut dyn FnMut(&FuncCall),
    ) -> QueryResult<()> {
        match expr {
            Expr::Call { name, args } => {
                visit(&self.build_func_call(name, args)?);
            }
            Expr::Binary { left, right, .. } => {
                self.walk_agg_calls(left, visit)?;
                self.walk_agg_calls(right, visit)?;
            }
            Expr::Not(inner) => self.walk_agg_calls(inner, visit)?,
            Expr::In { expr, .. } => self.walk_agg_calls(expr, visit)?,
            Expr::Ident(_) | Expr::Number(_) | Expr::StringLit(_) => {}
        }
        Ok(())
    }

    fn build_group(
        &self,
        key: &str,
        projections: &[Projection],
        consumed: &mut [bool],
        model: &mut Model,
        layered: bool,
    ) -> QueryResult<()> {
        if let Some(i) = projections.iter().position(|p| p.visible_name() == key) {
            match &projections[i] {
                Projection::Time(bucket) => {
                    if layered {
                        bucket.apply_layered(model);
                    } else {
                        bucket.apply_unlay(model);
                    }
                    consumed[i] = true;
                    return Ok(());
                }
                Projection::Column { .. } => {
                    model.add_group(Group::new(key));
                    return Ok(());
                }
                Projection::Metric { .. } => {
                    return Err(QueryError::Malformed(format!(
                        "cannot group by aggregate '{key}'"
                    )));
                }
            }
        }
        // Not projected: the key must still be a known tag; the planner
        // synthesizes its inner projection in layered queries.
        self.lookup(key)?;
        model.add_group(Group::new(key));
        Ok(())
    }

    fn build_projection(
        &self,
        projection: Projection,
        model: &mut Model,
        layered: bool,
    ) -> QueryResult<()> {
        match projection {
            Projection::Time(bucket) => {
                // time() without a matching GROUP BY still buckets rows.
                if layered {
                    bucket.apply_layered(model);
                } else {
                    bucket.apply_unlay(model);
                }
            }
            Projection::Column { desc, alias } => self.project_column(&desc, alias, model)?,
            Projection::Metric { expr, alias } => {
                if layered {
                    for call in expr.calls() {
                        model.add_tag(Node::Func(call.inner_binding()));
                    }
                }
                let (sql, withs) = expr.render(layered, &model.time)?;
                model.add_tag(Node::Func(FuncNode::outer(sql, alias).with_withs(withs)));
            }
        }
        Ok(())
    }

    fn project_column(
        &self,
        desc: &Descriptor,
        alias: Option<String>,
        model: &mut Model,
    ) -> QueryResult<()> {
        if desc.deprecated {
            warn!(db = %self.db, column = %desc.name, "deprecated column referenced");
        }

        if desc.kind.is_enum() {
            return self.project_enum_column(desc, alias, model);
        }

        let visible = alias.unwrap_or_else(|| desc.name.clone());
        let tag_alias = if desc.server_name == visible {
            String::new()
        } else {
            visible
        };
        model.add_tag(Node::Tag(
            Tag::new(desc.server_name.clone()).with_alias(tag_alias),
        ));
        Ok(())
    }

    /// Enum columns project their raw value under a `_`-prefixed alias and
    /// translate it to the display name in the final tier.
    fn project_enum_column(
        &self,
        desc: &Descriptor,
        alias: Option<String>,
        model: &mut Model,
    ) -> QueryResult<()> {
        let raw = format!("_{}", desc.name);
        model.add_tag(Node::Tag(
            Tag::new(desc.server_name.clone()).with_alias(raw.clone()),
        ));

        let file = desc.enum_file.as_deref().unwrap_or(&desc.name);
        let values =
            self.registry
                .lookup_enum(file)
                .map_err(|_| QueryError::UnknownColumn {
                    db: self.db.clone(),
                    name: format!("enum/{file}"),
                })?;

        let quoted = desc.kind == ColumnType::StringEnum;
        let keys = values
            .iter()
            .map(|v| {
                if quoted {
                    format!("'{}'", v.value)
                } else {
                    v.value.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let names = values
            .iter()
            .map(|v| format!("'{}'", v.display))
            .collect::<Vec<_>>()
            .join(", ");
        let default = if quoted { raw.clone() } else { "''".to_string() };

        let visible = alias.unwrap_or_else(|| desc.name.clone());
        model.add_tag(Node::Tag(
            Tag::new(format!("transform({raw}, [{keys}], [{names}], {default})"))
                .with_alias(visible)
                .with_flag(TagFlag::Trans),
        ));
        Ok(())
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn build_filter(&self, expr: &Expr, model: &mut Model) -> QueryResult<FilterNode> {
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut children = Vec::new();
                self.flatten_filter(left, BinaryOp::And, &mut children, model)?;
                self.flatten_filter(right, BinaryOp::And, &mut children, model)?;
                Ok(FilterNode::Group {
                    op: LogicOp::And,
                    children,
                })
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let mut children = Vec::new();
                self.flatten_filter(left, BinaryOp::Or, &mut children, model)?;
                self.flatten_filter(right, BinaryOp::Or, &mut children, model)?;
                Ok(FilterNode::Group {
                    op: LogicOp::Or,
                    children,
                })
            }
            Expr::Not(inner) => Ok(FilterNode::Not(Box::new(self.build_filter(inner, model)?))),
            Expr::Binary { op, left, right } => {
                let cmp = comparison_op(*op)?;
                self.update_time_window(left, cmp, right, model)?;
                Ok(FilterNode::Cmp {
                    left: self.filter_operand(left)?,
                    op: cmp,
                    right: self.filter_operand(right)?,
                })
            }
            Expr::In {
                expr,
                values,
                negated,
            } => Ok(FilterNode::In {
                left: self.filter_operand(expr)?,
                values: values
                    .iter()
                    .map(|v| self.filter_operand(v))
                    .collect::<QueryResult<Vec<_>>>()?,
                negated: *negated,
            }),
            _ => Err(QueryError::Malformed("unsupported filter expression".into())),
        }
    }

    /// Merge same-operator chains into one group so `a AND b AND c` renders
    /// without nesting.
    fn flatten_filter(
        &self,
        expr: &Expr,
        parent: BinaryOp,
        out: &mut Vec<FilterNode>,
        model: &mut Model,
    ) -> QueryResult<()> {
        match expr {
            Expr::Binary { op, left, right } if *op == parent => {
                self.flatten_filter(left, parent, out, model)?;
                self.flatten_filter(right, parent, out, model)?;
            }
            _ => out.push(self.build_filter(expr, model)?),
        }
        Ok(())
    }

    /// WHERE operands resolve through the registry; plain column references
    /// are backtick-quoted, expression expansions are not.
    fn filter_operand(&self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Ident(name) => {
                let desc = self.lookup(name)?;
                if is_simple_ident(&desc.server_name) {
                    Ok(format!("`{}`", desc.server_name))
                } else {
                    Ok(desc.server_name.clone())
                }
            }
            Expr::Number(n) => Ok(n.clone()),
            Expr::StringLit(s) => Ok(format!("'{s}'")),
            _ => Err(QueryError::Malformed(
                "unsupported operand in a filter".into(),
            )),
        }
    }

    /// Comparisons against the time tag tighten the query window.
    fn update_time_window(
        &self,
        left: &Expr,
        op: CmpOp,
        right: &Expr,
        model: &mut Model,
    ) -> QueryResult<()> {
        let (Expr::Ident(name), Expr::Number(value)) = (left, right) else {
            return Ok(());
        };
        if self.lookup(name)?.kind != ColumnType::Time {
            return Ok(());
        }
        if let Ok(value) = value.parse::<i64>() {
            match op {
                CmpOp::Gte | CmpOp::Gt => model.time.add_time_start(value),
                CmpOp::Lte | CmpOp::Lt => model.time.add_time_end(value),
                _ => {}
            }
        }
        Ok(())
    }

    // =========================================================================
    // HAVING
    // =========================================================================

    fn build_having(
        &self,
        expr: &Expr,
        model: &mut Model,
        layered: bool,
    ) -> QueryResult<FilterNode> {
        match expr {
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let logic = if *op == BinaryOp::And {
                    LogicOp::And
                } else {
                    LogicOp::Or
                };
                Ok(FilterNode::Group {
                    op: logic,
                    children: vec![
                        self.build_having(left, model, layered)?,
                        self.build_having(right, model, layered)?,
                    ],
                })
            }
            Expr::Not(inner) => Ok(FilterNode::Not(Box::new(
                self.build_having(inner, model, layered)?,
            ))),
            Expr::Binary { op, left, right } => Ok(FilterNode::Cmp {
                left: self.having_operand(left, model, layered)?,
                op: comparison_op(*op)?,
                right: self.having_operand(right, model, layered)?,
            }),
            Expr::In {
                expr,
                values,
                negated,
            } => Ok(FilterNode::In {
                left: self.having_operand(expr, model, layered)?,
                values: values
                    .iter()
                    .map(|v| self.having_operand(v, model, layered))
                    .collect::<QueryResult<Vec<_>>>()?,
                negated: *negated,
            }),
            _ => Err(QueryError::Malformed("unsupported HAVING expression".into())),
        }
    }

    /// Aggregate operands render in their metrics-tier form and contribute
    /// inner bindings; bare identifiers pass through as alias references.
    fn having_operand(
        &self,
        expr: &Expr,
        model: &mut Model,
        layered: bool,
    ) -> QueryResult<String> {
        match expr {
            Expr::Call { .. }
            | Expr::Binary {
                op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div,
                ..
            } => {
                let metric = self.build_metric_expr(expr)?;
                if layered {
                    for call in metric.calls() {
                        model.add_tag(Node::Func(call.inner_binding()));
                    }
                }
                let (sql, withs) = metric.render(layered, &model.time)?;
                model.havings.append_withs(withs);
                Ok(sql)
            }
            Expr::Ident(name) => Ok(name.clone()),
            Expr::Number(n) => Ok(n.clone()),
            Expr::StringLit(s) => Ok(format!("'{s}'")),
            _ => Err(QueryError::Malformed(
                "unsupported operand in HAVING".into(),
            )),
        }
    }
}

fn comparison_op(op: BinaryOp) -> QueryResult<CmpOp> {
    match op {
        BinaryOp::Eq => Ok(CmpOp::Eq),
        BinaryOp::Ne => Ok(CmpOp::Ne),
        BinaryOp::Lt => Ok(CmpOp::Lt),
        BinaryOp::Lte => Ok(CmpOp::Lte),
        BinaryOp::Gt => Ok(CmpOp::Gt),
        BinaryOp::Gte => Ok(CmpOp::Gte),
        BinaryOp::Like => Ok(CmpOp::Like),
        _ => Err(QueryError::Malformed(format!(
            "operator {op:?} is not a comparison"
        ))),
    }
}

fn is_simple_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Translate `source` against database `db` using `registry`.
pub fn translate(registry: &Registry, db: &str, source: &str) -> QueryResult<String> {
    Engine::new(registry, db).translate(source)
}
