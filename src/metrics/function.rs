//! Aggregate functions and arithmetic composites over them.

use crate::descriptor::MetricClass;
use crate::error::{QueryError, QueryResult};
use crate::view::{FuncNode, Time, With};

use super::format_field;

/// The aggregate functions of the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Sum,
    Max,
    Min,
    Avg,
    Stddev,
    Percentile,
    Spread,
    Rspread,
    Apdex,
    Uniq,
}

impl AggKind {
    /// Function names are matched case-insensitively, like keywords.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggKind::Sum),
            "max" => Some(AggKind::Max),
            "min" => Some(AggKind::Min),
            "avg" => Some(AggKind::Avg),
            "stddev" => Some(AggKind::Stddev),
            "percentile" => Some(AggKind::Percentile),
            "spread" => Some(AggKind::Spread),
            "rspread" => Some(AggKind::Rspread),
            "apdex" => Some(AggKind::Apdex),
            "uniq" => Some(AggKind::Uniq),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AggKind::Sum => "Sum",
            AggKind::Max => "Max",
            AggKind::Min => "Min",
            AggKind::Avg => "Avg",
            AggKind::Stddev => "Stddev",
            AggKind::Percentile => "Percentile",
            AggKind::Spread => "Spread",
            AggKind::Rspread => "Rspread",
            AggKind::Apdex => "Apdex",
            AggKind::Uniq => "Uniq",
        }
    }

    /// Whether the function takes a numeric second argument.
    pub fn arity(self) -> usize {
        match self {
            AggKind::Percentile | AggKind::Apdex => 2,
            _ => 1,
        }
    }
}

/// A column operand resolved through the description registry.
#[derive(Debug, Clone)]
pub struct MetricField {
    /// Client-facing name, e.g. `byte`.
    pub name: String,
    /// Server-side expression, e.g. `byte_tx+byte_rx`.
    pub expr: String,
    pub class: MetricClass,
    /// True when the operand is an `ip`-typed tag (Uniq composite keys).
    pub is_ip: bool,
}

/// One aggregate call over one field.
#[derive(Debug, Clone)]
pub struct FuncCall {
    pub kind: AggKind,
    pub field: MetricField,
    /// Percentile / Apdex threshold.
    pub arg: Option<String>,
}

impl FuncCall {
    /// True when this call cannot be expressed in a single tier.
    ///
    /// Counters stay single-tier only under `Sum`; zero-masked columns have
    /// direct `*If` forms for `Avg`/`Min`/`Max`. `Uniq` always works on raw
    /// rows.
    pub fn forces_layering(&self) -> bool {
        match self.kind {
            AggKind::Uniq => false,
            AggKind::Sum => self.field.class == MetricClass::Delay,
            AggKind::Avg | AggKind::Min | AggKind::Max => self.field.class == MetricClass::Counter,
            AggKind::Stddev
            | AggKind::Percentile
            | AggKind::Spread
            | AggKind::Rspread
            | AggKind::Apdex => true,
        }
    }

    /// Alias of the binding this call contributes to the inner subquery.
    pub fn inner_alias(&self) -> String {
        match self.field.class {
            MetricClass::Counter => format!("_sum_{}", format_field(&self.field.expr)),
            MetricClass::Delay => format!("_grouparray_{}", format_field(&self.field.expr)),
        }
    }

    /// The inner-subquery binding node.
    pub fn inner_binding(&self) -> FuncNode {
        let x = &self.field.expr;
        match self.field.class {
            MetricClass::Counter => FuncNode::inner(format!("SUM({x})"), self.inner_alias()),
            MetricClass::Delay => {
                FuncNode::inner(format!("groupArrayIf({x}, {x} != 0)"), self.inner_alias())
            }
        }
    }

    /// `arrayFilter` over the grouped-array binding, masking missing values.
    fn masked_array(&self) -> String {
        format!("arrayFilter(x -> x!=0, {})", self.inner_alias())
    }

    /// Metrics-tier expression referencing the inner binding, plus the WITH
    /// bindings it needs.
    pub fn outer_expr(&self, time: &Time) -> QueryResult<(String, Vec<With>)> {
        let ia = self.inner_alias();
        let expr = match (self.kind, self.field.class) {
            (AggKind::Sum, MetricClass::Counter) => format!("SUM({ia})"),
            (AggKind::Sum, MetricClass::Delay) => format!("SUMArray({})", self.masked_array()),
            (AggKind::Max, MetricClass::Counter) => format!("MAX({ia})"),
            (AggKind::Max, MetricClass::Delay) => format!("MAXArray({})", self.masked_array()),
            (AggKind::Min, MetricClass::Counter) => format!("MIN({ia})"),
            (AggKind::Min, MetricClass::Delay) => format!("MINArray({})", self.masked_array()),
            (AggKind::Avg, MetricClass::Counter) => format!("AVG({ia})"),
            (AggKind::Avg, MetricClass::Delay) => format!("AVGArray({})", self.masked_array()),
            (AggKind::Stddev, MetricClass::Counter) => format!("stddevPopStable({ia})"),
            (AggKind::Stddev, MetricClass::Delay) => {
                format!("stddevPopStableArray({})", self.masked_array())
            }
            (AggKind::Percentile, MetricClass::Counter) => {
                format!("quantile({})({ia})", self.numeric_arg()?)
            }
            (AggKind::Percentile, MetricClass::Delay) => {
                format!("quantileArray({})({})", self.numeric_arg()?, self.masked_array())
            }
            (AggKind::Spread, MetricClass::Counter) => {
                let fill = self.fill_null_as_zero_alias();
                return Ok((
                    format!("minus(MAX({ia}), {fill})"),
                    vec![self.fill_null_as_zero_with(time)],
                ));
            }
            (AggKind::Spread, MetricClass::Delay) => format!(
                "minus(MAXArray({m}), MINArray({m}))",
                m = self.masked_array()
            ),
            (AggKind::Rspread, MetricClass::Counter) => {
                let fill = self.fill_null_as_zero_alias();
                return Ok((
                    format!("divide(MAX({ia})+1e-15, {fill}+1e-15)"),
                    vec![self.fill_null_as_zero_with(time)],
                ));
            }
            (AggKind::Rspread, MetricClass::Delay) => format!(
                "divide(MAXArray({m})+1e-15, MINArray({m})+1e-15)",
                m = self.masked_array()
            ),
            (AggKind::Apdex, MetricClass::Delay) => return self.apdex_expr(),
            (AggKind::Apdex, MetricClass::Counter) => {
                return Err(QueryError::InvalidArgument {
                    func: "Apdex".into(),
                    message: format!("'{}' is not a latency metric", self.field.name),
                });
            }
            (AggKind::Uniq, _) => {
                // Uniq needs raw rows; it cannot reference inner bindings.
                return Err(QueryError::LayerConflict(format!(
                    "Uniq({})",
                    self.field.name
                )));
            }
        };
        Ok((expr, Vec::new()))
    }

    /// Single-tier rendering for calls that do not force layering.
    pub fn direct_expr(&self) -> QueryResult<String> {
        let x = &self.field.expr;
        match (self.kind, self.field.class) {
            (AggKind::Sum, MetricClass::Counter) => Ok(format!("SUM({x})")),
            (AggKind::Avg, MetricClass::Delay) => Ok(format!("AVGIf({x}, {x} != 0)")),
            (AggKind::Min, MetricClass::Delay) => Ok(format!("MINIf({x}, {x} != 0)")),
            (AggKind::Max, MetricClass::Delay) => Ok(format!("MAXIf({x}, {x} != 0)")),
            (AggKind::Uniq, _) => Ok(self.uniq_expr()),
            _ => Err(QueryError::InvalidArgument {
                func: self.kind.name().into(),
                message: format!("'{}' requires a layered query", self.field.name),
            }),
        }
    }

    fn numeric_arg(&self) -> QueryResult<&str> {
        match self.arg.as_deref() {
            Some(v) => Ok(v),
            None => Err(QueryError::InvalidArgument {
                func: self.kind.name().into(),
                message: "missing numeric argument".into(),
            }),
        }
    }

    fn fill_null_as_zero_alias(&self) -> String {
        format!("min_fillnullaszero_{}", self.inner_alias())
    }

    /// `min` over the inner binding that collapses to 0 when buckets are
    /// missing from the window.
    fn fill_null_as_zero_with(&self, time: &Time) -> With {
        let ia = self.inner_alias();
        With::new(
            format!(
                "if(count({ia})={}, min({ia}), 0)",
                time.bucket_count()
            ),
            self.fill_null_as_zero_alias(),
        )
    }

    fn apdex_expr(&self) -> QueryResult<(String, Vec<With>)> {
        let t = self.numeric_arg()?.to_string();
        let ga = self.inner_alias();
        let count = format!("COUNTArray({})", self.masked_array());
        let satisfy = format!(
            "COUNTArray(arrayFilter(x -> (x <= {t} AND 0 < x), {ga}))"
        );
        let toler = format!(
            "COUNTArray(arrayFilter(x -> (({t} < x) AND (x <= ({t} * 4))), {ga}))"
        );
        // Alias spells the function tree: divide(plus(satisfy, toler/2), count)
        // with a null result on a zero divider.
        let alias = format!(
            "divide_0divider_as_null_plus_apdex_satisfy_{ga}_{t}_apdex_toler_{ga}_{t}_count_{ga}"
        );
        let value = format!(
            "if({count}>0, divide(plus({satisfy}, divide({toler}, 2)), {count}), null)"
        );
        Ok((format!("{alias}*100"), vec![With::new(value, alias)]))
    }

    /// `uniq` over raw rows. IP tags count a composite key of every address
    /// component and skip rows where both address families are zero.
    fn uniq_expr(&self) -> String {
        if !self.field.is_ip {
            return format!("uniq({})", self.field.expr);
        }
        let sfx = self.field.name.strip_prefix("ip").unwrap_or("");
        format!(
            "uniqIf([toString(ip4{sfx}), toString(subnet_id{sfx}), toString(is_ipv4), toString(ip6{sfx})], \
             NOT (((is_ipv4 = 1) OR (ip6{sfx} = toIPv6('::'))) AND ((is_ipv4 = 0) OR (ip4{sfx} = toIPv4('0.0.0.0')))))"
        )
    }
}

/// Arithmetic connective; serializes as a named call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl ArithOp {
    pub fn func_name(self) -> &'static str {
        match self {
            ArithOp::Plus => "plus",
            ArithOp::Minus => "minus",
            ArithOp::Multiply => "multiply",
            ArithOp::Divide => "divide",
        }
    }
}

/// A projected metric expression: aggregate calls combined by arithmetic.
#[derive(Debug, Clone)]
pub enum MetricExpr {
    Call(FuncCall),
    Literal(String),
    /// `Time_interval` — the query's reporting step.
    Interval,
    Binary {
        op: ArithOp,
        left: Box<MetricExpr>,
        right: Box<MetricExpr>,
    },
}

impl MetricExpr {
    /// Every aggregate call contained in the tree, in serialization order.
    pub fn calls(&self) -> Vec<&FuncCall> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a FuncCall>) {
        match self {
            MetricExpr::Call(call) => out.push(call),
            MetricExpr::Literal(_) | MetricExpr::Interval => {}
            MetricExpr::Binary { left, right, .. } => {
                left.collect_calls(out);
                right.collect_calls(out);
            }
        }
    }

    pub fn forces_layering(&self) -> bool {
        self.calls().iter().any(|c| c.forces_layering())
    }

    /// Render the metrics-tier expression. `layered` picks outer forms over
    /// direct forms; WITH bindings of the contained calls are concatenated.
    pub fn render(&self, layered: bool, time: &Time) -> QueryResult<(String, Vec<With>)> {
        match self {
            MetricExpr::Call(call) => {
                if layered {
                    call.outer_expr(time)
                } else {
                    Ok((call.direct_expr()?, Vec::new()))
                }
            }
            MetricExpr::Literal(v) => Ok((v.clone(), Vec::new())),
            MetricExpr::Interval => Ok((time.effective_interval().to_string(), Vec::new())),
            MetricExpr::Binary { op, left, right } => {
                let (l, mut withs) = left.render(layered, time)?;
                let (r, r_withs) = right.render(layered, time)?;
                withs.extend(r_withs);
                Ok((format!("{}({l}, {r})", op.func_name()), withs))
            }
        }
    }
}
