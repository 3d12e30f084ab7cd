//! Layered view model of the output SQL.
//!
//! The translator accumulates parsed nodes into a [`Model`], then a [`View`]
//! splits the model into an ordered chain of [`SubView`]s (inner aggregation
//! → metrics aggregation → translation) and serializes the chain into the
//! final statement:
//!
//! ```text
//! Model ──plan──▶ [SubView, SubView, ...] ──link FROMs──▶ SQL string
//! ```

mod filter;
mod model;
mod node;
#[allow(clippy::module_inception)]
mod view;

pub use filter::{CmpOp, FilterNode, Filters, LogicOp};
pub use model::{MetricsLevel, Model, Time};
pub use node::{
    Direction, FuncFlag, FuncNode, Group, GroupFlag, Limit, Node, Order, Tag, TagFlag, With,
};
pub use view::{FromEntry, SubView, View};
