//! The in-memory graph: nodes, ports and the `Function` that owns them.

mod graph;
mod node;
mod order;

pub use graph::Function;
pub use node::{InletId, Node, Outlet, OutletId, PortFact};
pub use order::eval_order;
