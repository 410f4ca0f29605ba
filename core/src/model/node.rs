use crate::element::ElementType;
use crate::ops::Op;
use crate::shape::PartialShape;
use crate::TVec;
use derive_new::new;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What is known about one output port: element type and shape.
#[derive(Debug, Clone, Default, PartialEq, new)]
pub struct PortFact {
    pub element_type: ElementType,
    pub shape: PartialShape,
}

/// An output port of a node: its fact, the tensor names attached to it,
/// and the inlets it feeds.
#[derive(Debug, Clone, Default)]
pub struct Outlet {
    pub fact: PortFact,
    pub names: HashSet<String>,
    pub successors: TVec<InletId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, new)]
pub struct OutletId {
    pub node: usize,
    pub slot: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, new)]
pub struct InletId {
    pub node: usize,
    pub slot: usize,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: usize,
    pub name: String,
    pub op: Box<dyn Op>,
    pub inputs: Vec<OutletId>,
    /// Execution-order-only predecessors (Assign depends on its ReadValue).
    pub control_inputs: Vec<usize>,
    pub outputs: TVec<Outlet>,
    /// Opaque runtime hints carried over from the IR (PrimitivesPriority...).
    pub rt_info: HashMap<String, String>,
}

impl Node {
    pub fn op(&self) -> &dyn Op {
        &*self.op
    }

    pub fn op_as<O: Op>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    pub fn op_is<O: Op>(&self) -> bool {
        self.op_as::<O>().is_some()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{} \"{}\" {}", self.id, self.name, self.op.name())
    }
}
