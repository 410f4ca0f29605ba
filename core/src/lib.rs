//! # xir-core
//!
//! Typed computation-graph model for the xir IR loader: element types,
//! partial shapes, shared weight buffers, the `Function` graph, the `Op`
//! trait with its attribute-visitor protocol, a minimal built-in operator
//! library and the versioned opset registry.
//!
//! The XML frontend lives in the `xir` crate; this crate is format
//! agnostic.

#[macro_use]
extern crate log;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used for node inputs and outputs, and for tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub mod buffer;
pub mod element;
pub mod errors;
pub mod model;
pub mod ops;
pub mod opset;
pub mod shape;

pub use errors::{IrError, XirResult};

pub mod prelude {
    pub use crate::buffer::{AlignedBuffer, Weights};
    pub use crate::element::ElementType;
    pub use crate::errors::{IrError, XirResult};
    pub use crate::model::{Function, InletId, Node, OutletId, PortFact};
    pub use crate::ops::{AttrKind, AttrValue, AttributeVisitor, Op};
    pub use crate::opset::{Opset, OpsetRegistry};
    pub use crate::shape::PartialShape;
    pub use crate::tvec;
    pub use crate::TVec;
}

pub mod internal {
    pub use crate::ops::state::Variable;
    pub use crate::prelude::*;
    pub use anyhow::{anyhow, bail, ensure, Context};
    pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
    pub use std::sync::Arc;
}

pub use anyhow;

/// Analog of smallvec! for TVec.
#[macro_export]
macro_rules! tvec {
    ($($x:expr),*$(,)*) => ( $crate::TVec::from_vec(vec![$($x),*]) );
    ($x:expr; $y:expr) => ( $crate::TVec::from_elem($x, $y) );
}
