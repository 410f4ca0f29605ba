//! The `Op` trait and the attribute-visitor protocol.
//!
//! Operators declare their attributes by pulling them through an
//! [`AttributeVisitor`]: for each attribute the op names the kind it
//! expects, and the visitor answers with the matching [`AttrValue`] (or
//! `None` when the attribute is absent, in which case the op keeps its
//! default). The XML frontend implements the visitor against `<data>`
//! attributes; tests can implement it against plain maps.

use crate::buffer::AlignedBuffer;
use crate::element::ElementType;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::shape::PartialShape;
use crate::TVec;
use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::DynClone;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

pub mod framework;
pub mod io;
pub mod konst;
pub mod math;
pub mod nn;
pub mod scan;
pub mod state;

use crate::model::Function;
use scan::{InputDescription, OutputDescription, SpecialBodyPorts};
use state::Variable;

pub trait Op: fmt::Debug + DynClone + Downcast + Send + Sync {
    /// The operation type name, as an opset registers it.
    fn name(&self) -> &'static str;

    /// Pull this op's attributes from the visitor. Returning `true` means
    /// the op is fully described and shape/type inference may run.
    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        let _ = visitor;
        Ok(true)
    }

    /// Shape and element type inference from input facts.
    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>>;

    /// Sinks are graph outputs without a Result node (Assign).
    fn is_sink(&self) -> bool {
        false
    }
}

impl_downcast!(Op);
dyn_clone::clone_trait_object!(Op);

/// The attribute kinds an operator may expect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrKind {
    Str,
    Bool,
    F64,
    I64,
    VecI32,
    VecI64,
    VecF32,
    VecStr,
    ElementType,
    PartialShape,
    Shape,
    Strides,
    AxisSet,
    CoordinateDiff,
    TopKMode,
    TopKSort,
    Variable,
    Buffer,
    Function,
    FrameworkAttrs,
    TypeVec,
    InputDescriptions,
    OutputDescriptions,
    SpecialBodyPorts,
}

/// A materialized attribute value, tagged by kind.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    F64(f64),
    I64(i64),
    VecI32(Vec<i32>),
    VecI64(Vec<i64>),
    VecF32(Vec<f32>),
    VecStr(Vec<String>),
    ElementType(ElementType),
    PartialShape(PartialShape),
    Shape(TVec<u64>),
    Strides(TVec<u64>),
    AxisSet(BTreeSet<u64>),
    CoordinateDiff(TVec<i64>),
    TopKMode(nn::TopKMode),
    TopKSort(nn::TopKSort),
    Variable(Arc<Variable>),
    Buffer(AlignedBuffer),
    Function(Function),
    FrameworkAttrs(framework::FrameworkNodeAttrs),
    TypeVec(Vec<ElementType>),
    InputDescriptions(Vec<InputDescription>),
    OutputDescriptions(Vec<OutputDescription>),
    SpecialBodyPorts(SpecialBodyPorts),
}

pub trait AttributeVisitor {
    /// Fetch attribute `name`, expecting `kind`. `Ok(None)` means the
    /// attribute is absent (or unparseable for the forgiving kinds, bool
    /// and enums) and the operator default applies.
    fn fetch(&mut self, name: &str, kind: AttrKind) -> XirResult<Option<AttrValue>>;
}

/// A visitor over a plain string map, for tests and programmatic graphs.
#[derive(Debug, Default)]
pub struct MapVisitor(pub HashMap<String, String>);

impl AttributeVisitor for MapVisitor {
    fn fetch(&mut self, name: &str, kind: AttrKind) -> XirResult<Option<AttrValue>> {
        let Some(s) = self.0.get(name) else { return Ok(None) };
        let value = match kind {
            AttrKind::Str => AttrValue::Str(s.clone()),
            AttrKind::I64 => AttrValue::I64(s.parse()?),
            AttrKind::F64 => AttrValue::F64(s.parse()?),
            AttrKind::Bool => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => AttrValue::Bool(true),
                "false" | "0" => AttrValue::Bool(false),
                _ => return Ok(None),
            },
            AttrKind::ElementType => match ElementType::parse(s) {
                Some(t) => AttrValue::ElementType(t),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}
