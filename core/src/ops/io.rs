//! Graph inputs and outputs.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::element::ElementType;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::shape::PartialShape;
use crate::{tvec, TVec};
use anyhow::ensure;

#[derive(Debug, Clone, Default)]
pub struct Parameter {
    pub element_type: ElementType,
    pub shape: PartialShape,
}

impl Op for Parameter {
    fn name(&self) -> &'static str {
        "Parameter"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::ElementType(t)) = visitor.fetch("element_type", AttrKind::ElementType)? {
            self.element_type = t;
        }
        if let Some(AttrValue::PartialShape(s)) = visitor.fetch("shape", AttrKind::PartialShape)? {
            self.shape = s;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.is_empty(), "Parameter takes no input");
        Ok(tvec!(PortFact::new(self.element_type, self.shape.clone())))
    }
}

/// `Result` terminates a graph output. The name carries a trailing
/// underscore to stay clear of `std::result::Result`.
#[derive(Debug, Clone, Default)]
pub struct Result_;

impl Op for Result_ {
    fn name(&self) -> &'static str {
        "Result"
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 1, "Result expects exactly one input");
        Ok(tvec!(inputs[0].clone()))
    }
}
