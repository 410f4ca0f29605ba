//! Stateful cells: ReadValue (consumer) and Assign (producer) linked by a
//! `Variable`. The pair never forms a data cycle: the loader wires the
//! Assign to its ReadValue through a control dependency in a post-pass.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::element::ElementType;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::shape::PartialShape;
use crate::{tvec, TVec};
use anyhow::ensure;
use std::sync::Arc;

/// A named state cell, shared by the ReadValue/Assign pair of one
/// conversion. Created dynamic on first reference.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: String,
    pub shape: PartialShape,
    pub element_type: ElementType,
}

impl Variable {
    pub fn dynamic(id: impl Into<String>) -> Variable {
        Variable { id: id.into(), shape: PartialShape::dynamic(), element_type: ElementType::Dynamic }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadValue {
    pub variable: Option<Arc<Variable>>,
}

impl ReadValue {
    pub fn variable_id(&self) -> Option<&str> {
        self.variable.as_deref().map(|v| &*v.id)
    }
}

impl Op for ReadValue {
    fn name(&self) -> &'static str {
        "ReadValue"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::Variable(v)) = visitor.fetch("variable_id", AttrKind::Variable)? {
            self.variable = Some(v);
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        // With an init input the state inherits its fact, else the
        // variable's own (usually dynamic) one.
        if let Some(init) = inputs.first() {
            Ok(tvec!(init.clone()))
        } else {
            let v = self.variable.as_deref();
            Ok(tvec!(PortFact::new(
                v.map(|v| v.element_type).unwrap_or_default(),
                v.map(|v| v.shape.clone()).unwrap_or_default(),
            )))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assign {
    pub variable: Option<Arc<Variable>>,
}

impl Assign {
    pub fn variable_id(&self) -> Option<&str> {
        self.variable.as_deref().map(|v| &*v.id)
    }
}

impl Op for Assign {
    fn name(&self) -> &'static str {
        "Assign"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::Variable(v)) = visitor.fetch("variable_id", AttrKind::Variable)? {
            self.variable = Some(v);
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 1, "Assign expects exactly one input");
        Ok(tvec!(inputs[0].clone()))
    }

    fn is_sink(&self) -> bool {
        true
    }
}
