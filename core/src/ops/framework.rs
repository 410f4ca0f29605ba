//! Catch-all node for operators no opset knows how to build.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::TVec;
use std::collections::HashMap;

/// The raw identity and attributes of an unconverted operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameworkNodeAttrs {
    pub type_name: String,
    pub opset_name: String,
    pub attrs: HashMap<String, String>,
}

/// Placeholder keeping an unknown operator's ports and attributes intact
/// so the graph stays loadable. Any attempt to run inference through it
/// fails with the original type name.
#[derive(Debug, Clone, Default)]
pub struct FrameworkNode {
    pub attrs: FrameworkNodeAttrs,
    pub output_facts: TVec<PortFact>,
}

impl Op for FrameworkNode {
    fn name(&self) -> &'static str {
        "FrameworkNode"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::FrameworkAttrs(a)) =
            visitor.fetch("framework_node_attrs", AttrKind::FrameworkAttrs)?
        {
            self.attrs = a;
        }
        Ok(true)
    }

    fn infer(&self, _inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        // Output facts are injected from the declared ports, not inferred.
        Ok(self.output_facts.clone())
    }
}
