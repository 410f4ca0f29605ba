//! Sub-graph operators: TensorIterator and Loop.
//!
//! Both own a body `Function` plus port descriptions mapping the outer
//! node's ports onto the body's parameters and results. Descriptions are
//! delivered through the attribute visitor like any other attribute, so
//! the outer op stays oblivious of how the frontend encoded them.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::errors::XirResult;
use crate::model::{Function, OutletId, PortFact};
use crate::shape::PartialShape;
use crate::{tvec, TVec};
use anyhow::{ensure, Context};

/// How one outer input feeds the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDescription {
    /// The input is cut along `axis` and fed slice by slice.
    Slice {
        external_port_id: i64,
        body_parameter_index: usize,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    },
    /// Back-edge: first iteration reads the outer input, later ones the
    /// named body result.
    Merged { external_port_id: i64, body_parameter_index: usize, body_result_index: usize },
    /// Fed whole, identical on every iteration.
    Invariant { external_port_id: i64, body_parameter_index: usize },
}

impl InputDescription {
    pub fn body_parameter_index(&self) -> usize {
        match self {
            InputDescription::Slice { body_parameter_index, .. }
            | InputDescription::Merged { body_parameter_index, .. }
            | InputDescription::Invariant { body_parameter_index, .. } => *body_parameter_index,
        }
    }
}

/// How one body result materializes on an outer output port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDescription {
    /// Per-iteration results concatenated along `axis`.
    Concat {
        body_result_index: usize,
        output_index: usize,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    },
    /// The result of one iteration (`-1` is the last).
    Body { body_result_index: usize, output_index: usize, iteration: i64 },
}

impl OutputDescription {
    pub fn output_index(&self) -> usize {
        match self {
            OutputDescription::Concat { output_index, .. }
            | OutputDescription::Body { output_index, .. } => *output_index,
        }
    }

    pub fn body_result_index(&self) -> usize {
        match self {
            OutputDescription::Concat { body_result_index, .. }
            | OutputDescription::Body { body_result_index, .. } => *body_result_index,
        }
    }
}

/// Loop wiring of the trip-count machinery into the body. `-1` means the
/// body has no such port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialBodyPorts {
    pub current_iteration_input_idx: i64,
    pub body_condition_output_idx: i64,
}

impl Default for SpecialBodyPorts {
    fn default() -> SpecialBodyPorts {
        SpecialBodyPorts { current_iteration_input_idx: -1, body_condition_output_idx: -1 }
    }
}

fn infer_from_body(
    op: &'static str,
    body: Option<&Function>,
    output_descriptions: &[OutputDescription],
) -> XirResult<TVec<PortFact>> {
    let body = body.with_context(|| format!("{op} has no body"))?;
    let port_count =
        output_descriptions.iter().map(|d| d.output_index() + 1).max().unwrap_or(0);
    let mut facts = tvec!(PortFact::default(); port_count);
    for desc in output_descriptions {
        let result_node = *body
            .results
            .get(desc.body_result_index())
            .with_context(|| format!("{op} output maps to missing body result"))?;
        let mut fact = body.outlet_fact(OutletId::new(result_node, 0))?.clone();
        if let OutputDescription::Concat { axis, .. } = desc {
            // The iteration count is a runtime quantity.
            if let Some(dims) = fact.shape.dims() {
                let rank = dims.len() as i64;
                let axis = if *axis < 0 { *axis + rank } else { *axis };
                ensure!((0..rank).contains(&axis), "{op} concat axis {axis} out of rank {rank}");
                let mut dims: TVec<i64> = dims.into();
                dims[axis as usize] = -1;
                fact.shape = PartialShape::new(dims);
            }
        }
        facts[desc.output_index()] = fact;
    }
    Ok(facts)
}

#[derive(Debug, Clone, Default)]
pub struct TensorIterator {
    pub body: Option<Function>,
    pub input_descriptions: Vec<InputDescription>,
    pub output_descriptions: Vec<OutputDescription>,
}

impl Op for TensorIterator {
    fn name(&self) -> &'static str {
        "TensorIterator"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        // The body must come first: port descriptions resolve against it.
        if let Some(AttrValue::Function(f)) = visitor.fetch("body", AttrKind::Function)? {
            self.body = Some(f);
        }
        if let Some(AttrValue::InputDescriptions(d)) =
            visitor.fetch("input_descriptions", AttrKind::InputDescriptions)?
        {
            self.input_descriptions = d;
        }
        if let Some(AttrValue::OutputDescriptions(d)) =
            visitor.fetch("output_descriptions", AttrKind::OutputDescriptions)?
        {
            self.output_descriptions = d;
        }
        Ok(true)
    }

    fn infer(&self, _inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        infer_from_body("TensorIterator", self.body.as_ref(), &self.output_descriptions)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Loop {
    pub body: Option<Function>,
    pub input_descriptions: Vec<InputDescription>,
    pub output_descriptions: Vec<OutputDescription>,
    pub special_body_ports: SpecialBodyPorts,
}

impl Op for Loop {
    fn name(&self) -> &'static str {
        "Loop"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::Function(f)) = visitor.fetch("body", AttrKind::Function)? {
            self.body = Some(f);
        }
        if let Some(AttrValue::InputDescriptions(d)) =
            visitor.fetch("input_descriptions", AttrKind::InputDescriptions)?
        {
            self.input_descriptions = d;
        }
        if let Some(AttrValue::OutputDescriptions(d)) =
            visitor.fetch("output_descriptions", AttrKind::OutputDescriptions)?
        {
            self.output_descriptions = d;
        }
        if let Some(AttrValue::SpecialBodyPorts(p)) =
            visitor.fetch("special_body_ports", AttrKind::SpecialBodyPorts)?
        {
            self.special_body_ports = p;
        }
        Ok(true)
    }

    fn infer(&self, _inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        infer_from_body("Loop", self.body.as_ref(), &self.output_descriptions)
    }
}
