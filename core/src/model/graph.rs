use super::node::{InletId, Node, Outlet, OutletId, PortFact};
use crate::errors::XirResult;
use crate::ops::Op;
use crate::TVec;
use anyhow::{bail, Context};
use std::fmt;

/// A fully wired computation graph.
///
/// Nodes are owned in construction order; `parameters`, `results` and
/// `sinks` index into `nodes`. A `Function` returned by the loader is
/// topologically valid: every data input of a node points at an earlier
/// node.
#[derive(Clone, Debug, Default)]
pub struct Function {
    pub name: String,
    pub nodes: Vec<Node>,
    pub parameters: Vec<usize>,
    pub results: Vec<usize>,
    pub sinks: Vec<usize>,
}

impl Function {
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op: Box<dyn Op>,
        output_facts: TVec<PortFact>,
    ) -> usize {
        let id = self.nodes.len();
        let outputs =
            output_facts.into_iter().map(|fact| Outlet { fact, ..Outlet::default() }).collect();
        self.nodes.push(Node {
            id,
            name: name.into(),
            op,
            inputs: vec![],
            control_inputs: vec![],
            outputs,
            rt_info: Default::default(),
        });
        id
    }

    /// Connect a node outlet to a node inlet. Inlets of a node must be
    /// connected in order and without gaps.
    pub fn add_edge(&mut self, outlet: OutletId, inlet: InletId) -> XirResult<()> {
        {
            let prec = &mut self.nodes[outlet.node];
            prec.outputs
                .get_mut(outlet.slot)
                .with_context(|| format!("invalid outlet {outlet:?}"))?
                .successors
                .push(inlet);
        }
        let succ = &mut self.nodes[inlet.node];
        if inlet.slot == succ.inputs.len() {
            succ.inputs.push(outlet);
        } else {
            bail!("edges must be added in order and consecutive, input {} of {}", inlet.slot, succ)
        }
        Ok(())
    }

    /// Record an execution-order dependency of `node` on `dep`.
    pub fn add_control_edge(&mut self, node: usize, dep: usize) {
        self.nodes[node].control_inputs.push(dep);
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn outlet_fact(&self, outlet: OutletId) -> XirResult<&PortFact> {
        self.nodes[outlet.node]
            .outputs
            .get(outlet.slot)
            .map(|o| &o.fact)
            .with_context(|| format!("invalid outlet reference {outlet:?}"))
    }

    pub fn node_input_facts(&self, id: usize) -> XirResult<TVec<&PortFact>> {
        self.nodes[id].inputs.iter().map(|o| self.outlet_fact(*o)).collect()
    }

    pub fn node_by_name(&self, name: &str) -> XirResult<&Node> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .with_context(|| format!("no node found for name \"{name}\""))
    }

    /// Data-flow evaluation order from results and sinks.
    pub fn eval_order(&self) -> XirResult<Vec<usize>> {
        super::order::eval_order(self)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(fmt, "Function \"{}\" ({} nodes)", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(
                fmt,
                "  {:3} {:20} {:25} inputs: {:?}",
                node.id,
                node.op.name(),
                node.name,
                node.inputs
            )?;
        }
        Ok(())
    }
}
