use super::graph::Function;
use crate::errors::XirResult;
use std::collections::HashSet;

/// Evaluation order for a wired function: every node comes after all of
/// its data and control predecessors. Results and sinks seed the walk.
pub fn eval_order(function: &Function) -> XirResult<Vec<usize>> {
    let targets: Vec<usize> =
        function.results.iter().chain(function.sinks.iter()).copied().collect();
    let mut done: HashSet<usize> = HashSet::default();
    let mut order: Vec<usize> = vec![];
    let mut needed: Vec<usize> = targets;
    while let Some(&node) = needed.last() {
        if done.contains(&node) {
            needed.pop();
            continue;
        }
        let n = function.node(node);
        let pending: Vec<usize> = n
            .inputs
            .iter()
            .map(|i| i.node)
            .chain(n.control_inputs.iter().copied())
            .filter(|p| !done.contains(p))
            .collect();
        if pending.is_empty() {
            order.push(node);
            needed.pop();
            done.insert(node);
        } else {
            needed.extend(pending.into_iter().rev());
        }
    }
    Ok(order)
}
