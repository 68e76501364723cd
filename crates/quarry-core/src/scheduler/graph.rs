//! Dependency ordering over provides/depends declarations.
//!
//! Passes form a graph through capabilities rather than direct references:
//! each pass names what it produces and what it consumes, and the producer
//! index is derived here. Ordering is leaves-first — a pass becomes eligible
//! once every producer of its dependencies has been placed — and is
//! deterministic for a fixed registration order.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::scheduler::Capability;

/// One pass's declarations, detached from the pass object for ordering
pub(crate) struct GraphNode {
    pub(crate) id: String,
    pub(crate) provides: Vec<Capability>,
    pub(crate) depends: Vec<Capability>,
}

/// Computes the execution order as indexes into `nodes`.
///
/// Fails fatally on a doubly-provided capability, a dependency with no
/// producer, or a cycle (detected when a full scan over the remaining passes
/// places nothing).
pub(crate) fn execution_order(nodes: &[GraphNode]) -> Result<Vec<usize>> {
    // Reverse index: capability -> the one pass producing it.
    let mut providers: HashMap<&Capability, usize> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for capability in &node.provides {
            if let Some(&first) = providers.get(capability) {
                return Err(Error::DuplicateProvider {
                    capability: capability.to_string(),
                    first: nodes[first].id.clone(),
                    second: node.id.clone(),
                });
            }
            providers.insert(capability, index);
        }
    }

    // childs[i]: producers pass i still waits on.
    let mut childs: Vec<HashSet<usize>> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut waiting = HashSet::new();
        for dependency in &node.depends {
            match providers.get(dependency) {
                Some(&producer) => {
                    waiting.insert(producer);
                }
                None => {
                    return Err(Error::UnknownCapability {
                        pass: node.id.clone(),
                        capability: dependency.to_string(),
                    });
                }
            }
        }
        childs.push(waiting);
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut placed = vec![false; nodes.len()];

    while order.len() < nodes.len() {
        let mut progressed = false;

        for index in 0..nodes.len() {
            if placed[index] || !childs[index].is_empty() {
                continue;
            }
            placed[index] = true;
            order.push(index);
            progressed = true;
            for waiting in childs.iter_mut() {
                waiting.remove(&index);
            }
        }

        if !progressed {
            let remaining = nodes
                .iter()
                .enumerate()
                .filter(|(index, _)| !placed[*index])
                .map(|(_, node)| node.id.clone())
                .collect();
            return Err(Error::DependencyCycle { remaining });
        }
    }

    Ok(order)
}
