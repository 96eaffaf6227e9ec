/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Directed graph algorithms shared by the task-graph job source.
//!
//! The graph container itself is `petgraph::Graph`; this crate adds the two
//! operations scheduling needs on top of it: a topological order that
//! reports cycles, and b-levels (the longest weighted path from a node to
//! any exit node), which drive critical-path job selection.

use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("graph contains a cycle through node {0}")]
pub struct CycleError(pub usize);

/// Node indices in ancestor-first order: for every edge u -> v, u appears
/// before v. A cyclic graph yields no order.
pub fn topo_order<N, E>(graph: &Graph<N, E>) -> Result<Vec<NodeIndex>, CycleError> {
    petgraph::algo::toposort(graph, None).map_err(|cycle| CycleError(cycle.node_id().index()))
}

/// Longest weighted path from each node to any exit, indexed by node.
///
/// B(v) = w(v) for an exit node, otherwise
/// B(v) = w(v) + max over outgoing edges v -> u of (B(u) + w(v -> u)).
///
/// Children are resolved before their parents by walking the reverse
/// topological order, so a cyclic graph is an error. Linear in nodes plus
/// edges.
pub fn b_levels<N, E, NW, EW>(
    graph: &Graph<N, E>,
    node_weight: NW,
    edge_weight: EW,
) -> Result<Vec<f64>, CycleError>
where
    NW: Fn(NodeIndex) -> f64,
    EW: Fn(EdgeIndex) -> f64,
{
    let order = topo_order(graph)?;
    let mut levels = vec![0.0; graph.node_count()];

    for &node in order.iter().rev() {
        let mut deepest: Option<f64> = None;
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let down = levels[edge.target().index()] + edge_weight(edge.id());
            deepest = Some(match deepest {
                Some(best) => best.max(down),
                None => down,
            });
        }
        levels[node.index()] = node_weight(node) + deepest.unwrap_or(0.0);
    }

    Ok(levels)
}
