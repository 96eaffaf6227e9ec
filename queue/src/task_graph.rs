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

use std::collections::HashMap;

use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use thiserror::Error;

use jobqueue_graph::b_levels;
use jobqueue_parse::{TaskGraphDesc, TaskGraphError, TaskNode};

use crate::{JobSource, JobSpec};

#[derive(Error, Debug)]
pub enum TaskGraphQueueError {
    #[error(transparent)]
    Desc(#[from] TaskGraphError),
    #[error("task graph contains a cycle through node {0}")]
    Cycle(String),
}

/// Job source over a weighted task DAG. A node becomes ready once every
/// predecessor has terminally succeeded; among ready nodes the one with the
/// greatest b-level goes first, approximating critical-path scheduling.
/// When a node terminally fails, everything downstream of it is retired
/// without running.
pub struct TaskGraphQueue {
    graph: Graph<TaskNode, f64>,
    blevel: Vec<f64>,
    npreds: Vec<usize>,
    done: Vec<bool>,
    ready: Vec<NodeIndex>,
    remaining: usize,
    nskipped: usize,
}

impl TaskGraphQueue {
    pub fn new(desc: TaskGraphDesc) -> Result<TaskGraphQueue, TaskGraphQueueError> {
        desc.validate()?;

        let mut graph = Graph::new();
        let mut index = HashMap::new();
        for node in desc.nodes {
            let name = node.name.clone();
            let idx = graph.add_node(node);
            index.insert(name, idx);
        }
        for edge in desc.edges {
            // validate() guarantees both endpoints exist.
            if let (Some(&src), Some(&dst)) = (index.get(&edge.src), index.get(&edge.dst)) {
                graph.add_edge(src, dst, edge.cost);
            }
        }

        let blevel = b_levels(&graph, |n| graph[n].cost, |e| graph[e])
            .map_err(|cycle| TaskGraphQueueError::Cycle(graph[NodeIndex::new(cycle.0)].name.clone()))?;

        let npreds: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.edges_directed(n, Direction::Incoming).count())
            .collect();
        let ready: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|n| npreds[n.index()] == 0)
            .collect();
        let remaining = graph.node_count();
        let done = vec![false; remaining];

        Ok(TaskGraphQueue {
            graph,
            blevel,
            npreds,
            done,
            ready,
            remaining,
            nskipped: 0,
        })
    }

    fn promote_successors(&mut self, node: NodeIndex) {
        for edge in self.graph.edges_directed(node, Direction::Outgoing) {
            let dst = edge.target();
            self.npreds[dst.index()] -= 1;
            if self.npreds[dst.index()] == 0 && !self.done[dst.index()] {
                self.ready.push(dst);
            }
        }
    }

    fn skip_dependents(&mut self, node: NodeIndex) {
        let mut stack = vec![node];
        while let Some(failed) = stack.pop() {
            for dst in self.graph.neighbors_directed(failed, Direction::Outgoing) {
                if self.done[dst.index()] {
                    continue;
                }
                self.done[dst.index()] = true;
                self.remaining -= 1;
                self.nskipped += 1;
                stack.push(dst);
            }
        }
    }
}

impl JobSource for TaskGraphQueue {
    fn next_job(&mut self) -> Option<JobSpec> {
        if self.ready.is_empty() {
            return None;
        }

        // Greatest b-level wins; equal levels fall back to insertion order.
        let mut best = 0;
        for i in 1..self.ready.len() {
            let (a, b) = (self.ready[i], self.ready[best]);
            let (la, lb) = (self.blevel[a.index()], self.blevel[b.index()]);
            if la > lb || (la == lb && a.index() < b.index()) {
                best = i;
            }
        }

        let node = self.ready.remove(best);
        Some(JobSpec {
            cmd: self.graph[node].cmd.clone(),
            node: Some(node),
        })
    }

    fn drained(&self) -> bool {
        self.remaining == 0
    }

    fn job_finished(&mut self, job: &JobSpec, success: bool) {
        let node = match job.node {
            Some(node) => node,
            None => return,
        };
        if self.done[node.index()] {
            return;
        }
        self.done[node.index()] = true;
        self.remaining -= 1;

        if success {
            self.promote_successors(node);
        } else {
            self.skip_dependents(node);
        }
    }

    fn skipped(&self) -> usize {
        self.nskipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn queue(input: &str) -> TaskGraphQueue {
        let mut desc = TaskGraphDesc::default();
        desc.parse_from("test.tg", Cursor::new(input)).unwrap();
        TaskGraphQueue::new(desc).unwrap()
    }

    fn finish(queue: &mut TaskGraphQueue, job: &JobSpec, success: bool) {
        queue.job_finished(job, success);
    }

    #[test]
    fn roots_are_ready_in_critical_path_order() {
        // B heads the longer weighted path, so it goes before A.
        let mut q = queue("A 1 echo a\nB 1 echo b\nC 5 echo c\nB -> C 1\n");
        assert_eq!(q.next_job().unwrap().cmd, "echo b");
        assert_eq!(q.next_job().unwrap().cmd, "echo a");
        assert!(q.next_job().is_none());
        assert!(!q.drained());
    }

    #[test]
    fn equal_levels_fall_back_to_insertion_order() {
        let mut q = queue("A 1 echo a\nB 1 echo b\nC 1 echo c\n");
        assert_eq!(q.next_job().unwrap().cmd, "echo a");
        assert_eq!(q.next_job().unwrap().cmd, "echo b");
        assert_eq!(q.next_job().unwrap().cmd, "echo c");
    }

    #[test]
    fn successors_wait_for_every_predecessor() {
        let mut q = queue("A 1 echo a\nB 1 echo b\nC 1 echo c\nA -> C 0\nB -> C 0\n");
        let a = q.next_job().unwrap();
        let b = q.next_job().unwrap();
        assert!(q.next_job().is_none());

        finish(&mut q, &a, true);
        assert!(q.next_job().is_none(), "C still waits on B");

        finish(&mut q, &b, true);
        assert_eq!(q.next_job().unwrap().cmd, "echo c");
        assert!(!q.drained());
    }

    #[test]
    fn drains_once_every_node_is_finished() {
        let mut q = queue("A 1 echo a\n");
        let a = q.next_job().unwrap();
        assert!(!q.drained());
        finish(&mut q, &a, true);
        assert!(q.drained());
        assert!(q.next_job().is_none());
    }

    #[test]
    fn failure_retires_all_transitive_dependents() {
        let mut q = queue(
            "A 1 echo a\nB 1 echo b\nC 1 echo c\nD 1 echo d\nA -> B 0\nB -> C 0\nA -> D 0\n",
        );
        let a = q.next_job().unwrap();
        finish(&mut q, &a, false);

        assert!(q.next_job().is_none());
        assert!(q.drained());
        assert_eq!(q.skipped(), 3);
    }

    #[test]
    fn failure_spares_independent_work() {
        let mut q = queue("A 1 echo a\nB 1 echo b\nC 1 echo c\nA -> C 0\n");
        let a = q.next_job().unwrap();
        let b = q.next_job().unwrap();
        finish(&mut q, &a, false);

        assert_eq!(q.skipped(), 1);
        assert!(!q.drained());
        finish(&mut q, &b, true);
        assert!(q.drained());
    }

    #[test]
    fn cycles_are_fatal() {
        let mut desc = TaskGraphDesc::default();
        desc.parse_from(
            "test.tg",
            Cursor::new("A 1 echo a\nB 1 echo b\nA -> B 0\nB -> A 0\n"),
        )
        .unwrap();
        match TaskGraphQueue::new(desc) {
            Err(TaskGraphQueueError::Cycle(_)) => {}
            other => panic!("expected a cycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn duplicate_nodes_are_fatal() {
        let mut desc = TaskGraphDesc::default();
        desc.parse_from("test.tg", Cursor::new("A 1 echo a\nA 1 echo again\n"))
            .unwrap();
        assert!(TaskGraphQueue::new(desc).is_err());
    }
}
