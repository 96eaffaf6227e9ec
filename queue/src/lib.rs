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

//! Job sources. The scheduler pulls work through the [`JobSource`]
//! capability trait and never looks behind it; the two implementations are
//! a plain command stream (lines of shell commands from files or stdin)
//! and a precedence-aware task-graph queue.

use petgraph::graph::NodeIndex;

mod command_stream;
mod task_graph;

pub use command_stream::CommandStream;
pub use task_graph::{TaskGraphQueue, TaskGraphQueueError};

/// One unit of work as produced by a source. `node` ties a job back to its
/// task-graph node so the source can be told when it finishes; command
/// streams leave it unset.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub cmd: String,
    pub node: Option<NodeIndex>,
}

impl JobSpec {
    pub fn command(cmd: String) -> JobSpec {
        JobSpec { cmd, node: None }
    }
}

pub trait JobSource {
    /// The next job ready to run, if any. `None` either means the source is
    /// drained for good, or (task-graph mode) that every currently-ready
    /// job is already in flight; `drained` tells the two apart.
    fn next_job(&mut self) -> Option<JobSpec>;

    /// True once the source can never produce another job.
    fn drained(&self) -> bool;

    /// Observe the terminal fate of a job this source produced. Called
    /// exactly once per job, after retries are exhausted or on success.
    fn job_finished(&mut self, _job: &JobSpec, _success: bool) {}

    /// Jobs this source decided never to run (their predecessors failed).
    fn skipped(&self) -> usize {
        0
    }
}
