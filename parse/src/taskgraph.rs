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

//! The task-graph language. Two line forms, comments and blanks aside:
//!
//! ```text
//! NAME VALUE CMD...        a node: VALUE is its cost, CMD runs verbatim
//! SRC -> DST VALUE         a precedence edge with cost VALUE
//! ```
//!
//! Parsing stages nodes and edges into lists; `validate` then rejects
//! duplicate node names and edges referencing names never defined as
//! nodes. Cyclicity is checked by the queue that turns the staging lists
//! into an actual graph.

use std::collections::HashSet;
use std::io::{self, BufRead};

use thiserror::Error;

use crate::{read_stripped_line, skip_non_ws, skip_ws, useful_line};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub name: String,
    pub cost: f64,
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdge {
    pub src: String,
    pub dst: String,
    pub cost: f64,
}

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error("invalid task graph line: {file}:{line}")]
    MalformedLine { file: String, line: usize },
    #[error("invalid value '{value}' at {file}:{line}")]
    InvalidValue {
        file: String,
        line: usize,
        value: String,
    },
    #[error("duplicate node {0}")]
    DuplicateNode(String),
    #[error("edge {src} -> {dst} references unknown node {name}")]
    UnknownNode {
        name: String,
        src: String,
        dst: String,
    },
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Staging lists for a task graph, possibly accumulated over several input
/// files. Node order is first-seen order and is preserved downstream.
#[derive(Debug, Default)]
pub struct TaskGraphDesc {
    pub nodes: Vec<TaskNode>,
    pub edges: Vec<TaskEdge>,
}

impl TaskGraphDesc {
    /// Parse one input, appending to the staging lists. `file` names the
    /// input in diagnostics.
    pub fn parse_from<R: BufRead>(&mut self, file: &str, mut input: R) -> Result<(), TaskGraphError> {
        let mut lineno = 0;
        while let Some(line) = read_stripped_line(&mut input)? {
            lineno += 1;
            if !useful_line(&line) {
                continue;
            }
            self.parse_line(file, lineno, &line)?;
        }
        Ok(())
    }

    fn parse_line(&mut self, file: &str, lineno: usize, line: &str) -> Result<(), TaskGraphError> {
        let malformed = || TaskGraphError::MalformedLine {
            file: file.to_owned(),
            line: lineno,
        };

        let name_start = skip_ws(line, 0).ok_or_else(malformed)?;
        let name_end = skip_non_ws(line, name_start).ok_or_else(malformed)?;
        let name = &line[name_start..name_end];

        let token_start = skip_ws(line, name_end).ok_or_else(malformed)?;
        let token_end = skip_non_ws(line, token_start);
        let token = match token_end {
            Some(end) => &line[token_start..end],
            None => &line[token_start..],
        };

        if token == "->" {
            let arrow_end = token_end.ok_or_else(malformed)?;
            let dst_start = skip_ws(line, arrow_end).ok_or_else(malformed)?;
            let dst_end = skip_non_ws(line, dst_start).ok_or_else(malformed)?;
            let value_start = skip_ws(line, dst_end).ok_or_else(malformed)?;
            let cost = parse_value(file, lineno, &line[value_start..])?;

            self.edges.push(TaskEdge {
                src: name.to_owned(),
                dst: line[dst_start..dst_end].to_owned(),
                cost,
            });
        } else {
            // A node line. The command starts at the first non-whitespace
            // character after the value and runs verbatim to end of line.
            let value_end = token_end.ok_or_else(malformed)?;
            let cost = parse_value(file, lineno, token)?;
            let cmd_start = skip_ws(line, value_end).ok_or_else(malformed)?;

            self.nodes.push(TaskNode {
                name: name.to_owned(),
                cost,
                cmd: line[cmd_start..].to_owned(),
            });
        }

        Ok(())
    }

    /// Reject duplicate node names and edges whose endpoints were never
    /// defined as nodes.
    pub fn validate(&self) -> Result<(), TaskGraphError> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(TaskGraphError::DuplicateNode(node.name.clone()));
            }
        }

        for edge in &self.edges {
            for name in &[&edge.src, &edge.dst] {
                if !names.contains(name.as_str()) {
                    return Err(TaskGraphError::UnknownNode {
                        name: (*name).clone(),
                        src: edge.src.clone(),
                        dst: edge.dst.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn parse_value(file: &str, line: usize, value: &str) -> Result<f64, TaskGraphError> {
    match value.parse::<f64>() {
        Ok(cost) if cost >= 0.0 => Ok(cost),
        _ => Err(TaskGraphError::InvalidValue {
            file: file.to_owned(),
            line,
            value: value.to_owned(),
        }),
    }
}
