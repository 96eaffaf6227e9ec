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

//! Parsers for the three line-oriented input formats jobqueue consumes:
//! job lists (one shell command per line), machine lists and task graphs.
//! All of them share the same notion of a "useful" line.

use std::io::{self, BufRead};

mod machine_list;
mod taskgraph;

pub use machine_list::{parse_machine_list, Machine};
pub use taskgraph::{TaskEdge, TaskGraphDesc, TaskGraphError, TaskNode};

/// A line worth acting on: non-empty, not all whitespace and not a
/// `#` comment.
pub fn useful_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#') && line.chars().any(|c| !c.is_whitespace())
}

/// Read one line with the trailing newline stripped, or `None` at end of
/// input. `read_line` resumes interrupted reads internally, so a signal
/// landing mid-read is not mistaken for end of file.
pub fn read_stripped_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(Some(line))
}

/// Offset of the first non-whitespace character at or after `i`.
fn skip_ws(s: &str, i: usize) -> Option<usize> {
    s[i..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(j, _)| i + j)
}

/// Offset of the first whitespace character at or after `i`, or `None`
/// when the token runs to the end of the line.
fn skip_non_ws(s: &str, i: usize) -> Option<usize> {
    s[i..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(j, _)| i + j)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn useful_lines() {
        assert!(useful_line("echo hello"));
        assert!(useful_line("  indented"));
        assert!(!useful_line(""));
        assert!(!useful_line("   \t  "));
        assert!(!useful_line("# a comment"));
    }

    #[test]
    fn stripping_keeps_everything_but_the_newline() {
        let mut input = Cursor::new("one\ntwo  \nthree");
        assert_eq!(read_stripped_line(&mut input).unwrap().unwrap(), "one");
        assert_eq!(read_stripped_line(&mut input).unwrap().unwrap(), "two  ");
        assert_eq!(read_stripped_line(&mut input).unwrap().unwrap(), "three");
        assert_eq!(read_stripped_line(&mut input).unwrap(), None);
    }

    #[test]
    fn token_scanning() {
        assert_eq!(skip_ws("  a b", 0), Some(2));
        assert_eq!(skip_ws("a", 1), None);
        assert_eq!(skip_non_ws("ab cd", 0), Some(2));
        assert_eq!(skip_non_ws("ab", 0), None);
    }
}
