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

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use jobqueue_parse::{read_stripped_line, useful_line};

use crate::{JobSource, JobSpec};

/// Commands read one useful line at a time from a chain of input files.
/// Files are opened lazily; one that cannot be opened is warned about and
/// skipped, so a run with no openable input simply drains immediately.
pub struct CommandStream {
    pending: VecDeque<PathBuf>,
    current: Option<Box<dyn BufRead>>,
    drained: bool,
}

impl CommandStream {
    pub fn from_files<I>(files: I) -> CommandStream
    where
        I: IntoIterator<Item = PathBuf>,
    {
        CommandStream {
            pending: files.into_iter().collect(),
            current: None,
            drained: false,
        }
    }

    /// A stream over an already-open input, used for stdin.
    pub fn from_reader(input: Box<dyn BufRead>) -> CommandStream {
        CommandStream {
            pending: VecDeque::new(),
            current: Some(input),
            drained: false,
        }
    }

    fn open_next(&mut self) -> Option<Box<dyn BufRead>> {
        while let Some(path) = self.pending.pop_front() {
            match File::open(&path) {
                Ok(file) => return Some(Box::new(BufReader::new(file))),
                Err(err) => eprintln!("Can't open file {}: {}", path.display(), err),
            }
        }
        None
    }
}

impl JobSource for CommandStream {
    fn next_job(&mut self) -> Option<JobSpec> {
        loop {
            let mut reader = match self.current.take() {
                Some(reader) => reader,
                None => match self.open_next() {
                    Some(reader) => reader,
                    None => {
                        self.drained = true;
                        return None;
                    }
                },
            };

            match read_stripped_line(&mut reader) {
                Ok(Some(line)) => {
                    self.current = Some(reader);
                    if useful_line(&line) {
                        return Some(JobSpec::command(line));
                    }
                }
                // End of this file; fall through to the next one.
                Ok(None) => {}
                Err(err) => eprintln!("Error reading job list: {}", err),
            }
        }
    }

    fn drained(&self) -> bool {
        self.drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(mut stream: CommandStream) -> Vec<String> {
        let mut cmds = Vec::new();
        while let Some(job) = stream.next_job() {
            cmds.push(job.cmd);
        }
        assert!(stream.drained());
        cmds
    }

    fn reader(input: &str) -> Box<dyn BufRead> {
        Box::new(Cursor::new(input.as_bytes().to_vec()))
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("jobqueue-cs-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn skips_comments_blanks_and_whitespace() {
        let stream = CommandStream::from_reader(reader("echo a\n\n# nope\n   \n  echo b\n"));
        assert_eq!(collect(stream), vec!["echo a", "  echo b"]);
    }

    #[test]
    fn empty_input_is_drained_from_the_start() {
        let mut stream = CommandStream::from_reader(reader(""));
        assert!(!stream.drained());
        assert!(stream.next_job().is_none());
        assert!(stream.drained());
    }

    #[test]
    fn chains_files_in_order() {
        let one = temp_file("chain-one", "echo 1\n");
        let two = temp_file("chain-two", "echo 2\necho 3\n");
        let stream = CommandStream::from_files(vec![one.clone(), two.clone()]);
        assert_eq!(collect(stream), vec!["echo 1", "echo 2", "echo 3"]);
        let _ = std::fs::remove_file(one);
        let _ = std::fs::remove_file(two);
    }

    #[test]
    fn unopenable_files_are_skipped() {
        let real = temp_file("skip-real", "echo ok\n");
        let stream = CommandStream::from_files(vec![
            PathBuf::from("/nonexistent/jobqueue-test"),
            real.clone(),
        ]);
        assert_eq!(collect(stream), vec!["echo ok"]);
        let _ = std::fs::remove_file(real);
    }
}
