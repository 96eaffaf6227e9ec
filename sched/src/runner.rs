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

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::Job;

/// Upper bound on the final command handed to the shell, terminator
/// included. Overflow is a job failure, never a truncation.
pub const MAX_CMD_SIZE: usize = 65536;

/// How a finished job is classified from its shell exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The job failed; eligible for requeueing.
    Failure,
    /// The job reported its execution place as unusable.
    BrokenPlace,
}

impl Outcome {
    fn from_status(status: std::process::ExitStatus, cmd: &str, warn_invalid: bool) -> Outcome {
        match status.code() {
            Some(0) => Outcome::Success,
            Some(1) => Outcome::Failure,
            Some(2) => Outcome::BrokenPlace,
            Some(code) => {
                if warn_invalid {
                    eprintln!(
                        "Invalid return code {} from: {}\nInterpreting this as a failure.",
                        code, cmd
                    );
                }
                Outcome::Failure
            }
            // Killed by a signal.
            None => Outcome::Failure,
        }
    }
}

/// The seam between the scheduler and actual process execution. Tests
/// substitute a scripted implementation; production uses [`ShellRunner`].
#[async_trait(?Send)]
pub trait JobRunner {
    async fn run(&self, job: &Job, place: usize, place_name: Option<&str>) -> Outcome;
}

/// Runs jobs by handing the final command string to `/bin/sh -c`, with the
/// job's execution place appended per the configured mode.
#[derive(Debug, Default)]
pub struct ShellRunner {
    /// Append the 1-based place index to each command (`-e`).
    pub pass_execution_place: bool,
    /// Warn about exit codes outside the understood range. Only meaningful
    /// when failures are requeued, so it tracks the retry switch.
    pub warn_invalid_codes: bool,
    pub verbose: bool,
}

impl ShellRunner {
    /// The command actually handed to the shell. With a machine list the
    /// place's display name is appended; otherwise `-e` appends the 1-based
    /// place index; otherwise the command is untouched.
    fn final_command(&self, job: &Job, place: usize, place_name: Option<&str>) -> Option<String> {
        let cmd = match place_name {
            Some(name) => format!("{} {}", job.spec.cmd, name),
            None if self.pass_execution_place => format!("{} {}", job.spec.cmd, place + 1),
            None => job.spec.cmd.clone(),
        };
        if cmd.len() >= MAX_CMD_SIZE {
            None
        } else {
            Some(cmd)
        }
    }
}

#[async_trait(?Send)]
impl JobRunner for ShellRunner {
    async fn run(&self, job: &Job, place: usize, place_name: Option<&str>) -> Outcome {
        let cmd = match self.final_command(job, place, place_name) {
            Some(cmd) => cmd,
            None => {
                eprintln!("Too long a command: {}", job.spec.cmd);
                return Outcome::Failure;
            }
        };

        if self.verbose {
            eprintln!("Job {} execute: {}", job.number, cmd);
        }

        match Command::new("/bin/sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .status()
            .await
        {
            Ok(status) => Outcome::from_status(status, &cmd, self.warn_invalid_codes),
            Err(err) => {
                eprintln!("Job delivery failed: {}: {}", cmd, err);
                Outcome::Failure
            }
        }
    }
}
