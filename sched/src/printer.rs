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

use std::time::Instant;

use console::Term;

use crate::runner::Outcome;
use crate::Job;

/// Scheduler-side progress and diagnostic output, all on stderr so job
/// output on stdout stays clean.
pub struct Printer {
    term: Term,
    verbose: bool,
    eta: Option<Eta>,
}

struct Eta {
    total: usize,
    started: Instant,
}

impl Printer {
    pub fn new(verbose: bool, eta_jobs: Option<usize>) -> Printer {
        Printer {
            term: Term::stderr(),
            verbose,
            eta: eta_jobs.map(|total| Eta {
                total,
                started: Instant::now(),
            }),
        }
    }

    fn line(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub fn job_finished(&self, job: &Job, outcome: Outcome) {
        if self.verbose {
            self.line(&format!(
                "Job {} finished {}",
                job.number,
                if outcome == Outcome::Success {
                    "successfully"
                } else {
                    "unsuccessfully"
                }
            ));
        }
    }

    /// Estimated time remaining, from elapsed wall time and the declared
    /// total (`-c`).
    pub fn progress(&self, jobs_done: usize) {
        if let Some(eta) = &self.eta {
            if jobs_done > 0 && jobs_done < eta.total {
                let elapsed = eta.started.elapsed().as_secs_f64();
                let left = elapsed * (eta.total - jobs_done) as f64 / jobs_done as f64;
                self.line(&format!(
                    "ETA: {:.1}s ({}/{} jobs done)",
                    left, jobs_done, eta.total
                ));
            }
        }
    }

    pub fn place_broken(&self, place: usize, name: Option<&str>) {
        let shown = match name {
            Some(name) => name.to_owned(),
            None => (place + 1).to_string(),
        };
        self.line(&format!("Execution place {} is broken.", shown));
        self.line("Not issuing new jobs for that place.");
    }

    pub fn all_done(&self, jobs_done: usize) {
        if self.verbose {
            self.line(&format!("All jobs done ({})", jobs_done));
        }
    }

    pub fn skipped(&self, skipped: usize) {
        if self.verbose {
            self.line(&format!(
                "Skipped {} jobs whose predecessors failed",
                skipped
            ));
        }
    }
}
