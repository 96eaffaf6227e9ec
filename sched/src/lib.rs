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

//! The scheduler. Pairs ready jobs with idle execution places, supervises
//! one child process per in-flight job, classifies acknowledgements and
//! drives requeue-with-cap and place retirement.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures::future::select_all;
use thiserror::Error;
use tokio::{runtime::Builder, task::LocalSet};

use jobqueue_queue::{JobSource, JobSpec};

pub mod place;
mod printer;
pub mod runner;

pub use place::PlaceTable;
pub use runner::{JobRunner, Outcome, ShellRunner, MAX_CMD_SIZE};

use printer::Printer;

/// A job the scheduler has admitted: the source's spec plus an identity and
/// a retry counter. Identifiers are assigned strictly increasingly at
/// admission and survive requeueing.
#[derive(Debug)]
pub struct Job {
    pub number: usize,
    pub spec: JobSpec,
    pub retries: usize,
}

/// The one record a finished job produces, consumed by the scheduler to
/// advance state. The runner resolves to exactly one of these per issue.
#[derive(Debug)]
pub struct JobAck {
    pub job: Job,
    pub place: usize,
    pub outcome: Outcome,
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("all execution places have died")]
    AllPlacesBroken,
    #[error("can not start the scheduler runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleOpts {
    /// Maximum requeues per job. Zero disables failure handling entirely;
    /// `usize::max_value()` is the unbounded `-r` mode.
    pub max_restarts: usize,
    pub verbose: bool,
    /// Declared total job count for ETA reporting, when known.
    pub eta_jobs: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub jobs_read: usize,
    pub jobs_done: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Issue,
    Wait,
    Exit,
}

/* Finite state machine for job handling.
 *
 * PI = "possible to issue": some place has headroom.
 * SI = "something to issue": requeued jobs exist or the source is live.
 * SW = "something to wait": at least one job is in flight.
 *
 *  state | PI | SI | SW | Action
 *  -----------------------------
 *  0     | 0    0    0  | EXIT
 *  1     | 0    0    1  | WAIT
 *  2     | 0    1    0  | WAIT
 *  3     | 0    1    1  | WAIT
 *  4     | 1    0    0  | EXIT
 *  5     | 1    0    1  | WAIT
 *  6     | 1    1    0  | ISSUE
 *  7     | 1    1    1  | ISSUE
 */
fn next_step(possible_to_issue: bool, something_to_issue: bool, something_to_wait: bool) -> Step {
    if possible_to_issue && something_to_issue {
        Step::Issue
    } else if !something_to_issue && !something_to_wait {
        Step::Exit
    } else {
        Step::Wait
    }
}

type AckFuture = Pin<Box<dyn Future<Output = JobAck>>>;

pub struct Scheduler<R> {
    places: PlaceTable,
    runner: Rc<R>,
    opts: ScheduleOpts,
}

impl<R: JobRunner + 'static> Scheduler<R> {
    pub fn new(places: PlaceTable, runner: R, opts: ScheduleOpts) -> Scheduler<R> {
        Scheduler {
            places,
            runner: Rc::new(runner),
            opts,
        }
    }

    /// Run the source dry. Blocks until every admitted job has terminally
    /// succeeded or exhausted its retries, or until a fatal condition.
    pub fn schedule(mut self, source: &mut dyn JobSource) -> Result<ScheduleStats, ScheduleError> {
        let local_set = LocalSet::new();
        let mut runtime = Builder::new().enable_all().basic_scheduler().build()?;
        local_set.block_on(&mut runtime, self.run(source))
    }

    async fn run(&mut self, source: &mut dyn JobSource) -> Result<ScheduleStats, ScheduleError> {
        let printer = Printer::new(self.opts.verbose, self.opts.eta_jobs);
        let mut pending: Vec<AckFuture> = Vec::new();
        let mut failed: VecDeque<Job> = VecDeque::new();
        let mut jobs_read = 0usize;
        let mut jobs_done = 0usize;
        let mut exit_mode = false;

        loop {
            if self.places.all_broken() {
                return Err(ScheduleError::AllPlacesBroken);
            }

            let free_place = self.places.first_free();
            let possible_to_issue = free_place.is_some();
            let something_to_issue = !failed.is_empty() || !exit_mode;
            let something_to_wait = jobs_done < jobs_read;

            match next_step(possible_to_issue, something_to_issue, something_to_wait) {
                Step::Issue => {
                    // Requeued jobs go before fresh ones; only fresh jobs
                    // get an identifier and count towards jobs_read.
                    let job = match failed.pop_front() {
                        Some(job) => Some(job),
                        None => match source.next_job() {
                            Some(spec) => {
                                let job = Job {
                                    number: jobs_read,
                                    spec,
                                    retries: 0,
                                };
                                jobs_read += 1;
                                Some(job)
                            }
                            None => None,
                        },
                    };

                    match job {
                        Some(job) => {
                            let place = match free_place {
                                Some(place) => place,
                                None => unreachable!("issue step without a free place"),
                            };
                            self.issue(&mut pending, job, place);
                        }
                        None if source.drained() => {
                            // No more jobs ever; drain what is in flight.
                            exit_mode = true;
                        }
                        None => {
                            // Every currently-ready job is in flight; an
                            // acknowledgement has to land before the source
                            // can produce again.
                            if pending.is_empty() {
                                debug_assert!(false, "source stalled with nothing in flight");
                                exit_mode = true;
                                continue;
                            }
                            let ack = Self::wait(&mut pending).await;
                            self.process_ack(ack, &mut failed, &mut jobs_done, source, &printer);
                        }
                    }
                }
                Step::Wait => {
                    let ack = Self::wait(&mut pending).await;
                    self.process_ack(ack, &mut failed, &mut jobs_done, source, &printer);
                }
                Step::Exit => break,
            }
        }

        printer.all_done(jobs_done);
        let skipped = source.skipped();
        if skipped > 0 {
            printer.skipped(skipped);
        }

        Ok(ScheduleStats {
            jobs_read,
            jobs_done,
            skipped,
        })
    }

    fn issue(&mut self, pending: &mut Vec<AckFuture>, job: Job, place: usize) {
        self.places.issue(place);
        let runner = Rc::clone(&self.runner);
        let name = self.places.name(place).map(str::to_owned);
        pending.push(Box::pin(async move {
            let outcome = runner.run(&job, place, name.as_deref()).await;
            JobAck {
                job,
                place,
                outcome,
            }
        }));
    }

    async fn wait(pending: &mut Vec<AckFuture>) -> JobAck {
        debug_assert!(!pending.is_empty());
        let (ack, _, rest) = select_all(std::mem::replace(pending, Vec::new())).await;
        *pending = rest;
        ack
    }

    fn process_ack(
        &mut self,
        ack: JobAck,
        failed: &mut VecDeque<Job>,
        jobs_done: &mut usize,
        source: &mut dyn JobSource,
        printer: &Printer,
    ) {
        let JobAck {
            mut job,
            place,
            outcome,
        } = ack;
        debug_assert!(place < self.places.len());

        let retries_enabled = self.opts.max_restarts > 0;

        // Breakage only means anything under the retry policy; without it a
        // BrokenPlace outcome is an ordinary failure.
        if retries_enabled && outcome == Outcome::BrokenPlace && !self.places.is_broken(place) {
            self.places.mark_broken(place);
            printer.place_broken(place, self.places.name(place));
        }
        self.places.release(place);

        let mut job_done = true;
        if retries_enabled && outcome != Outcome::Success && job.retries < self.opts.max_restarts {
            job.retries += 1;
            job_done = false;
        }

        printer.job_finished(&job, outcome);

        if job_done {
            *jobs_done += 1;
            printer.progress(*jobs_done);
            source.job_finished(&job.spec, outcome == Outcome::Success);
        } else {
            failed.push_back(job);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{next_step, Step};

    #[test]
    fn fsm_transition_table() {
        // (possible_to_issue, something_to_issue, something_to_wait)
        assert_eq!(next_step(false, false, false), Step::Exit);
        assert_eq!(next_step(false, false, true), Step::Wait);
        assert_eq!(next_step(false, true, false), Step::Wait);
        assert_eq!(next_step(false, true, true), Step::Wait);
        assert_eq!(next_step(true, false, false), Step::Exit);
        assert_eq!(next_step(true, false, true), Step::Wait);
        assert_eq!(next_step(true, true, false), Step::Issue);
        assert_eq!(next_step(true, true, true), Step::Issue);
    }
}
