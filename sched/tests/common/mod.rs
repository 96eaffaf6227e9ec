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

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use jobqueue_sched::{Job, JobRunner, Outcome};

/// What a scripted run observed: the commands in issue order and the peak
/// number of simultaneously running jobs per place.
#[derive(Debug, Default)]
pub struct Trace {
    pub issued: Vec<String>,
    pub peak: Vec<usize>,
    running: Vec<usize>,
}

impl Trace {
    fn enter(&mut self, place: usize) {
        if self.running.len() <= place {
            self.running.resize(place + 1, 0);
            self.peak.resize(place + 1, 0);
        }
        self.running[place] += 1;
        if self.running[place] > self.peak[place] {
            self.peak[place] = self.running[place];
        }
    }

    fn leave(&mut self, place: usize) {
        self.running[place] -= 1;
    }
}

/// A runner that never touches a shell: each command resolves to a scripted
/// sequence of outcomes (then `Success` forever). Yields once mid-run so
/// concurrently issued jobs actually overlap.
pub struct ScriptedRunner {
    script: RefCell<HashMap<String, VecDeque<Outcome>>>,
    trace: Rc<RefCell<Trace>>,
}

impl ScriptedRunner {
    pub fn new() -> ScriptedRunner {
        ScriptedRunner {
            script: RefCell::new(HashMap::new()),
            trace: Rc::new(RefCell::new(Trace::default())),
        }
    }

    pub fn script(self, cmd: &str, outcomes: Vec<Outcome>) -> ScriptedRunner {
        self.script
            .borrow_mut()
            .insert(cmd.to_owned(), outcomes.into_iter().collect());
        self
    }

    pub fn trace(&self) -> Rc<RefCell<Trace>> {
        Rc::clone(&self.trace)
    }
}

#[async_trait(?Send)]
impl JobRunner for ScriptedRunner {
    async fn run(&self, job: &Job, place: usize, _place_name: Option<&str>) -> Outcome {
        self.trace.borrow_mut().issued.push(job.spec.cmd.clone());
        self.trace.borrow_mut().enter(place);
        yield_once().await;
        self.trace.borrow_mut().leave(place);

        self.script
            .borrow_mut()
            .get_mut(&job.spec.cmd)
            .and_then(|outcomes| outcomes.pop_front())
            .unwrap_or(Outcome::Success)
    }
}

pub fn yield_once() -> impl Future<Output = ()> {
    YieldOnce(false)
}

struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
