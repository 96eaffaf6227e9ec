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

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};

use jobqueue_parse::{parse_machine_list, TaskGraphDesc};
use jobqueue_queue::{CommandStream, JobSource, TaskGraphQueue};
use jobqueue_sched::{PlaceTable, ScheduleOpts, Scheduler, ShellRunner};

#[derive(Debug)]
pub struct Config {
    /// Execution place count when no machine list is given.
    pub nodes: usize,
    pub machine_list: Option<String>,
    pub pass_execution_place: bool,
    /// Requeue budget per job; 0 disables failure handling.
    pub max_restarts: usize,
    pub task_graph: bool,
    pub verbose: bool,
    /// Per-place cap override; defaults to 1 (or the machine list's caps).
    pub max_issue: Option<usize>,
    /// Declared total job count for ETA reporting.
    pub eta_jobs: Option<usize>,
    pub files: Vec<String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            nodes: 1,
            machine_list: None,
            pass_execution_place: false,
            max_restarts: 0,
            task_graph: false,
            verbose: false,
            max_issue: None,
            eta_jobs: None,
            files: Vec::new(),
        }
    }
}

fn build_places(config: &Config) -> anyhow::Result<PlaceTable> {
    match &config.machine_list {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening machine list {}", path))?;
            let machines = parse_machine_list(BufReader::new(file))
                .with_context(|| format!("reading machine list {}", path))?;
            if machines.is_empty() {
                bail!("machine list {} contains no machines", path);
            }
            Ok(PlaceTable::from_machines(machines, config.max_issue))
        }
        None => Ok(PlaceTable::identical(
            config.nodes,
            config.max_issue.unwrap_or(1),
        )),
    }
}

fn build_source(config: &Config) -> anyhow::Result<Box<dyn JobSource>> {
    if config.task_graph {
        let mut desc = TaskGraphDesc::default();
        if config.files.is_empty() {
            desc.parse_from("<stdin>", BufReader::new(io::stdin()))?;
        } else {
            for path in &config.files {
                // An unopenable graph file is only a warning, like any
                // other job input.
                match File::open(path) {
                    Ok(file) => desc.parse_from(path, BufReader::new(file))?,
                    Err(err) => eprintln!("Can't open file {}: {}", path, err),
                }
            }
        }
        Ok(Box::new(TaskGraphQueue::new(desc)?))
    } else if config.files.is_empty() {
        Ok(Box::new(CommandStream::from_reader(Box::new(
            BufReader::new(io::stdin()),
        ))))
    } else {
        Ok(Box::new(CommandStream::from_files(
            config.files.iter().map(PathBuf::from).collect::<Vec<_>>(),
        )))
    }
}

pub fn run(config: Config) -> anyhow::Result<()> {
    let places = build_places(&config)?;
    let mut source = build_source(&config)?;

    let runner = ShellRunner {
        pass_execution_place: config.pass_execution_place,
        warn_invalid_codes: config.max_restarts > 0,
        verbose: config.verbose,
    };
    let opts = ScheduleOpts {
        max_restarts: config.max_restarts,
        verbose: config.verbose,
        eta_jobs: config.eta_jobs,
    };

    Scheduler::new(places, runner, opts).schedule(source.as_mut())?;
    Ok(())
}
