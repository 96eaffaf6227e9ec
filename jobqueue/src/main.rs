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

use anyhow::bail;
use jobqueue::{run, Config};

fn print_usage() {
    let called_as = std::env::args().next();
    eprintln!(
        r#"usage: {} [options] [FILE ...]

Executes lists of jobs (shell commands, one per line) in parallel on
several processors or machines. With no FILEs, jobs are read from stdin.
Each job runs in a shell environment.

options:
  -c N / --compute-eta=N   the total number of jobs is N; print an ETA as
                           jobs complete

  -e / --execution-place   append a 1-based execution place id to each
                           command, so a job can tell where it is running

  -m FILE / --machine-list=FILE
                           one execution place per useful line of FILE,
                           named by the line (usually user@host). A line
                           may end with an integer: that many jobs may run
                           on the place at once (default 1). The place
                           name is appended to each command. Not usable
                           with -e or -n.

  -n N / --nodes=N         keep at most N jobs running in parallel
                           [default=1]

  -r / --restart-failed    requeue a job whose exit code is 1. Exit code 2
                           additionally marks the execution place broken:
                           no further jobs go there. No restart limit
                           unless --max-restart is given.

  --max-restart=N          like -r, but each job is restarted at most N
                           times

  -t / --task-graph        input lines are a task graph instead of a job
                           list: "NAME VALUE CMD..." declares a job node
                           with cost VALUE, "SRC -> DST VALUE" a
                           precedence edge. Jobs start only after their
                           predecessors succeed.

  -v / --verbose           print each command executed and each job result

  -x N / --max-issue=N     run up to N simultaneous jobs on every
                           execution place

  --version                print jobqueue version ("{}")

example: run a job list on the machines named in MACHINES, two jobs per
machine:

    jobqueue -m MACHINES -x 2 JOBS
"#,
        called_as.as_deref().unwrap_or("jobqueue"),
        env!("CARGO_PKG_VERSION"),
    );
}

fn main() -> anyhow::Result<()> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print_usage();
        std::process::exit(0);
    }
    if args.contains("--version") {
        println!("jobqueue {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    let pass_execution_place = args.contains(["-e", "--execution-place"]);
    let restart_failed = args.contains(["-r", "--restart-failed"]);
    let task_graph = args.contains(["-t", "--task-graph"]);
    let verbose = args.contains(["-v", "--verbose"]);
    let eta_jobs: Option<usize> = args.opt_value_from_str(["-c", "--compute-eta"])?;
    let machine_list: Option<String> = args.opt_value_from_str(["-m", "--machine-list"])?;
    let nodes: Option<usize> = args.opt_value_from_str(["-n", "--nodes"])?;
    let max_restart: Option<usize> = args.opt_value_from_str("--max-restart")?;
    let max_issue: Option<usize> = args.opt_value_from_str(["-x", "--max-issue"])?;
    let files = args.free()?;

    if machine_list.is_some() && (pass_execution_place || nodes.is_some()) {
        bail!("-m MACHINELIST may not be used with -e or -n");
    }
    if nodes == Some(0) {
        bail!("invalid number of execution places: 0");
    }
    if max_issue == Some(0) {
        bail!("invalid max issue: 0");
    }

    let max_restarts = match max_restart {
        Some(limit) => limit,
        None if restart_failed => usize::max_value(),
        None => 0,
    };

    run(Config {
        nodes: nodes.unwrap_or(1),
        machine_list,
        pass_execution_place,
        max_restarts,
        task_graph,
        verbose,
        max_issue,
        eta_jobs,
        files,
    })
}
