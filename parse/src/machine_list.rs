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

use std::io::{self, BufRead};

use crate::{read_stripped_line, useful_line};

/// One execution place read from a machine list: a display name (usually a
/// `user@host` string) and how many jobs may run on it at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub max_issue: usize,
}

/// Parse a machine list: one machine per useful line, the name optionally
/// followed by a positive integer capacity. A missing capacity means 1. A
/// malformed capacity also degrades to 1 with a warning instead of failing,
/// so old jobqueue versions keep working if the format ever grows a field.
pub fn parse_machine_list<R: BufRead>(mut input: R) -> io::Result<Vec<Machine>> {
    let mut machines = Vec::new();

    while let Some(line) = read_stripped_line(&mut input)? {
        if !useful_line(&line) {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let name = match tokens.next() {
            Some(name) => name.to_owned(),
            None => continue,
        };

        let max_issue = match tokens.next() {
            None => 1,
            Some(count) => match count.parse::<i64>() {
                Ok(count) if count > 0 => count as usize,
                _ => {
                    eprintln!(
                        "Warning: machine list contains a bad number of issues for a node. \
                         Assuming single issue. ({})",
                        line
                    );
                    1
                }
            },
        };

        machines.push(Machine { name, max_issue });
    }

    Ok(machines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Vec<Machine> {
        parse_machine_list(Cursor::new(input)).unwrap()
    }

    #[test]
    fn names_with_and_without_capacities() {
        let machines = parse("machine0    1\nmachine1 2\nmachine2\n");
        assert_eq!(
            machines,
            vec![
                Machine {
                    name: "machine0".to_owned(),
                    max_issue: 1
                },
                Machine {
                    name: "machine1".to_owned(),
                    max_issue: 2
                },
                Machine {
                    name: "machine2".to_owned(),
                    max_issue: 1
                },
            ]
        );
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let machines = parse("# header\n\n   \nuser@host 4\n");
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].name, "user@host");
        assert_eq!(machines[0].max_issue, 4);
    }

    #[test]
    fn bad_capacities_degrade_to_one() {
        for input in &["m0 zero\n", "m0 -3\n", "m0 2.5\n", "m0 0\n"] {
            let machines = parse(input);
            assert_eq!(machines[0].max_issue, 1, "input {:?}", input);
        }
    }
}
