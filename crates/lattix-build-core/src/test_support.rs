//! Scripted [`ToolRunner`] fake shared by the unit tests.

use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::tools::{ToolOutput, ToolRunner};

/// Outcome scripted for a matching invocation.
#[derive(Clone)]
pub(crate) enum Outcome {
    /// The tool ran and exited with the given code and output.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The tool could not be spawned at all.
    SpawnFailure,
}

struct Rule {
    program: String,
    /// When set, the rule only matches invocations whose first argument
    /// equals this (distinguishes `git describe` from `git diff`).
    arg0: Option<String>,
    outcome: Outcome,
}

/// A [`ToolRunner`] that replays scripted outcomes and records every
/// invocation. Unmatched programs behave as absent tools.
#[derive(Default)]
pub(crate) struct FakeRunner {
    rules: Vec<Rule>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, program: &str, arg0: Option<&str>, outcome: Outcome) -> Self {
        self.rules.push(Rule {
            program: program.to_owned(),
            arg0: arg0.map(str::to_owned),
            outcome,
        });
        self
    }

    /// Shorthand for a clean exit with the given stdout.
    pub(crate) fn ok(self, program: &str, arg0: Option<&str>, stdout: &str) -> Self {
        self.on(
            program,
            arg0,
            Outcome::Exit {
                code: 0,
                stdout: stdout.to_owned(),
                stderr: String::new(),
            },
        )
    }

    /// Shorthand for a nonzero exit.
    pub(crate) fn fails(self, program: &str, arg0: Option<&str>, code: i32) -> Self {
        self.on(
            program,
            arg0,
            Outcome::Exit {
                code,
                stdout: String::new(),
                stderr: String::new(),
            },
        )
    }

    /// Handle onto the invocation log, usable after the runner has been
    /// moved into a context.
    pub(crate) fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> io::Result<ToolOutput> {
        self.calls
            .borrow_mut()
            .push(format!("{program} {}", args.join(" ")));
        let rule = self.rules.iter().find(|rule| {
            rule.program == program
                && rule
                    .arg0
                    .as_deref()
                    .is_none_or(|arg0| args.first() == Some(&arg0))
        });
        match rule.map(|rule| rule.outcome.clone()) {
            Some(Outcome::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(ToolOutput {
                code: Some(code),
                stdout,
                stderr,
            }),
            Some(Outcome::SpawnFailure) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: not found"),
            )),
        }
    }
}
