//! Ordered composition of startup steps.
//!
//! Each adapter contributes one step (configure logging, install a tracer
//! provider ...). Steps share an explicit application state `S` instead of
//! reaching for process globals.

use crate::env::is_builtin_matches;
use crate::error::{KernelError, Result};
use clap::ArgMatches;
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, trace};

type Step<S> = Box<dyn FnMut(&ArgMatches, &mut S) -> anyhow::Result<()> + Send>;

/// A named sequence of fallible steps run before the command body.
pub struct PreRun<S> {
    steps: Vec<(Cow<'static, str>, Step<S>)>,
}

impl<S> Default for PreRun<S> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<S> fmt::Debug for PreRun<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreRun").field("steps", &self.names().collect::<Vec<_>>()).finish()
    }
}

impl<S> PreRun<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step. Steps run in the order they were added.
    #[must_use = "The pre-run sequence must be run"]
    pub fn step<F>(mut self, name: impl Into<Cow<'static, str>>, step: F) -> Self
    where
        F: FnMut(&ArgMatches, &mut S) -> anyhow::Result<()> + Send + 'static,
    {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    /// Appends every step of `other` after the steps of `self`.
    #[must_use = "The pre-run sequence must be run"]
    pub fn then(mut self, other: Self) -> Self {
        self.steps.extend(other.steps);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step against the matches of the invoked (leaf) subcommand.
    ///
    /// Nothing runs when a command tagged by [`mark_builtin`](crate::env::mark_builtin)
    /// was invoked. The first failing step aborts the sequence and is named in
    /// the error.
    pub fn run(&mut self, matches: &ArgMatches, state: &mut S) -> Result<()> {
        let mut leaf = matches;
        while let Some((name, sub)) = leaf.subcommand() {
            if is_builtin_matches(sub) {
                debug!(command = name, "Skipping pre-run steps for builtin command");
                return Ok(());
            }
            leaf = sub;
        }

        for (name, step) in &mut self.steps {
            trace!(step = %name, "Running pre-run step");
            step(leaf, state).map_err(|source| KernelError::Step { step: name.clone(), source })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::mark_builtin;
    use clap::Command;

    fn counter() -> PreRun<u32> {
        PreRun::new().step("count", |_, calls: &mut u32| {
            *calls += 1;
            Ok(())
        })
    }

    #[test]
    fn test_builtin_subcommand_skips_all_steps() {
        let matches = Command::new("app")
            .subcommand(mark_builtin(Command::new("completion")))
            .try_get_matches_from(["app", "completion"])
            .expect("parse");

        let mut calls = 0_u32;
        counter().run(&matches, &mut calls).expect("run");
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_program_command_named_like_a_builtin_runs_steps() {
        let matches = Command::new("app")
            .subcommand(Command::new("completion"))
            .try_get_matches_from(["app", "completion"])
            .expect("parse");

        let mut calls = 0_u32;
        counter().run(&matches, &mut calls).expect("run");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_debug_lists_step_names() {
        let pre_run = PreRun::<()>::new().step("logging", |_, _| Ok(())).step("otel", |_, _| Ok(()));
        assert_eq!(format!("{pre_run:?}"), r#"PreRun { steps: ["logging", "otel"] }"#);
    }
}
