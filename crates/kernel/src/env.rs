//! Environment-to-flag synchronization.
//!
//! Every flag `<name>` may be supplied through the variable
//! `<ENV_PREFIX>_<NAME>` (see [`env_var_name`]). A value given on the command
//! line always wins, an environment value beats the declared default.
//!
//! clap resolves values while parsing, so synchronization is applied to the
//! [`Command`] before it parses: a found variable replaces the argument's
//! default value. Malformed values are rejected by clap's value parser in the
//! same way as malformed command-line input.
//!
//! ## Example
//!
//! ```rust
//! use clap::{Arg, Command};
//! use cmdkit_kernel::env::EnvSync;
//! use std::collections::HashMap;
//!
//! let env = HashMap::from([("MYAPP_LOG_LEVEL".to_owned(), "debug".to_owned())]);
//! let cmd = Command::new("myapp").arg(Arg::new("log-level").long("log-level").default_value("info"));
//!
//! let cmd = EnvSync::new("myapp").with_source(env).apply(cmd);
//! let matches = cmd.try_get_matches_from(["myapp"]).unwrap();
//! assert_eq!(matches.get_one::<String>("log-level").map(String::as_str), Some("debug"));
//! ```

use crate::naming::env_var_name;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use tracing::debug;

/// Id of the hidden arg tagging a command created by [`mark_builtin`].
pub const BUILTIN_MARKER: &str = "cmdkit-builtin-command";

/// Tags `cmd` as provided by the framework rather than the program (shell
/// completion, generated docs). Tagged commands are skipped by [`EnvSync`]
/// and by [`PreRun`](crate::PreRun).
///
/// clap's generated `help` command needs no tag: it is handled while parsing
/// and never reaches either of them.
#[must_use]
pub fn mark_builtin(cmd: Command) -> Command {
    cmd.arg(
        Arg::new(BUILTIN_MARKER)
            .long(BUILTIN_MARKER)
            .action(ArgAction::SetTrue)
            .hide(true),
    )
}

/// Reports whether `cmd` was tagged by [`mark_builtin`]. A command that merely
/// shares a builtin's name is a program command.
#[must_use]
pub fn is_builtin_command(cmd: &Command) -> bool {
    cmd.get_arguments().any(|arg| arg.get_id() == BUILTIN_MARKER)
}

/// Same as [`is_builtin_command`] for the matches of a parsed command.
#[must_use]
pub fn is_builtin_matches(matches: &ArgMatches) -> bool {
    matches.try_contains_id(BUILTIN_MARKER).unwrap_or(false)
}

/// A source of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment. Non-UTF-8 values are treated as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<S: BuildHasher> EnvSource for HashMap<String, String, S> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// A flag whose default was replaced by an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFlag {
    pub flag: String,
    pub variable: String,
}

/// Synchronizes environment variables into the flags of a command tree.
#[derive(Debug, Clone)]
pub struct EnvSync<E = ProcessEnv> {
    prefix: String,
    permissive: bool,
    source: E,
}

impl EnvSync<ProcessEnv> {
    /// Creates a synchronizer reading the process environment for variables
    /// namespaced by `prefix` (`myapp` → `MYAPP_*`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), permissive: false, source: ProcessEnv }
    }
}

impl<E: EnvSource> EnvSync<E> {
    /// Replaces the variable source, e.g. with a map in tests.
    pub fn with_source<F: EnvSource>(self, source: F) -> EnvSync<F> {
        EnvSync { prefix: self.prefix, permissive: self.permissive, source }
    }

    /// When enabled, variables that are set but empty are synchronized too.
    #[must_use = "The synchronizer must be applied to a command"]
    pub const fn permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Applies synchronization to `cmd` and all of its non-builtin subcommands.
    #[must_use]
    pub fn apply(&self, cmd: Command) -> Command {
        self.apply_with_report(cmd).0
    }

    /// Like [`EnvSync::apply`], also returning every flag that was synchronized.
    #[must_use]
    pub fn apply_with_report(&self, cmd: Command) -> (Command, Vec<SyncedFlag>) {
        let mut report = Vec::new();
        let cmd = self.sync_command(cmd, &mut report);
        (cmd, report)
    }

    fn sync_command(&self, cmd: Command, report: &mut Vec<SyncedFlag>) -> Command {
        if is_builtin_command(&cmd) {
            return cmd;
        }

        let candidates: Vec<(String, String)> = cmd
            .get_arguments()
            .filter(|arg| is_syncable(arg))
            .map(|arg| {
                let id = arg.get_id().to_string();
                let flag = arg.get_long().map_or_else(|| id.clone(), ToOwned::to_owned);
                (id, flag)
            })
            .collect();

        let mut cmd = cmd;
        for (id, flag) in candidates {
            let variable = env_var_name(&self.prefix, &flag);
            let Some(value) = self.lookup(&variable) else { continue };

            debug!(flag = %flag, variable = %variable, command = cmd.get_name(), "Flag synchronized from environment");
            cmd = cmd.mut_arg(id.as_str(), |arg| arg.default_value(value));
            report.push(SyncedFlag { flag, variable });
        }

        let subcommands: Vec<String> =
            cmd.get_subcommands().map(|sub| sub.get_name().to_owned()).collect();
        for name in subcommands {
            cmd = cmd.mut_subcommand(name.as_str(), |sub| self.sync_command(sub, report));
        }

        cmd
    }

    fn lookup(&self, variable: &str) -> Option<String> {
        self.source.var(variable).filter(|value| self.permissive || !value.is_empty())
    }
}

fn is_syncable(arg: &Arg) -> bool {
    !arg.is_positional()
        && !matches!(
            arg.get_action(),
            ArgAction::Help
                | ArgAction::HelpShort
                | ArgAction::HelpLong
                | ArgAction::Version
                | ArgAction::Count
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        Command::new("app")
            .arg(Arg::new("log-level").long("log-level").default_value("info"))
            .arg(Arg::new("input").index(1))
            .subcommand(
                Command::new("serve").arg(Arg::new("grpc-addr").long("grpc-addr").default_value(":50051")),
            )
    }

    #[test]
    fn test_builtin_commands_are_recognized_by_tag() {
        assert!(is_builtin_command(&mark_builtin(Command::new("completion"))));
        assert!(!is_builtin_command(&Command::new("completion")));
        assert!(!is_builtin_command(&Command::new("help")));
    }

    #[test]
    fn test_builtin_subcommands_are_not_synchronized() {
        let env = HashMap::from([("APP_SHELL".to_owned(), "zsh".to_owned())]);
        let cmd = Command::new("app")
            .subcommand(
                mark_builtin(Command::new("completion"))
                    .arg(Arg::new("shell").long("shell").default_value("bash")),
            )
            .subcommand(Command::new("help").arg(Arg::new("shell").long("shell").default_value("bash")));

        let (_, report) = EnvSync::new("app").with_source(env).apply_with_report(cmd);
        assert_eq!(report.len(), 1, "only the program's own `help` command is synchronized");
    }

    #[test]
    fn test_empty_values_are_ignored_unless_permissive() {
        let env = HashMap::from([("APP_LOG_LEVEL".to_owned(), String::new())]);

        let (_, strict) = EnvSync::new("app").with_source(&env).apply_with_report(command());
        assert!(strict.is_empty());

        let (_, permissive) =
            EnvSync::new("app").with_source(&env).permissive(true).apply_with_report(command());
        assert_eq!(permissive.len(), 1);
    }

    #[test]
    fn test_positional_args_are_never_synchronized() {
        let env = HashMap::from([("APP_INPUT".to_owned(), "file.txt".to_owned())]);
        let (_, report) = EnvSync::new("app").with_source(env).apply_with_report(command());
        assert!(report.is_empty());
    }

    #[test]
    fn test_subcommand_flags_are_synchronized() {
        let env = HashMap::from([("APP_GRPC_ADDR".to_owned(), ":9090".to_owned())]);
        let (cmd, report) = EnvSync::new("app").with_source(env).apply_with_report(command());

        assert_eq!(
            report,
            vec![SyncedFlag { flag: "grpc-addr".to_owned(), variable: "APP_GRPC_ADDR".to_owned() }]
        );

        let matches = cmd.try_get_matches_from(["app", "serve"]).expect("parse");
        let (_, serve) = matches.subcommand().expect("subcommand");
        assert_eq!(serve.get_one::<String>("grpc-addr").map(String::as_str), Some(":9090"));
    }
}
