//! Flag declaration, grouping and typed access.
//!
//! Adapters register their flags into a [`FlagSet`]; applications collect the
//! sets into [`NamedFlagSets`] so that help output renders one section per
//! group. Values are read back with the typed accessors in this module, which
//! report unregistered flags and type mismatches as errors instead of
//! panicking.

use crate::env::{EnvSource, ProcessEnv};
use crate::error::{DurationError, KernelError, Result};
use clap::builder::BoolishValueParser;
use clap::parser::MatchesError;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::any::Any;
use std::time::Duration;

/// Declares `--<name>` taking a string value.
#[must_use]
pub fn string_flag(name: impl Into<String>, default: impl Into<String>, help: impl Into<String>) -> Arg {
    let name = name.into();
    Arg::new(name.clone()).long(name).default_value(default.into()).help(help.into())
}

/// Declares a boolean `--<name>`: bare `--<name>` means `true`, an explicit
/// value is given as `--<name>=false` (`1`/`0`, `yes`/`no` and `on`/`off` are
/// accepted too).
#[must_use]
pub fn bool_flag(name: impl Into<String>, default: bool, help: impl Into<String>) -> Arg {
    let name = name.into();
    Arg::new(name.clone())
        .long(name)
        .action(ArgAction::Set)
        .num_args(0..=1)
        .require_equals(true)
        .default_missing_value("true")
        .default_value(if default { "true" } else { "false" })
        .value_parser(BoolishValueParser::new())
        .help(help.into())
}

/// Declares `--<name>` taking a floating point value.
#[must_use]
pub fn f64_flag(name: impl Into<String>, default: f64, help: impl Into<String>) -> Arg {
    let name = name.into();
    Arg::new(name.clone())
        .long(name)
        .default_value(default.to_string())
        .value_parser(value_parser!(f64))
        .help(help.into())
}

/// Declares `--<name>` taking a duration such as `30s` or `1m30s`.
#[must_use]
pub fn duration_flag(name: impl Into<String>, default: &str, help: impl Into<String>) -> Arg {
    let name = name.into();
    Arg::new(name.clone())
        .long(name)
        .default_value(default.to_owned())
        .value_parser(parse_duration)
        .help(help.into())
}

/// An ordered collection of flags registered by one component.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    args: Vec<Arg>,
    persistent: bool,
}

impl FlagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistent flags are inherited by every subcommand.
    #[must_use = "The flag set must be applied to a command"]
    pub const fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn add(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.args.iter().any(|arg| arg.get_id() == name)
    }

    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns `true` when at least one flag would show up in help output.
    #[must_use]
    pub fn has_visible_flags(&self) -> bool {
        self.args.iter().any(|arg| !arg.is_hide_set())
    }

    /// Hides every named flag from help output. Fails on the first unknown name.
    pub fn mark_hidden(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            let arg = self
                .args
                .iter_mut()
                .find(|arg| arg.get_id() == *name)
                .ok_or_else(|| KernelError::NotRegistered {
                    name: (*name).to_owned(),
                    context: Some("marking flag hidden".into()),
                })?;
            *arg = arg.clone().hide(true);
        }
        Ok(())
    }

    /// Registers the flags on `cmd`.
    #[must_use]
    pub fn apply(self, cmd: Command) -> Command {
        cmd.args(self.into_args())
    }

    fn into_args(self) -> Vec<Arg> {
        let persistent = self.persistent;
        self.args.into_iter().map(|arg| if persistent { arg.global(true) } else { arg }).collect()
    }
}

/// Flag sets kept in the order they were first requested.
#[derive(Debug, Clone, Default)]
pub struct NamedFlagSets {
    sets: Vec<(String, FlagSet)>,
}

impl NamedFlagSets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set called `name`, creating it at the end of the order
    /// when it does not exist yet.
    pub fn flag_set(&mut self, name: &str) -> &mut FlagSet {
        let index = match self.sets.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                self.sets.push((name.to_owned(), FlagSet::new()));
                self.sets.len() - 1
            }
        };
        &mut self.sets[index].1
    }

    pub fn get(&self, name: &str) -> Option<&FlagSet> {
        self.sets.iter().find(|(existing, _)| existing == name).map(|(_, set)| set)
    }

    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|(name, _)| name.as_str())
    }

    /// Registers every set on `cmd`, each under the help heading `<name> Flags`.
    #[must_use]
    pub fn apply(self, cmd: Command) -> Command {
        self.sets.into_iter().fold(cmd, |cmd, (name, set)| {
            let heading = format!("{name} Flags");
            cmd.args(set.into_args().into_iter().map(|arg| arg.help_heading(heading.clone())))
        })
    }
}

/// Hides the named flags of an already assembled command.
pub fn mark_flags_hidden(cmd: Command, names: &[&str]) -> Result<Command> {
    names.iter().try_fold(cmd, |cmd, name| {
        if cmd.get_arguments().any(|arg| arg.get_id() == *name) {
            Ok(cmd.mut_arg(*name, |arg| arg.hide(true)))
        } else {
            Err(KernelError::NotRegistered {
                name: (*name).to_owned(),
                context: Some("marking flag hidden".into()),
            })
        }
    })
}

fn lookup<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T: Any + Clone + Send + Sync + 'static,
{
    match matches.try_get_one::<T>(name) {
        Ok(value) => Ok(value.cloned()),
        Err(MatchesError::UnknownArgument { .. }) => {
            Err(KernelError::NotRegistered { name: name.to_owned(), context: None })
        }
        Err(source) => Err(KernelError::FlagType { name: name.to_owned(), source, context: None }),
    }
}

/// Reads a string flag. A registered flag without value reads as empty.
pub fn get_string(matches: &ArgMatches, name: &str) -> Result<String> {
    Ok(lookup::<String>(matches, name)?.unwrap_or_default())
}

/// Reads a string flag and expands environment variables and a leading `~`.
pub fn get_string_expanded(matches: &ArgMatches, name: &str) -> Result<String> {
    get_string(matches, name).map(|value| expand_with(&value, &ProcessEnv))
}

pub fn get_bool(matches: &ArgMatches, name: &str) -> Result<bool> {
    Ok(lookup::<bool>(matches, name)?.unwrap_or_default())
}

pub fn get_f64(matches: &ArgMatches, name: &str) -> Result<f64> {
    Ok(lookup::<f64>(matches, name)?.unwrap_or_default())
}

pub fn get_duration(matches: &ArgMatches, name: &str) -> Result<Duration> {
    Ok(lookup::<Duration>(matches, name)?.unwrap_or_default())
}

/// Expands `$VAR` and `${VAR}` from `env`, then a leading `~` to `$HOME`.
///
/// Unset variables expand to the empty string, malformed references are kept
/// verbatim.
///
/// ```rust
/// use cmdkit_kernel::flags::expand_with;
/// use std::collections::HashMap;
///
/// let env = HashMap::from([("HOME".to_owned(), "/home/me".to_owned())]);
/// assert_eq!(expand_with("~/certs/${HOME}x", &env), "/home/me/certs//home/mex");
/// ```
#[must_use]
pub fn expand_with(value: &str, env: &impl EnvSource) -> String {
    let expanded = expand_vars(value, env);
    match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            env.var("HOME").map_or(expanded.clone(), |home| format!("{home}{rest}"))
        }
        _ => expanded,
    }
}

fn expand_vars(value: &str, env: &impl EnvSource) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&env.var(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end > 0 {
                out.push_str(&env.var(&after[..end]).unwrap_or_default());
                rest = &after[end..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

/// Parses a duration written as a sequence of decimal numbers with units,
/// e.g. `300ms`, `1.5h` or `1m30s`. Valid units are `ns`, `us` (or `µs`),
/// `ms`, `s`, `m` and `h`. A bare `0` is accepted without a unit.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationError::Invalid { input: input.to_owned() };
    let overflow = || DurationError::Overflow { input: input.to_owned() };

    let mut total: u128 = 0;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let number_end =
            rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() {
            return Err(invalid());
        }

        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit { input: input.to_owned() });
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_owned(),
            input: input.to_owned(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        if !whole.is_empty() {
            let whole: u128 = whole.parse().map_err(|_| invalid())?;
            total = whole
                .checked_mul(scale)
                .and_then(|nanos| total.checked_add(nanos))
                .ok_or_else(overflow)?;
        }

        if !fraction.is_empty() {
            // Digits beyond nanosecond precision of the largest unit are dropped.
            let digits = &fraction[..fraction.len().min(18)];
            let value: u128 = digits.parse().map_err(|_| invalid())?;
            let divisor = 10u128.pow(u32::try_from(digits.len()).map_err(|_| invalid())?);
            total = total.checked_add(value * scale / divisor).ok_or_else(overflow)?;
        }

        rest = tail;
    }

    u64::try_from(total).map(Duration::from_nanos).map_err(|_| overflow())
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}
