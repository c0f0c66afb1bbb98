use clap::{Arg, Command};
use cmdkit_kernel::flags::{bool_flag, duration_flag, get_bool, get_duration, get_string, string_flag};
use cmdkit_kernel::{EnvSync, FlagSet};
use std::collections::HashMap;
use std::time::Duration;

fn command() -> Command {
    let mut flags = FlagSet::new().persistent(true);
    flags
        .add(string_flag("log-level", "info", "verbosity of logging"))
        .add(bool_flag("grpc-enabled", false, "enable gRPC server"))
        .add(duration_flag("grpc-max-conn-age", "30s", "max connection age"));
    flags.apply(Command::new("myapp").subcommand(Command::new("serve")))
}

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

#[test]
fn environment_fills_unset_flags() {
    let env = env(&[("MYAPP_LOG_LEVEL", "debug"), ("MYAPP_GRPC_ENABLED", "true")]);
    let matches = EnvSync::new("myapp")
        .with_source(env)
        .apply(command())
        .try_get_matches_from(["myapp"])
        .expect("parse");

    assert_eq!(get_string(&matches, "log-level").expect("flag"), "debug");
    assert!(get_bool(&matches, "grpc-enabled").expect("flag"));
}

#[test]
fn command_line_beats_environment() {
    let env = env(&[("MYAPP_LOG_LEVEL", "debug")]);
    let matches = EnvSync::new("myapp")
        .with_source(env)
        .apply(command())
        .try_get_matches_from(["myapp", "--log-level", "warn"])
        .expect("parse");

    assert_eq!(get_string(&matches, "log-level").expect("flag"), "warn");
}

#[test]
fn declared_default_applies_without_environment() {
    let matches = EnvSync::new("myapp")
        .with_source(HashMap::new())
        .apply(command())
        .try_get_matches_from(["myapp", "serve"])
        .expect("parse");

    let (_, serve) = matches.subcommand().expect("serve");
    assert_eq!(get_string(serve, "log-level").expect("flag"), "info");
    assert_eq!(get_duration(serve, "grpc-max-conn-age").expect("flag"), Duration::from_secs(30));
}

#[test]
fn malformed_environment_value_is_a_parse_error() {
    let env = env(&[("MYAPP_GRPC_MAX_CONN_AGE", "forever")]);
    let result = EnvSync::new("myapp")
        .with_source(env)
        .apply(command())
        .try_get_matches_from(["myapp"]);

    assert!(result.is_err());
}

#[test]
fn help_and_version_are_never_synchronized() {
    let cmd = Command::new("myapp")
        .version("1.0.0")
        .arg(Arg::new("name").long("name").default_value("x"));
    let env = env(&[("MYAPP_HELP", "true"), ("MYAPP_VERSION", "true"), ("MYAPP_NAME", "y")]);

    let (_, report) = EnvSync::new("myapp").with_source(env).apply_with_report(cmd);
    let flags: Vec<&str> = report.iter().map(|synced| synced.flag.as_str()).collect();
    assert_eq!(flags, ["name"]);
}
