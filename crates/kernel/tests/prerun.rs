use clap::Command;
use cmdkit_kernel::flags::{get_string, string_flag};
use cmdkit_kernel::env::mark_builtin;
use cmdkit_kernel::{KernelError, PreRun};

#[derive(Debug, Default)]
struct Startup {
    ran: Vec<&'static str>,
    level: String,
}

fn command() -> Command {
    Command::new("myapp")
        .arg(string_flag("log-level", "info", "verbosity of logging").global(true))
        .subcommand(Command::new("serve"))
}

#[test]
fn steps_run_in_order_against_leaf_matches() {
    let matches =
        command().try_get_matches_from(["myapp", "serve", "--log-level", "debug"]).expect("parse");

    let mut state = Startup::default();
    PreRun::new()
        .step("logging", |matches, state: &mut Startup| {
            state.level = get_string(matches, "log-level")?;
            state.ran.push("logging");
            Ok(())
        })
        .step("otel", |_, state: &mut Startup| {
            state.ran.push("otel");
            Ok(())
        })
        .run(&matches, &mut state)
        .expect("pre-run");

    assert_eq!(state.ran, ["logging", "otel"]);
    assert_eq!(state.level, "debug");
}

#[test]
fn first_failure_stops_the_sequence() {
    let matches = command().try_get_matches_from(["myapp"]).expect("parse");

    let mut state = Startup::default();
    let err = PreRun::new()
        .step("logging", |_, state: &mut Startup| {
            state.ran.push("logging");
            anyhow::bail!("unknown log level: loud")
        })
        .step("otel", |_, state: &mut Startup| {
            state.ran.push("otel");
            Ok(())
        })
        .run(&matches, &mut state)
        .expect_err("logging fails");

    assert_eq!(state.ran, ["logging"]);
    assert!(matches!(err, KernelError::Step { ref step, .. } if step == "logging"));
    assert!(err.to_string().contains("unknown log level: loud"));
}

#[test]
fn nested_builtin_subcommand_is_a_no_op() {
    let matches = command()
        .subcommand(mark_builtin(Command::new("completion")).subcommand(Command::new("bash")))
        .try_get_matches_from(["myapp", "completion", "bash"])
        .expect("parse");

    let mut state = Startup::default();
    PreRun::new()
        .step("fail", |_, _: &mut Startup| anyhow::bail!("must not run"))
        .run(&matches, &mut state)
        .expect("builtin skipped");
}
