use clap::Command;
use cmdkit_kernel::FlagSet;
use cmdkit_logger::{Encoding, LevelFilter, LoggerAdapter, LoggerOptions};

#[test]
fn rerunning_the_adapter_swaps_level_and_format() {
    let adapter = LoggerAdapter::new(LoggerOptions::default()).expect("valid");
    let mut flags = FlagSet::new();
    adapter.register_flags(&mut flags);
    let cmd = flags.apply(Command::new("app"));
    let parse = |args: &[&str]| {
        cmd.clone()
            .try_get_matches_from(std::iter::once("app").chain(args.iter().copied()))
            .expect("parse")
    };

    let _info = adapter.run(&parse(&["--log-level", "info"])).expect("first run");
    assert_eq!(LevelFilter::current(), LevelFilter::INFO);

    let _debug = adapter.run(&parse(&["--log-level", "debug"])).expect("second run");
    assert_eq!(LevelFilter::current(), LevelFilter::DEBUG);

    let json = adapter
        .run(&parse(&["--log-level", "error", "--log-format", "json"]))
        .expect("third run");
    assert_eq!(LevelFilter::current(), LevelFilter::ERROR);
    assert_eq!(json.config().encoding, Encoding::Json);
}
