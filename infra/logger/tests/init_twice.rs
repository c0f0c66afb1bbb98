use cmdkit_logger::{LevelFilter, LogFormat, LogLevel, LoggingConfig};

#[test]
fn init_twice_reconfigures_the_global_logger() {
    let first = LoggingConfig::new(LogLevel::Warn, LogFormat::Json).build().expect("first build");
    first.set_global().expect("first install should succeed");
    assert_eq!(LevelFilter::current(), LevelFilter::WARN);

    let second = LoggingConfig::new(LogLevel::Trace, LogFormat::Console).build().expect("second build");
    second.set_global().expect("second install should reconfigure");
    assert_eq!(LevelFilter::current(), LevelFilter::TRACE);

    second.set_global().expect("reinstalling a detached logger is a no-op");
    assert_eq!(LevelFilter::current(), LevelFilter::TRACE);
}
