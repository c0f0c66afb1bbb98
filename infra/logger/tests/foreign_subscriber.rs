use cmdkit_logger::{LogFormat, LogLevel, LoggerError, LoggingConfig};

#[test]
fn install_over_foreign_subscriber_returns_subscriber_error() {
    tracing::subscriber::set_global_default(tracing_subscriber::registry())
        .expect("foreign subscriber should install");

    let logger = LoggingConfig::new(LogLevel::Info, LogFormat::Json).build().expect("build");
    let err = logger.set_global().expect_err("install should fail");

    assert!(
        matches!(err, LoggerError::Subscriber { .. }),
        "expected subscriber error when another subscriber owns the process"
    );
}
