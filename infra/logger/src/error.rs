use cmdkit_kernel::{KernelError, format_context};
use std::borrow::Cow;

/// Errors that can occur while configuring logging from flags.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The `--<prefix>-level` value is not one of the supported severities.
    #[error("Unknown log level: {level}")]
    UnknownLevel { level: String },

    /// Occurs if a global subscriber has already been installed in the current process.
    #[error("Tracing subscriber error{}: {source}", format_context(context))]
    Subscriber {
        source: tracing::dispatcher::SetGlobalDefaultError,
        context: Option<Cow<'static, str>>,
    },

    /// The installed global logger could not be reconfigured.
    #[error("Logger reload error{}: {source}", format_context(context))]
    Reload { source: tracing_subscriber::reload::Error, context: Option<Cow<'static, str>> },

    /// Invalid options supplied to the logger adapter.
    #[error("Invalid logger configuration{}: {message}", format_context(context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Reading a logger flag failed.
    #[error(transparent)]
    Flag(#[from] KernelError),
}
