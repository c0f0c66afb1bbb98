use std::borrow::Cow;

/// Errors raised while wiring flags, environment variables and pre-run steps.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A flag was read that was never registered on the command.
    ///
    /// This is a programming mistake surfaced during initialization rather
    /// than a user-facing configuration problem.
    #[error("Flag --{name} is not registered{}", format_context(context))]
    NotRegistered { name: String, context: Option<Cow<'static, str>> },

    /// A flag was read with a different type than it was registered with.
    #[error("Flag --{name} has an unexpected type{}: {source}", format_context(context))]
    FlagType {
        name: String,
        source: clap::parser::MatchesError,
        context: Option<Cow<'static, str>>,
    },

    /// Exactly one half of a TLS certificate/key pair was configured.
    #[error("Must provide both --{prefix}-tls-cert-path and --{prefix}-tls-key-path")]
    PartialTls { prefix: String },

    /// The listen address could not be parsed or resolved.
    #[error("Invalid listen address '{addr}'{}: {message}", format_context(context))]
    InvalidAddress {
        addr: String,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// The network type is not one of the supported listener kinds.
    #[error("Unknown network type '{network}' (expected tcp, tcp4, tcp6 or unix)")]
    UnknownNetwork { network: String },

    /// A pre-run step returned an error; later steps were not executed.
    #[error("Pre-run step '{step}' failed: {source}")]
    Step { step: Cow<'static, str>, source: anyhow::Error },

    /// Writing command output failed.
    #[error("I/O error{}: {source}", format_context(context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

/// A duration string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("Empty duration")]
    Empty,

    #[error("Invalid duration '{input}'")]
    Invalid { input: String },

    #[error("Missing unit in duration '{input}'")]
    MissingUnit { input: String },

    #[error("Unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },

    #[error("Duration '{input}' is out of range")]
    Overflow { input: String },
}

impl From<std::io::Error> for KernelError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, context: None }
    }
}

pub type Result<T, E = KernelError> = std::result::Result<T, E>;

/// Renders an optional error context as ` (context)` for use in error messages.
#[must_use]
#[allow(clippy::ref_option)]
pub fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_tls_names_both_flags() {
        let err = KernelError::PartialTls { prefix: "grpc".to_owned() };
        let message = err.to_string();
        assert!(message.contains("--grpc-tls-cert-path"));
        assert!(message.contains("--grpc-tls-key-path"));
    }

    #[test]
    fn test_context_is_rendered_in_parentheses() {
        let err = KernelError::NotRegistered {
            name: "log-level".to_owned(),
            context: Some("reading logger flags".into()),
        };
        assert_eq!(err.to_string(), "Flag --log-level is not registered (reading logger flags)");
    }
}
