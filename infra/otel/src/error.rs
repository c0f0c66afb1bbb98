use cmdkit_kernel::{KernelError, format_context};
use std::borrow::Cow;

/// Errors raised while configuring trace export.
#[derive(Debug, thiserror::Error)]
pub enum OtelError {
    /// The `--<prefix>-provider` value is not a known provider.
    #[error("Unknown tracing provider: {provider}")]
    UnknownProvider { provider: String },

    /// The endpoint scheme contradicts `--<prefix>-insecure`.
    #[error("Endpoint scheme is {scheme} but insecure flag is set to {insecure}")]
    EndpointScheme { scheme: String, insecure: bool },

    /// The endpoint could not be understood.
    #[error("Invalid collector endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: Cow<'static, str> },

    /// The sample ratio is outside `[0, 1]`.
    #[error("Sample ratio must be between 0 and 1, got {ratio}")]
    InvalidSampleRatio { ratio: f64 },

    /// No service name was configured and none could be derived from the executable.
    #[error("Service name is empty and cannot be derived from the current executable")]
    MissingServiceName,

    /// The gRPC exporter was selected outside a Tokio runtime.
    #[error("Provider '{provider}' requires a running Tokio runtime")]
    RuntimeRequired { provider: String },

    /// Failure while building the span exporter.
    #[error("OpenTelemetry error{}: {source}", format_context(context))]
    Exporter {
        source: opentelemetry_sdk::trace::TraceError,
        context: Option<Cow<'static, str>>,
    },

    /// Reading a tracing flag failed.
    #[error(transparent)]
    Flag(#[from] KernelError),
}
