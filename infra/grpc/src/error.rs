use cmdkit_kernel::{KernelError, format_context};
use std::borrow::Cow;
use std::path::PathBuf;

/// Errors raised while configuring, binding or running the gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum GrpcError {
    /// A TLS certificate or key file could not be read.
    #[error("Failed to read {kind} file '{}': {source}", path.display())]
    Certificate { kind: &'static str, path: PathBuf, source: std::io::Error },

    /// The certificate/key pair was rejected by the TLS stack.
    #[error("Invalid TLS configuration{}: {source}", format_context(context))]
    Tls { source: tonic::transport::Error, context: Option<Cow<'static, str>> },

    /// The listener could not be bound.
    #[error("Failed to listen on {network} {addr}: {source}")]
    Bind { network: String, addr: String, source: std::io::Error },

    /// The server stopped with an error rather than a graceful shutdown.
    #[error("gRPC server failed{}: {source}", format_context(context))]
    Serve { source: tonic::transport::Error, context: Option<Cow<'static, str>> },

    /// Reading or validating a gRPC flag failed.
    #[error(transparent)]
    Flag(#[from] KernelError),
}
