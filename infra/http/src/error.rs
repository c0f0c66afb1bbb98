use cmdkit_kernel::{KernelError, format_context};
use std::borrow::Cow;
use std::net::SocketAddr;

/// Errors raised while configuring or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The TLS certificate/key pair could not be loaded.
    #[error("Failed to load TLS certificate{}: {source}", format_context(context))]
    Certificate { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// The listen address is not a TCP address.
    #[error("HTTP server cannot listen on '{addr}'")]
    UnsupportedAddress { addr: String },

    /// Binding or serving failed; a graceful shutdown is not an error.
    #[error("HTTP server on {addr} failed{}: {source}", format_context(context))]
    Serve { addr: SocketAddr, source: std::io::Error, context: Option<Cow<'static, str>> },

    /// Reading or validating an HTTP flag failed.
    #[error(transparent)]
    Flag(#[from] KernelError),
}
