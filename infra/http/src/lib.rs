//! # HTTP server
//!
//! [`HttpAdapter`] registers `--<prefix>-addr`, `--<prefix>-tls-cert-path`,
//! `--<prefix>-tls-key-path` and `--<prefix>-enabled` and serves an
//! [`axum::Router`] with `axum-server`, over TLS when both paths are given.
//!
//! Shutdown is driven from outside: either pass a future to
//! [`HttpAdapter::listen_from_flags`] or keep the [`HttpServer::handle`] of a
//! server built with [`HttpAdapter::server_from_flags`].

mod error;
mod server;

pub use crate::error::HttpError;
pub use crate::server::{DEFAULT_ADDR, DEFAULT_FLAG_PREFIX, HttpAdapter, HttpOptions, HttpServer};
pub use axum_server::Handle;
