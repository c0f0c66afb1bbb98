//! # gRPC server
//!
//! [`GrpcAdapter`] registers `--<prefix>-addr`, `--<prefix>-network`,
//! `--<prefix>-tls-cert-path`, `--<prefix>-tls-key-path`,
//! `--<prefix>-max-conn-age` and `--<prefix>-enabled`, and turns them into a
//! [`tonic`] server:
//!
//! ```rust,no_run
//! use clap::Command;
//! use cmdkit_grpc::{GrpcAdapter, GrpcOptions};
//! use cmdkit_kernel::FlagSet;
//!
//! # async fn run() -> Result<(), cmdkit_grpc::GrpcError> {
//! let adapter = GrpcAdapter::new(GrpcOptions::default());
//! let mut flags = FlagSet::new();
//! adapter.register_flags(&mut flags);
//! let matches = flags.apply(Command::new("myapp")).get_matches();
//!
//! let (_reporter, health) = tonic_health::server::health_reporter();
//! let router = adapter.server_from_flags(&matches)?.add_service(health);
//! adapter.listen_from_flags(&matches, router, async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod error;
mod listener;
mod server;

pub use crate::error::GrpcError;
pub use crate::listener::GrpcListener;
pub use crate::server::{
    DEFAULT_ADDR, DEFAULT_FLAG_PREFIX, DEFAULT_MAX_CONN_AGE, GrpcAdapter, GrpcOptions,
};
pub use tonic;
