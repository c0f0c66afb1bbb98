//! Facade crate for the `cmdkit` adapters.
//! Re-exports the kernel and every adapter enabled by a cargo feature.
//! Keep this crate thin: it composes the other crates and implements nothing.
//!
//! ## Usage
//! - Add `cmdkit` with the adapters you need (`logger`, `otel`, `grpc`, `http`, `runtime`).
//! - Register each adapter's flags into its own group of a [`NamedFlagSets`],
//!   synchronize environment variables with [`EnvSync`], and run the adapters
//!   from a [`PreRun`] before the command body.

pub use cmdkit_kernel as kernel;
pub use cmdkit_kernel::{
    EnvSync, FlagSet, KernelError, NamedFlagSets, PreRun, Prefix, VersionInfo, clap, env_var_name,
    event_at, join_flag,
};

#[cfg(feature = "grpc")]
pub use cmdkit_grpc as grpc;
#[cfg(feature = "http")]
pub use cmdkit_http as http;
#[cfg(feature = "logger")]
pub use cmdkit_logger as logger;
#[cfg(feature = "otel")]
pub use cmdkit_otel as otel;
#[cfg(feature = "runtime")]
pub use cmdkit_runtime as runtime;

/// Adapters compiled into this build (by cargo feature).
pub const ENABLED: &[&str] = &[
    #[cfg(feature = "logger")]
    "logger",
    #[cfg(feature = "otel")]
    "otel",
    #[cfg(feature = "grpc")]
    "grpc",
    #[cfg(feature = "http")]
    "http",
    #[cfg(feature = "runtime")]
    "runtime",
];

#[must_use]
pub fn is_enabled(name: &str) -> bool {
    ENABLED.contains(&name)
}
