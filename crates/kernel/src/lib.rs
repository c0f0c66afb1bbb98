//! # Kernel
//!
//! Shared building blocks for command-line programs assembled from reusable
//! adapters:
//!
//! * [`naming`] derives flag names (`grpc-tls-cert-path`) and the environment
//!   variables that back them (`MYAPP_GRPC_TLS_CERT_PATH`).
//! * [`env`] synchronizes those variables into a [`clap::Command`].
//! * [`flags`] groups flags into named help sections and reads typed values.
//! * [`prerun`] composes the startup steps contributed by each adapter.
//! * [`tls`], [`addr`] and [`version`] hold the pieces shared by the server
//!   adapters and the `version` command.

pub mod addr;
pub mod env;
mod error;
pub mod flags;
pub mod naming;
pub mod prerun;
pub mod tls;
pub mod version;

pub use crate::addr::{ListenAddr, Network, resolve_listen_addr};
pub use crate::env::{
    EnvSource, EnvSync, ProcessEnv, is_builtin_command, is_builtin_matches, mark_builtin,
};
pub use crate::error::{DurationError, KernelError, Result, format_context};
pub use crate::flags::{FlagSet, NamedFlagSets};
pub use crate::naming::{Prefix, env_var_name, join_flag};
pub use crate::prerun::PreRun;
pub use crate::tls::TlsPaths;
pub use crate::version::VersionInfo;
pub use clap;
#[doc(hidden)]
pub use tracing;

/// Emits a `tracing` event at a [`tracing::Level`] chosen at runtime.
///
/// ```rust
/// use cmdkit_kernel::event_at;
///
/// let level = tracing::Level::DEBUG;
/// event_at!(level, prefix = "log", "Configured logging");
/// ```
#[macro_export]
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level: $crate::tracing::Level = $level;
        if level == $crate::tracing::Level::ERROR {
            $crate::tracing::error!($($arg)+);
        } else if level == $crate::tracing::Level::WARN {
            $crate::tracing::warn!($($arg)+);
        } else if level == $crate::tracing::Level::INFO {
            $crate::tracing::info!($($arg)+);
        } else if level == $crate::tracing::Level::DEBUG {
            $crate::tracing::debug!($($arg)+);
        } else {
            $crate::tracing::trace!($($arg)+);
        }
    }};
}
