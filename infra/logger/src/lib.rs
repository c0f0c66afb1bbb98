//! # Logger
//!
//! Flag-driven logging for command-line programs.
//!
//! [`LoggerAdapter`] registers `--<prefix>-level` and `--<prefix>-format` and,
//! once flags are parsed, installs a `tracing` subscriber matching them:
//!
//! * the level accepts `trace`, `debug`, `info`, `warn`, `error`, `fatal` and
//!   `panic` in any letter case;
//! * the format `auto` renders human-readable lines when stdout is a terminal
//!   and JSON otherwise, `console` and `json` force one or the other.
//!
//! Records are written to stderr. Optional `opentelemetry` support attaches a
//! layer exporting spans through the global `OpenTelemetry` tracer.
//!
//! ## Example
//!
//! ```rust
//! use clap::Command;
//! use cmdkit_kernel::FlagSet;
//! use cmdkit_logger::{LoggerAdapter, LoggerOptions};
//!
//! let adapter = LoggerAdapter::new(LoggerOptions::default()).unwrap();
//! let mut flags = FlagSet::new().persistent(true);
//! adapter.register_flags(&mut flags);
//!
//! let matches = flags
//!     .apply(Command::new("myapp"))
//!     .try_get_matches_from(["myapp", "--log-level", "debug"])
//!     .unwrap();
//! let logger = adapter.config_from_matches(&matches).unwrap().build().unwrap();
//! logger.scoped(|| tracing::debug!("visible"));
//! ```

mod adapter;
mod error;
mod level;
mod logger;

pub use crate::adapter::{DEFAULT_FLAG_PREFIX, LoggerAdapter, LoggerOptions};
pub use crate::error::LoggerError;
pub use crate::level::{Encoding, LogFormat, LogLevel};
pub use crate::logger::{Logger, LoggingConfig};
pub use tracing::level_filters::LevelFilter;
