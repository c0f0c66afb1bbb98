//! # OpenTelemetry
//!
//! Flag-driven trace export for command-line programs.
//!
//! [`TracingAdapter`] registers the `--<prefix>-*` tracing flags and, once
//! they are parsed, installs a global tracer provider and text map
//! propagator:
//!
//! * `provider` selects `none`, `otlphttp`, `otlpgrpc` or the deprecated
//!   `jaeger` (OTLP over HTTP to a Jaeger collector);
//! * `trace-propagator` is a comma separated list of `b3`, `ottrace` and
//!   `w3c`; `w3c` stands for baggage plus trace-context;
//! * `sample-ratio` feeds a parent-based trace-id ratio sampler.
//!
//! The returned [`Telemetry`] handle flushes and shuts the provider down
//! when dropped. The gRPC exporter must be initialized inside a Tokio runtime.
//!
//! ## Example
//!
//! ```rust
//! use clap::Command;
//! use cmdkit_kernel::FlagSet;
//! use cmdkit_otel::{TracingAdapter, TracingOptions};
//!
//! let adapter = TracingAdapter::new(TracingOptions::default().with_service_name("myapp")).unwrap();
//! let mut flags = FlagSet::new();
//! adapter.register_flags(&mut flags);
//!
//! let matches = flags.apply(Command::new("myapp")).try_get_matches_from(["myapp"]).unwrap();
//! let telemetry = adapter.run(&matches).unwrap();
//! assert!(!telemetry.is_enabled());
//! ```

mod adapter;
mod error;
pub mod propagation;
mod provider;
mod telemetry;

pub use crate::adapter::{
    DEFAULT_FLAG_PREFIX, LEGACY_JAEGER_ENDPOINT_FLAG, LEGACY_JAEGER_SERVICE_NAME_FLAG, TracingAdapter,
    TracingOptions,
};
pub use crate::error::OtelError;
pub use crate::propagation::{PropagatorKind, composite_propagator, parse_propagators};
pub use crate::provider::{OTLP_HTTP_TRACES_PATH, Provider, Transport, normalize_endpoint};
pub use crate::telemetry::{DEFAULT_SAMPLE_RATIO, Telemetry, TracingConfig};
