use crate::error::OtelError;
use crate::propagation::parse_propagators;
use crate::provider::Provider;
use crate::telemetry::{DEFAULT_SAMPLE_RATIO, Telemetry, TracingConfig};
use clap::ArgMatches;
use cmdkit_kernel::flags::{bool_flag, f64_flag, get_bool, get_f64, get_string, string_flag};
use cmdkit_kernel::{FlagSet, Prefix, event_at};
use std::borrow::Cow;
use tracing::Level;

/// Default flag namespace (`--otel-provider`, `--otel-endpoint` ...).
pub const DEFAULT_FLAG_PREFIX: &str = "otel";

/// Hidden Jaeger flags kept for older deployments. Their names do not follow
/// the flag prefix.
pub const LEGACY_JAEGER_ENDPOINT_FLAG: &str = "otel-jaeger-endpoint";
pub const LEGACY_JAEGER_SERVICE_NAME_FLAG: &str = "otel-jaeger-service-name";

/// Options for [`TracingAdapter`].
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Flag namespace. Empty selects [`DEFAULT_FLAG_PREFIX`].
    pub flag_prefix: Cow<'static, str>,
    /// Default of `--<prefix>-service-name`; the executable's file stem when unset.
    pub service_name: Option<String>,
    /// Level of the event announcing the new configuration.
    pub pre_run_level: Level,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            flag_prefix: Cow::Borrowed(DEFAULT_FLAG_PREFIX),
            service_name: None,
            pre_run_level: Level::INFO,
        }
    }
}

impl TracingOptions {
    #[must_use = "The options must be passed to TracingAdapter::new"]
    pub fn with_flag_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.flag_prefix = prefix.into();
        self
    }

    #[must_use = "The options must be passed to TracingAdapter::new"]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    #[must_use = "The options must be passed to TracingAdapter::new"]
    pub const fn with_pre_run_level(mut self, level: Level) -> Self {
        self.pre_run_level = level;
        self
    }
}

fn executable_stem() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    exe.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

/// Registers the tracing flags and turns their values into a [`Telemetry`] handle.
#[derive(Debug, Clone)]
pub struct TracingAdapter {
    prefix: Prefix,
    service_name: String,
    options: TracingOptions,
}

impl TracingAdapter {
    pub fn new(options: TracingOptions) -> Result<Self, OtelError> {
        let prefix = if options.flag_prefix.trim().is_empty() {
            Prefix::new(DEFAULT_FLAG_PREFIX)
        } else {
            Prefix::new(options.flag_prefix.clone())
        };

        let service_name = options
            .service_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(executable_stem)
            .ok_or(OtelError::MissingServiceName)?;

        Ok(Self { prefix, service_name, options })
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Default service name registered on `--<prefix>-service-name`.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn register_flags(&self, flags: &mut FlagSet) {
        let p = &self.prefix;
        flags
            .add(string_flag(
                p.flag("provider"),
                Provider::default().as_str(),
                r#"OpenTelemetry provider for tracing ("none", "otlphttp", "otlpgrpc", "jaeger")"#,
            ))
            .add(string_flag(p.flag("endpoint"), "", "OpenTelemetry collector endpoint"))
            .add(string_flag(
                p.flag("service-name"),
                self.service_name.as_str(),
                "service name for trace data",
            ))
            .add(string_flag(
                p.flag("trace-propagator"),
                "w3c",
                r#"OpenTelemetry trace propagation format ("b3", "w3c", "ottrace"), comma separated"#,
            ))
            .add(bool_flag(
                p.flag("insecure"),
                false,
                "connect to the OpenTelemetry collector in plaintext",
            ))
            .add(f64_flag(
                p.flag("sample-ratio"),
                DEFAULT_SAMPLE_RATIO,
                "ratio of traces to sample, between 0 and 1",
            ))
            .add(
                string_flag(LEGACY_JAEGER_ENDPOINT_FLAG, "", "Jaeger collector endpoint").hide(true),
            )
            .add(
                string_flag(LEGACY_JAEGER_SERVICE_NAME_FLAG, "", "Jaeger service name").hide(true),
            );
    }

    /// Reads the flags registered by [`TracingAdapter::register_flags`].
    ///
    /// With the `jaeger` provider the hidden `--otel-jaeger-*` flags fill in an
    /// empty endpoint and replace a service name left at its default.
    pub fn config_from_matches(&self, matches: &ArgMatches) -> Result<TracingConfig, OtelError> {
        let p = &self.prefix;
        let provider: Provider = get_string(matches, &p.flag("provider"))?.parse()?;
        let mut endpoint = get_string(matches, &p.flag("endpoint"))?;
        let mut service_name = get_string(matches, &p.flag("service-name"))?;

        if provider == Provider::Jaeger {
            let legacy_endpoint = get_string(matches, LEGACY_JAEGER_ENDPOINT_FLAG)?;
            if endpoint.is_empty() {
                endpoint = legacy_endpoint;
            }
            let legacy_name = get_string(matches, LEGACY_JAEGER_SERVICE_NAME_FLAG)?;
            if !legacy_name.is_empty()
                && (service_name.is_empty() || service_name == self.service_name)
            {
                service_name = legacy_name;
            }
        }
        if service_name.trim().is_empty() {
            service_name.clone_from(&self.service_name);
        }

        let config = TracingConfig {
            provider,
            endpoint,
            service_name,
            propagators: parse_propagators(&get_string(matches, &p.flag("trace-propagator"))?),
            insecure: get_bool(matches, &p.flag("insecure"))?,
            sample_ratio: get_f64(matches, &p.flag("sample-ratio"))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Installs the tracer provider selected by the parsed flags and
    /// announces it at the configured pre-run level.
    pub fn run(&self, matches: &ArgMatches) -> Result<Telemetry, OtelError> {
        let config = self.config_from_matches(matches)?;
        let telemetry = config.init()?;

        let provider = config.provider.as_str();
        let service_name = config.service_name.as_str();
        let endpoint = config.endpoint.as_str();
        let sample_ratio = config.sample_ratio;
        let propagators =
            config.propagators.iter().map(|kind| kind.as_str()).collect::<Vec<_>>().join(",");
        event_at!(
            self.options.pre_run_level,
            provider,
            service_name,
            endpoint,
            sample_ratio,
            %propagators,
            "Configured tracing"
        );

        Ok(telemetry)
    }
}
