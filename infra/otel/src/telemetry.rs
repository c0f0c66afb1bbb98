use crate::error::OtelError;
use crate::propagation::{PropagatorKind, composite_propagator};
use crate::provider::{Provider, Transport, normalize_endpoint};
use opentelemetry::global;
use opentelemetry_otlp::tonic_types::transport::ClientTlsConfig;
use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, TraceError};
use tracing::{debug, warn};

/// Sample ratio used when `--<prefix>-sample-ratio` is not given.
pub const DEFAULT_SAMPLE_RATIO: f64 = 0.01;

/// Resolved tracing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    pub provider: Provider,
    /// Collector endpoint as given on the command line; empty defers to the
    /// `OTEL_EXPORTER_OTLP_*` variables.
    pub endpoint: String,
    pub service_name: String,
    pub propagators: Vec<PropagatorKind>,
    pub insecure: bool,
    pub sample_ratio: f64,
}

impl TracingConfig {
    /// A `none` provider configuration for `service_name` with the w3c propagators.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            provider: Provider::None,
            endpoint: String::new(),
            service_name: service_name.into(),
            propagators: vec![PropagatorKind::Baggage, PropagatorKind::TraceContext],
            insecure: false,
            sample_ratio: DEFAULT_SAMPLE_RATIO,
        }
    }

    /// Checks the sample ratio, the service name and, for exporting
    /// providers, the endpoint.
    pub fn validate(&self) -> Result<(), OtelError> {
        if !(0.0..=1.0).contains(&self.sample_ratio) {
            return Err(OtelError::InvalidSampleRatio { ratio: self.sample_ratio });
        }
        if self.service_name.trim().is_empty() {
            return Err(OtelError::MissingServiceName);
        }
        self.exporter_endpoint()?;
        Ok(())
    }

    /// The URL handed to the exporter, `None` when the exporter picks its own.
    pub fn exporter_endpoint(&self) -> Result<Option<String>, OtelError> {
        match self.provider.transport() {
            Some(transport) => normalize_endpoint(&self.endpoint, self.insecure, transport),
            None => Ok(None),
        }
    }

    /// Builds the exporter and installs the global tracer provider and propagator.
    ///
    /// The `none` provider installs nothing and returns an inert handle.
    pub fn init(&self) -> Result<Telemetry, OtelError> {
        self.validate()?;

        let Some(transport) = self.provider.transport() else {
            debug!("Tracing provider is none, skipping exporter setup");
            return Ok(Telemetry::disabled());
        };

        if self.provider == Provider::Jaeger {
            warn!(
                provider = %self.provider,
                "The jaeger provider is deprecated, spans are exported with OTLP over HTTP"
            );
        }

        let endpoint = self.exporter_endpoint()?;
        let exporter = self.build_exporter(transport, endpoint)?;

        let resource = Resource::builder().with_service_name(self.service_name.clone()).build();
        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.sample_ratio,
            ))))
            .with_resource(resource)
            .build();

        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(composite_propagator(&self.propagators));

        Ok(Telemetry { provider: Some(provider), propagators: self.propagators.clone() })
    }

    fn build_exporter(
        &self,
        transport: Transport,
        endpoint: Option<String>,
    ) -> Result<SpanExporter, OtelError> {
        let exported = match transport {
            Transport::Http => {
                let mut builder = SpanExporter::builder().with_http();
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                builder.build()
            }
            Transport::Grpc => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(OtelError::RuntimeRequired { provider: self.provider.to_string() });
                }
                let mut builder = SpanExporter::builder().with_tonic();
                if !self.insecure {
                    builder = builder.with_tls_config(ClientTlsConfig::new().with_native_roots());
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                builder.build()
            }
        };

        exported.map_err(|source| OtelError::Exporter {
            source: TraceError::Other(Box::new(source)),
            context: Some(format!("Failed to build {} span exporter", self.provider).into()),
        })
    }
}

/// Handle to the installed tracer provider.
///
/// Dropping it flushes pending spans and shuts the provider down.
#[derive(Debug)]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
    propagators: Vec<PropagatorKind>,
}

impl Telemetry {
    /// A handle that owns no provider.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { provider: None, propagators: Vec::new() }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    #[must_use]
    pub const fn provider(&self) -> Option<&SdkTracerProvider> {
        self.provider.as_ref()
    }

    /// Propagators installed globally, empty when disabled.
    #[must_use]
    pub fn propagators(&self) -> &[PropagatorKind] {
        &self.propagators
    }

    /// Flushes and shuts down the provider, reporting failures.
    pub fn shutdown(mut self) -> Result<(), OtelError> {
        match self.provider.take() {
            Some(provider) => provider.shutdown().map_err(|source| OtelError::Exporter {
                source: TraceError::Other(Box::new(source)),
                context: Some("Failed to shut down tracer provider".into()),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(error) = provider.shutdown() {
                debug!(%error, "Tracer provider shutdown failed");
            }
        }
    }
}
