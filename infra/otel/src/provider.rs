use crate::error::OtelError;
use std::fmt;
use std::str::FromStr;

/// Trace exporter backend selected by `--<prefix>-provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    /// No exporter is constructed and nothing is installed.
    #[default]
    None,
    OtlpHttp,
    OtlpGrpc,
    /// Deprecated. Exports OTLP over HTTP, which Jaeger collectors accept natively.
    Jaeger,
}

/// Wire transport used by an exporting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Http,
    Grpc,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OtlpHttp => "otlphttp",
            Self::OtlpGrpc => "otlpgrpc",
            Self::Jaeger => "jaeger",
        }
    }

    /// `None` for the `none` provider.
    #[must_use]
    pub const fn transport(self) -> Option<Transport> {
        match self {
            Self::None => None,
            Self::OtlpHttp | Self::Jaeger => Some(Transport::Http),
            Self::OtlpGrpc => Some(Transport::Grpc),
        }
    }
}

impl FromStr for Provider {
    type Err = OtelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "otlphttp" => Ok(Self::OtlpHttp),
            "otlpgrpc" => Ok(Self::OtlpGrpc),
            "jaeger" => Ok(Self::Jaeger),
            _ => Err(OtelError::UnknownProvider { provider: s.to_owned() }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path OTLP/HTTP collectors receive traces on.
pub const OTLP_HTTP_TRACES_PATH: &str = "/v1/traces";

/// Turns the `--<prefix>-endpoint` value into an exporter URL.
///
/// An empty endpoint yields `None` so that the exporter falls back to the
/// `OTEL_EXPORTER_OTLP_*` variables or its defaults. A scheme, when present,
/// must agree with `insecure` (`http` exactly when insecure). A bare
/// `host:port` gets the scheme implied by `insecure`, and HTTP endpoints
/// without a path are pointed at [`OTLP_HTTP_TRACES_PATH`].
pub fn normalize_endpoint(
    endpoint: &str,
    insecure: bool,
    transport: Transport,
) -> Result<Option<String>, OtelError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Ok(None);
    }

    let invalid = |message: &'static str| OtelError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        message: message.into(),
    };

    let (scheme, rest) = match endpoint.split_once("://") {
        Some((scheme, rest)) => {
            let scheme = scheme.to_ascii_lowercase();
            match scheme.as_str() {
                "http" | "https" if (scheme == "http") != insecure => {
                    return Err(OtelError::EndpointScheme { scheme, insecure });
                }
                "http" | "https" => (scheme, rest),
                _ => return Err(invalid("scheme must be http or https")),
            }
        }
        None => ((if insecure { "http" } else { "https" }).to_owned(), endpoint),
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid("missing host"));
    }

    let mut url = format!("{scheme}://{rest}");
    if transport == Transport::Http && !rest.contains('/') {
        url.push_str(OTLP_HTTP_TRACES_PATH);
    }
    Ok(Some(url))
}
