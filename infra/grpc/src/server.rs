use crate::error::GrpcError;
use crate::listener::GrpcListener;
use clap::ArgMatches;
use cmdkit_kernel::flags::{
    bool_flag, duration_flag, get_bool, get_duration, get_string, get_string_expanded, string_flag,
};
use cmdkit_kernel::{FlagSet, Network, Prefix, TlsPaths, event_at, resolve_listen_addr};
use std::borrow::Cow;
use std::future::Future;
use std::path::Path;
use tonic::transport::server::Router;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{Level, info, warn};

pub const DEFAULT_FLAG_PREFIX: &str = "grpc";
pub const DEFAULT_ADDR: &str = ":50051";
pub const DEFAULT_MAX_CONN_AGE: &str = "30s";

/// Options for [`GrpcAdapter`].
#[derive(Debug, Clone)]
pub struct GrpcOptions {
    /// Flag namespace. Empty selects [`DEFAULT_FLAG_PREFIX`].
    pub flag_prefix: Cow<'static, str>,
    /// Name used in log events and help text.
    pub service_name: Cow<'static, str>,
    pub default_addr: Cow<'static, str>,
    pub default_enabled: bool,
    /// Level of the event announcing that the server is serving.
    pub pre_run_level: Level,
}

impl Default for GrpcOptions {
    fn default() -> Self {
        Self {
            flag_prefix: Cow::Borrowed(DEFAULT_FLAG_PREFIX),
            service_name: Cow::Borrowed("grpc"),
            default_addr: Cow::Borrowed(DEFAULT_ADDR),
            default_enabled: false,
            pre_run_level: Level::INFO,
        }
    }
}

impl GrpcOptions {
    #[must_use = "The options must be passed to GrpcAdapter::new"]
    pub fn with_flag_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.flag_prefix = prefix.into();
        self
    }

    #[must_use = "The options must be passed to GrpcAdapter::new"]
    pub fn with_service_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use = "The options must be passed to GrpcAdapter::new"]
    pub fn with_default_addr(mut self, addr: impl Into<Cow<'static, str>>) -> Self {
        self.default_addr = addr.into();
        self
    }

    #[must_use = "The options must be passed to GrpcAdapter::new"]
    pub const fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    #[must_use = "The options must be passed to GrpcAdapter::new"]
    pub const fn with_pre_run_level(mut self, level: Level) -> Self {
        self.pre_run_level = level;
        self
    }
}

/// Registers the gRPC server flags and builds, binds and runs a tonic server
/// from them.
#[derive(Debug, Clone)]
pub struct GrpcAdapter {
    prefix: Prefix,
    options: GrpcOptions,
}

impl GrpcAdapter {
    #[must_use]
    pub fn new(options: GrpcOptions) -> Self {
        let prefix = if options.flag_prefix.trim().is_empty() {
            Prefix::new(DEFAULT_FLAG_PREFIX)
        } else {
            Prefix::new(options.flag_prefix.clone())
        };
        Self { prefix, options }
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    #[must_use]
    pub const fn options(&self) -> &GrpcOptions {
        &self.options
    }

    pub fn register_flags(&self, flags: &mut FlagSet) {
        let p = &self.prefix;
        let name = &self.options.service_name;
        flags
            .add(string_flag(
                p.flag("addr"),
                &*self.options.default_addr,
                format!("address to listen on for {name}"),
            ))
            .add(string_flag(
                p.flag("network"),
                Network::default().as_str(),
                format!(r#"network type to listen on for {name} ("tcp", "tcp4", "tcp6", "unix")"#),
            ))
            .add(string_flag(
                p.flag("tls-cert-path"),
                "",
                format!("local path to the TLS certificate used to serve {name}"),
            ))
            .add(string_flag(
                p.flag("tls-key-path"),
                "",
                format!("local path to the TLS key used to serve {name}"),
            ))
            .add(duration_flag(
                p.flag("max-conn-age"),
                DEFAULT_MAX_CONN_AGE,
                format!("how long a connection to {name} should be kept alive"),
            ))
            .add(bool_flag(
                p.flag("enabled"),
                self.options.default_enabled,
                format!("enable {name} server"),
            ));
    }

    pub fn is_enabled(&self, matches: &ArgMatches) -> Result<bool, GrpcError> {
        Ok(get_bool(matches, &self.prefix.flag("enabled"))?)
    }

    /// Builds a server honouring `--<prefix>-max-conn-age` and the TLS pair.
    ///
    /// Without TLS paths the server is plaintext and a warning is logged;
    /// exactly one path is a [`KernelError::PartialTls`](cmdkit_kernel::KernelError::PartialTls).
    pub fn server_from_flags(&self, matches: &ArgMatches) -> Result<Server, GrpcError> {
        let max_conn_age = get_duration(matches, &self.prefix.flag("max-conn-age"))?;
        let server = Server::builder().max_connection_age(max_conn_age);

        match TlsPaths::from_matches(matches, &self.prefix)? {
            Some(tls) => {
                let identity = load_identity(&tls.cert, &tls.key)?;
                server.tls_config(ServerTlsConfig::new().identity(identity)).map_err(|source| {
                    GrpcError::Tls {
                        source,
                        context: Some(format!("{} certificate", self.options.service_name).into()),
                    }
                })
            }
            None => {
                warn!(
                    prefix = self.prefix.as_str(),
                    "{} server serving plaintext",
                    self.options.service_name
                );
                Ok(server)
            }
        }
    }

    /// Opens the configured listener, or returns `None` when the server is disabled.
    pub async fn bind(&self, matches: &ArgMatches) -> Result<Option<GrpcListener>, GrpcError> {
        if !self.is_enabled(matches)? {
            info!(prefix = self.prefix.as_str(), "{} server disabled", self.options.service_name);
            return Ok(None);
        }

        let network: Network = get_string(matches, &self.prefix.flag("network"))?.parse()?;
        let addr = get_string_expanded(matches, &self.prefix.flag("addr"))?;
        let resolved = resolve_listen_addr(network, &addr)?;
        GrpcListener::bind(network, &resolved).await.map(Some)
    }

    /// Serves `router` on `listener` until `shutdown` resolves.
    ///
    /// A graceful shutdown returns `Ok(())`.
    pub async fn serve<F>(
        &self,
        listener: GrpcListener,
        router: Router,
        shutdown: F,
    ) -> Result<(), GrpcError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        event_at!(
            self.options.pre_run_level,
            %addr,
            prefix = self.prefix.as_str(),
            "{} server started serving",
            self.options.service_name
        );

        listener.serve(router, shutdown).await.map_err(|source| GrpcError::Serve {
            source,
            context: Some(format!("{} on {addr}", self.options.service_name).into()),
        })?;

        info!(%addr, "{} server stopped", self.options.service_name);
        Ok(())
    }

    /// Binds and serves `router` when `--<prefix>-enabled` is set; a no-op otherwise.
    pub async fn listen_from_flags<F>(
        &self,
        matches: &ArgMatches,
        router: Router,
        shutdown: F,
    ) -> Result<(), GrpcError>
    where
        F: Future<Output = ()> + Send,
    {
        match self.bind(matches).await? {
            Some(listener) => self.serve(listener, router, shutdown).await,
            None => Ok(()),
        }
    }
}

fn load_identity(cert: &Path, key: &Path) -> Result<Identity, GrpcError> {
    let read = |kind: &'static str, path: &Path| {
        std::fs::read(path).map_err(|source| GrpcError::Certificate {
            kind,
            path: path.to_path_buf(),
            source,
        })
    };
    Ok(Identity::from_pem(read("certificate", cert)?, read("key", key)?))
}
