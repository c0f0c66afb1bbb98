use crate::error::HttpError;
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use clap::ArgMatches;
use cmdkit_kernel::flags::{bool_flag, get_bool, get_string_expanded, string_flag};
use cmdkit_kernel::{FlagSet, ListenAddr, Network, Prefix, TlsPaths, event_at, resolve_listen_addr};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{Level, debug, info, warn};

pub const DEFAULT_FLAG_PREFIX: &str = "http";
pub const DEFAULT_ADDR: &str = ":8443";

/// Options for [`HttpAdapter`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Flag namespace. Empty selects [`DEFAULT_FLAG_PREFIX`].
    pub flag_prefix: Cow<'static, str>,
    /// Name used in log events and help text.
    pub service_name: Cow<'static, str>,
    pub default_addr: Cow<'static, str>,
    pub default_enabled: bool,
    /// Time in-flight requests get after a graceful shutdown is requested.
    pub shutdown_timeout: Duration,
    /// Level of the event announcing that the server is serving.
    pub pre_run_level: Level,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            flag_prefix: Cow::Borrowed(DEFAULT_FLAG_PREFIX),
            service_name: Cow::Borrowed("http"),
            default_addr: Cow::Borrowed(DEFAULT_ADDR),
            default_enabled: false,
            shutdown_timeout: Duration::from_secs(30),
            pre_run_level: Level::INFO,
        }
    }
}

impl HttpOptions {
    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub fn with_flag_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.flag_prefix = prefix.into();
        self
    }

    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub fn with_service_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub fn with_default_addr(mut self, addr: impl Into<Cow<'static, str>>) -> Self {
        self.default_addr = addr.into();
        self
    }

    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub const fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use = "The options must be passed to HttpAdapter::new"]
    pub const fn with_pre_run_level(mut self, level: Level) -> Self {
        self.pre_run_level = level;
        self
    }
}

/// Installs the process-wide rustls crypto provider unless one is already set.
fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }
}

/// Registers the HTTP server flags and builds an [`HttpServer`] from them.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    prefix: Prefix,
    options: HttpOptions,
}

impl HttpAdapter {
    #[must_use]
    pub fn new(options: HttpOptions) -> Self {
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
    pub const fn options(&self) -> &HttpOptions {
        &self.options
    }

    pub fn register_flags(&self, flags: &mut FlagSet) {
        let p = &self.prefix;
        let name = &self.options.service_name;
        flags
            .add(string_flag(
                p.flag("addr"),
                &*self.options.default_addr,
                format!("address to listen on to serve {name}"),
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
            .add(bool_flag(
                p.flag("enabled"),
                self.options.default_enabled,
                format!("enable {name} server"),
            ));
    }

    pub fn is_enabled(&self, matches: &ArgMatches) -> Result<bool, HttpError> {
        Ok(get_bool(matches, &self.prefix.flag("enabled"))?)
    }

    /// Builds a server for `router` from the parsed flags.
    ///
    /// Without TLS paths the server is plaintext and a warning is logged;
    /// exactly one path is a [`KernelError::PartialTls`](cmdkit_kernel::KernelError::PartialTls).
    pub async fn server_from_flags(
        &self,
        matches: &ArgMatches,
        router: Router,
    ) -> Result<HttpServer, HttpError> {
        let addr = get_string_expanded(matches, &self.prefix.flag("addr"))?;
        let addr = match resolve_listen_addr(Network::Tcp, &addr)? {
            ListenAddr::Tcp(addr) => addr,
            ListenAddr::Unix(path) => {
                return Err(HttpError::UnsupportedAddress { addr: path.display().to_string() });
            }
        };

        let tls = match TlsPaths::from_matches(matches, &self.prefix)? {
            Some(paths) => {
                install_crypto_provider();
                let config =
                    RustlsConfig::from_pem_file(&paths.cert, &paths.key).await.map_err(|source| {
                        HttpError::Certificate {
                            source,
                            context: Some(
                                format!("{} and {}", paths.cert.display(), paths.key.display())
                                    .into(),
                            ),
                        }
                    })?;
                Some(config)
            }
            None => {
                warn!(
                    prefix = self.prefix.as_str(),
                    "{} server serving plaintext",
                    self.options.service_name
                );
                None
            }
        };

        Ok(HttpServer {
            addr,
            router,
            tls,
            handle: Handle::new(),
            service_name: self.options.service_name.clone(),
            pre_run_level: self.options.pre_run_level,
        })
    }

    /// Serves `router` until `shutdown` resolves when `--<prefix>-enabled`
    /// is set, returns immediately otherwise.
    ///
    /// `shutdown` triggers a graceful shutdown bounded by
    /// [`HttpOptions::shutdown_timeout`]. It is polled on the caller's task
    /// and dropped as soon as the server stops, including on failure.
    pub async fn listen_from_flags<F>(
        &self,
        matches: &ArgMatches,
        router: Router,
        shutdown: F,
    ) -> Result<(), HttpError>
    where
        F: Future<Output = ()>,
    {
        if !self.is_enabled(matches)? {
            info!(prefix = self.prefix.as_str(), "{} server disabled", self.options.service_name);
            return Ok(());
        }

        let server = self.server_from_flags(matches, router).await?;
        let handle = server.handle();
        let timeout = self.options.shutdown_timeout;
        let graceful = async move {
            shutdown.await;
            debug!(timeout = ?timeout, "Starting graceful shutdown");
            handle.graceful_shutdown(Some(timeout));
            std::future::pending::<()>().await;
        };

        tokio::select! {
            served = server.serve() => served,
            () = graceful => Ok(()),
        }
    }
}

/// An HTTP server ready to serve; stop it through [`HttpServer::handle`].
pub struct HttpServer {
    addr: SocketAddr,
    router: Router,
    tls: Option<RustlsConfig>,
    handle: Handle<SocketAddr>,
    service_name: Cow<'static, str>,
    pre_run_level: Level,
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("addr", &self.addr)
            .field("tls", &self.tls.is_some())
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl HttpServer {
    /// The configured address; port `0` is replaced by the OS once bound
    /// (see [`Handle::listening`]).
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// A handle for graceful or immediate shutdown and for the bound address.
    #[must_use]
    pub fn handle(&self) -> Handle<SocketAddr> {
        self.handle.clone()
    }

    /// Binds and serves until the handle shuts the server down.
    pub async fn serve(self) -> Result<(), HttpError> {
        let Self { addr, router, tls, handle, service_name, pre_run_level } = self;
        event_at!(
            pre_run_level,
            %addr,
            tls = tls.is_some(),
            "{service_name} server started serving"
        );

        let served = match tls {
            Some(config) => {
                axum_server::bind_rustls(addr, config)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await
            }
            None => axum_server::bind(addr).handle(handle).serve(router.into_make_service()).await,
        };

        served.map_err(|source| HttpError::Serve {
            addr,
            source,
            context: Some(service_name.clone()),
        })?;

        info!(%addr, "{service_name} server stopped");
        Ok(())
    }
}
