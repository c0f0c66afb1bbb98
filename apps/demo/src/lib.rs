//! # CmdKit Demo
//!
//! A small program wiring every adapter into one `clap` command tree:
//!
//! - `serve` carries the `Logging`, `Tracing`, `gRPC` and `HTTP` flag groups,
//!   installs tracing and logging from a [`PreRun`], then serves the gRPC
//!   health service and an HTTP `/healthz` endpoint on a runtime sized to the
//!   container's CPU quota.
//! - `version` prints the program version, `--include-deps` adds the adapters.
//!
//! Every flag can also be set through `CMDKIT_DEMO_<FLAG>`.
//!
//! ## Example
//! ```no_run
//! use cmdkit_demo::App;
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = App::new()?;
//!     let matches = app.command().get_matches();
//!     app.run(&matches)
//! }
//! ```

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use cmdkit::clap::{ArgMatches, Command};
use cmdkit::grpc::{GrpcAdapter, GrpcOptions};
use cmdkit::http::{HttpAdapter, HttpOptions};
use cmdkit::logger::{Logger, LoggerAdapter, LoggerOptions};
use cmdkit::otel::{Telemetry, TracingAdapter, TracingOptions};
use cmdkit::runtime::{ProcLimits, RuntimeConfig, build_runtime_with_config};
use cmdkit::{EnvSync, NamedFlagSets, PreRun, VersionInfo};
use std::future::Future;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

pub const PROGRAM: &str = "cmdkit-demo";
/// Namespace of the environment variables mirrored into flags.
pub const ENV_PREFIX: &str = "cmdkit-demo";

/// Handles produced by the pre-run steps; keep it alive while serving.
#[derive(Debug, Default)]
pub struct State {
    pub telemetry: Option<Telemetry>,
    pub logger: Option<Logger>,
}

/// The configured adapters of the program.
#[derive(Debug, Clone)]
pub struct App {
    logger: LoggerAdapter,
    tracing: TracingAdapter,
    grpc: GrpcAdapter,
    http: HttpAdapter,
    version: VersionInfo,
}

impl App {
    pub fn new() -> Result<Self> {
        let logger = LoggerAdapter::new(LoggerOptions::default().with_opentelemetry(PROGRAM))
            .context("Invalid logging options")?;
        let tracing = TracingAdapter::new(TracingOptions::default().with_service_name(PROGRAM))
            .context("Invalid tracing options")?;
        let grpc = GrpcAdapter::new(
            GrpcOptions::default().with_service_name("health gRPC").with_default_enabled(true),
        );
        let http = HttpAdapter::new(
            HttpOptions::default()
                .with_service_name("health HTTP")
                .with_default_addr(":8080")
                .with_default_enabled(true),
        );

        let version = cmdkit::ENABLED.iter().fold(
            VersionInfo::new(PROGRAM).with_package_version(env!("CARGO_PKG_VERSION")),
            |info, adapter| info.with_dependency(format!("cmdkit-{adapter}"), env!("CARGO_PKG_VERSION")),
        );

        Ok(Self { logger, tracing, grpc, http, version })
    }

    /// The command tree before environment synchronization.
    #[must_use]
    pub fn base_command(&self) -> Command {
        let mut groups = NamedFlagSets::new();
        self.logger.register_flags(groups.flag_set("Logging"));
        self.tracing.register_flags(groups.flag_set("Tracing"));
        self.grpc.register_flags(groups.flag_set("gRPC"));
        self.http.register_flags(groups.flag_set("HTTP"));

        let serve = groups.apply(
            Command::new("serve").about("Serve the gRPC health service and an HTTP health check"),
        );

        Command::new(PROGRAM)
            .about("Demonstrates flag groups, environment variables and server adapters")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(serve)
            .subcommand(self.version.version_command())
    }

    /// The command tree with every flag mirrored from `CMDKIT_DEMO_*`.
    #[must_use]
    pub fn command(&self) -> Command {
        EnvSync::new(ENV_PREFIX).apply(self.base_command())
    }

    /// Tracing goes first so that the logging bridge finds the installed provider.
    #[must_use]
    pub fn pre_run(&self) -> PreRun<State> {
        let tracing = self.tracing.clone();
        let logger = self.logger.clone();
        PreRun::new()
            .step("tracing", move |matches, state: &mut State| {
                state.telemetry = Some(tracing.run(matches)?);
                Ok(())
            })
            .step("logging", move |matches, state: &mut State| {
                state.logger = Some(logger.run(matches)?);
                Ok(())
            })
    }

    /// Dispatches the parsed command line.
    pub fn run(&self, matches: &ArgMatches) -> Result<()> {
        match matches.subcommand() {
            Some(("version", sub)) => {
                self.version.write_version(sub, std::io::stdout().lock())?;
                Ok(())
            }
            Some(("serve", sub)) => self.run_serve(matches, sub),
            _ => Ok(()),
        }
    }

    fn run_serve(&self, matches: &ArgMatches, sub: &ArgMatches) -> Result<()> {
        let limits = ProcLimits::detect();
        let config = RuntimeConfig::from_limits(&limits).with_thread_name(PROGRAM);
        let runtime = build_runtime_with_config(&config)
            .context("Critical: cannot size the runtime to the process limits")?;

        let state = runtime.block_on(async {
            let mut state = State::default();
            self.pre_run().run(matches, &mut state)?;

            info!(
                worker_threads = config.worker_threads,
                memory_soft_limit = ?limits.memory_soft_limit(),
                "Applied process limits"
            );

            self.serve(sub, shutdown_on_signal()).await?;
            Ok::<_, anyhow::Error>(state)
        })?;

        // The exporter may still need the runtime to flush.
        if let Some(telemetry) = state.telemetry {
            telemetry.shutdown().context("Failed to flush traces")?;
        }
        Ok(())
    }

    /// Serves both health endpoints until `shutdown` resolves or one fails.
    pub async fn serve<F>(&self, matches: &ArgMatches, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        let grpc = async {
            let Some(listener) = self.grpc.bind(matches).await? else {
                return Ok(());
            };
            let (_reporter, health) = tonic_health::server::health_reporter();
            let router = self.grpc.server_from_flags(matches)?.add_service(health);
            self.grpc.serve(listener, router, stopped(stop_rx.clone())).await
        };

        let router = Router::new().route("/healthz", get(|| async { "ok" }));
        let http = self.http.listen_from_flags(matches, router, stopped(stop_rx.clone()));

        tokio::try_join!(
            async { grpc.await.context("gRPC server failed") },
            async { http.await.context("HTTP server failed") },
        )?;

        info!("Server shutdown complete");
        Ok(())
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Resolves on the first shutdown signal. A failure to install the handlers
/// is logged and never resolves.
async fn shutdown_on_signal() {
    match shutdown_signal().await {
        Ok(()) => info!("Shutdown signal received, starting graceful shutdown..."),
        Err(e) => {
            error!("Error while waiting for shutdown signal: {e:#}");
            std::future::pending::<()>().await;
        }
    }
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}
