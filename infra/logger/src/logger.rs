use crate::error::LoggerError;
use crate::level::{Encoding, LogFormat, LogLevel};
use std::fmt;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

/// Filter, format and bridge layers of one configuration.
type LoggingLayer = Box<dyn Layer<Registry> + Send + Sync>;
type LoggingHandle = reload::Handle<LoggingLayer, Registry>;

/// Reload handle of the process-wide subscriber, set by the first install.
static GLOBAL: Mutex<Option<LoggingHandle>> = Mutex::new(None);

/// Resolved logging settings, usually produced by
/// [`LoggerAdapter::config_from_matches`](crate::LoggerAdapter::config_from_matches).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub encoding: Encoding,
    pub non_blocking: bool,
    pub directives: Option<String>,
    #[cfg(feature = "opentelemetry")]
    pub opentelemetry: Option<String>,
}

impl LoggingConfig {
    /// Settings for `level` and `format`, resolving the encoding against stdout.
    #[must_use]
    pub fn new(level: LogLevel, format: LogFormat) -> Self {
        Self {
            level,
            format,
            encoding: format.resolve(std::io::stdout().is_terminal()),
            non_blocking: false,
            directives: None,
            #[cfg(feature = "opentelemetry")]
            opentelemetry: None,
        }
    }

    /// Builds a [`Logger`] writing to stderr.
    pub fn build(self) -> Result<Logger, LoggerError> {
        let ansi = std::io::stderr().is_terminal();
        if self.non_blocking {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            self.assemble(BoxMakeWriter::new(writer), ansi, Some(guard))
        } else {
            self.assemble(BoxMakeWriter::new(std::io::stderr), ansi, None)
        }
    }

    /// Builds a [`Logger`] writing to `make_writer`, without ANSI colors.
    pub fn build_with_writer<W>(self, make_writer: W) -> Result<Logger, LoggerError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.assemble(BoxMakeWriter::new(make_writer), false, None)
    }

    fn assemble(
        self,
        writer: BoxMakeWriter,
        ansi: bool,
        guard: Option<WorkerGuard>,
    ) -> Result<Logger, LoggerError> {
        let filter = build_env_filter(self.level, self.directives.as_deref())?;

        let fmt = tracing_subscriber::fmt::layer().with_writer(writer);
        let mut layers: Vec<LoggingLayer> = vec![match self.encoding {
            Encoding::Json => fmt.json().with_ansi(false).boxed(),
            Encoding::Console => fmt.with_ansi(ansi).boxed(),
        }];

        #[cfg(feature = "opentelemetry")]
        if let Some(name) = self.opentelemetry.clone() {
            let tracer = opentelemetry::global::tracer(name);
            layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
        }

        let (layer, handle) = reload::Layer::new(filter.and_then(layers).boxed());
        let subscriber = tracing_subscriber::registry().with(layer);

        Ok(Logger {
            dispatch: Dispatch::new(subscriber),
            handle,
            detached: AtomicBool::new(false),
            config: self,
            guard,
        })
    }
}

pub(crate) fn build_env_filter(
    level: LogLevel,
    directives: Option<&str>,
) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(level.level_filter().into());
    directives.filter(|d| !d.trim().is_empty()).map_or_else(
        || Ok(builder.parse_lossy("")),
        |directives| {
            builder.parse(directives).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid filter directives '{directives}': {e}").into(),
                context: None,
            })
        },
    )
}

/// A configured subscriber.
///
/// Holds the background writer guard when non-blocking output is enabled;
/// keep the handle alive until shutdown so buffered records are flushed.
#[must_use = "Dropping this handle will stop background logging threads."]
pub struct Logger {
    dispatch: Dispatch,
    handle: LoggingHandle,
    /// Set once the layers moved into the global subscriber.
    detached: AtomicBool,
    config: LoggingConfig,
    guard: Option<WorkerGuard>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .field("non_blocking", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Installs the subscriber for the whole process.
    ///
    /// The first call installs the global dispatcher. Later calls move this
    /// logger's filter and format into it, so the last install wins; after
    /// that, [`Logger::scoped`] on this handle records nothing and installing
    /// it again changes nothing. Fails when a subscriber not created by this
    /// crate is already installed.
    pub fn set_global(&self) -> Result<(), LoggerError> {
        let mut global = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        match global.as_ref() {
            Some(installed) => {
                if self.detached.swap(true, Ordering::AcqRel) {
                    return Ok(());
                }
                // The detached dispatch stays registered; OFF keeps it out of the max level.
                let mut layer = None;
                self.handle
                    .modify(|current| {
                        layer = Some(std::mem::replace(current, LevelFilter::OFF.boxed()));
                    })
                    .map_err(|source| LoggerError::Reload {
                        source,
                        context: Some("Detaching logger layers".into()),
                    })?;
                let Some(layer) = layer else {
                    return Ok(());
                };
                installed.reload(layer).map_err(|source| LoggerError::Reload {
                    source,
                    context: Some("Reconfiguring global logger".into()),
                })
            }
            None => {
                tracing::dispatcher::set_global_default(self.dispatch.clone()).map_err(
                    |source| LoggerError::Subscriber {
                        source,
                        context: Some("Installing global logger".into()),
                    },
                )?;
                *global = Some(self.handle.clone());
                Ok(())
            }
        }
    }

    /// Runs `f` with this subscriber as the current default.
    pub fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    #[must_use]
    pub const fn config(&self) -> &LoggingConfig {
        &self.config
    }

    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Returns a reference to the non-blocking worker guard, if present.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::debug!("Logging system shutting down, flushing buffers...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            let bytes = self.0.lock().map(|buf| buf.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if let Ok(mut buf) = self.0.lock() {
                buf.extend_from_slice(data);
            }
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logger(level: LogLevel, format: LogFormat, capture: &Capture) -> Logger {
        let capture = capture.clone();
        LoggingConfig::new(level, format)
            .build_with_writer(move || capture.clone())
            .expect("logger should build")
    }

    #[test]
    fn test_level_filters_records() {
        let capture = Capture::default();
        let logger = logger(LogLevel::Warn, LogFormat::Console, &capture);

        logger.scoped(|| {
            tracing::info!("quiet");
            tracing::warn!("loud");
        });

        let output = capture.contents();
        assert!(output.contains("loud"));
        assert!(!output.contains("quiet"));
    }

    #[test]
    fn test_json_encoding_emits_objects() {
        let capture = Capture::default();
        let logger = logger(LogLevel::Info, LogFormat::Json, &capture);

        logger.scoped(|| tracing::info!(component = "test", "structured"));

        let output = capture.contents();
        let line = output.lines().next().expect("one record");
        assert!(line.starts_with('{') && line.ends_with('}'));
        assert!(line.contains(r#""component":"test""#));
    }

    #[test]
    fn test_directives_are_validated() {
        let mut config = LoggingConfig::new(LogLevel::Info, LogFormat::Json);
        config.directives = Some("cmdkit=notalevel".to_owned());
        assert!(matches!(config.build(), Err(LoggerError::InvalidConfiguration { .. })));
    }
}
