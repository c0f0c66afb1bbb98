use crate::error::LoggerError;
use crate::level::{LogFormat, LogLevel};
use crate::logger::{Logger, LoggingConfig, build_env_filter};
use cmdkit_kernel::flags::{get_string, string_flag};
use cmdkit_kernel::{FlagSet, Prefix, event_at};
use clap::ArgMatches;
use std::borrow::Cow;
use tracing::Level;

/// Default flag namespace (`--log-level`, `--log-format`).
pub const DEFAULT_FLAG_PREFIX: &str = "log";

/// Options for [`LoggerAdapter`].
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Flag namespace. Empty selects [`DEFAULT_FLAG_PREFIX`].
    pub flag_prefix: Cow<'static, str>,
    /// Level of the event announcing the new configuration.
    pub pre_run_level: Level,
    /// Write through a background thread instead of blocking the caller.
    pub non_blocking: bool,
    /// Extra filter directives such as `hyper=warn,myapp::db=trace`.
    pub directives: Option<String>,
    /// Tracer name used to bridge spans to the global `OpenTelemetry` tracer.
    #[cfg(feature = "opentelemetry")]
    pub opentelemetry: Option<String>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            flag_prefix: Cow::Borrowed(DEFAULT_FLAG_PREFIX),
            pre_run_level: Level::INFO,
            non_blocking: false,
            directives: None,
            #[cfg(feature = "opentelemetry")]
            opentelemetry: None,
        }
    }
}

impl LoggerOptions {
    #[must_use = "The options must be passed to LoggerAdapter::new"]
    pub fn with_flag_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.flag_prefix = prefix.into();
        self
    }

    #[must_use = "The options must be passed to LoggerAdapter::new"]
    pub const fn with_pre_run_level(mut self, level: Level) -> Self {
        self.pre_run_level = level;
        self
    }

    #[must_use = "The options must be passed to LoggerAdapter::new"]
    pub const fn with_non_blocking(mut self, enabled: bool) -> Self {
        self.non_blocking = enabled;
        self
    }

    #[must_use = "The options must be passed to LoggerAdapter::new"]
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    /// Bridges spans to the global `OpenTelemetry` tracer named `tracer`.
    ///
    /// Install a tracer provider before running the adapter.
    #[cfg(feature = "opentelemetry")]
    #[must_use = "The options must be passed to LoggerAdapter::new"]
    pub fn with_opentelemetry(mut self, tracer: impl Into<String>) -> Self {
        self.opentelemetry = Some(tracer.into());
        self
    }
}

/// Registers the logging flags and turns their values into a subscriber.
#[derive(Debug, Clone)]
pub struct LoggerAdapter {
    prefix: Prefix,
    options: LoggerOptions,
}

impl LoggerAdapter {
    /// Validates `options`. Filter directives are checked here so that a
    /// typo fails before any flag is parsed.
    pub fn new(options: LoggerOptions) -> Result<Self, LoggerError> {
        let prefix = if options.flag_prefix.trim().is_empty() {
            Prefix::new(DEFAULT_FLAG_PREFIX)
        } else {
            Prefix::new(options.flag_prefix.clone())
        };

        if prefix.as_str().chars().any(char::is_whitespace) {
            return Err(LoggerError::InvalidConfiguration {
                message: format!("Flag prefix '{prefix}' must not contain whitespace").into(),
                context: None,
            });
        }

        build_env_filter(LogLevel::default(), options.directives.as_deref())?;

        Ok(Self { prefix, options })
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    #[must_use]
    pub const fn options(&self) -> &LoggerOptions {
        &self.options
    }

    /// Adds `--<prefix>-level` and `--<prefix>-format`.
    pub fn register_flags(&self, flags: &mut FlagSet) {
        flags
            .add(string_flag(
                self.prefix.flag("level"),
                LogLevel::default().as_str(),
                r#"verbosity of logging ("trace", "debug", "info", "warn", "error")"#,
            ))
            .add(string_flag(
                self.prefix.flag("format"),
                LogFormat::default().as_str(),
                r#"format of logs ("auto", "console", "json")"#,
            ));
    }

    /// Reads the flags registered by [`LoggerAdapter::register_flags`].
    pub fn config_from_matches(&self, matches: &ArgMatches) -> Result<LoggingConfig, LoggerError> {
        let level: LogLevel = get_string(matches, &self.prefix.flag("level"))?.parse()?;
        let format = get_string(matches, &self.prefix.flag("format"))?
            .parse::<LogFormat>()
            .unwrap_or_default();

        let mut config = LoggingConfig::new(level, format);
        config.non_blocking = self.options.non_blocking;
        config.directives.clone_from(&self.options.directives);
        #[cfg(feature = "opentelemetry")]
        config.opentelemetry.clone_from(&self.options.opentelemetry);
        Ok(config)
    }

    /// Configures the process-wide logger from the parsed flags and announces
    /// the result at the configured pre-run level.
    ///
    /// Running it again reconfigures the installed logger in place.
    pub fn run(&self, matches: &ArgMatches) -> Result<Logger, LoggerError> {
        let logger = self.config_from_matches(matches)?.build()?;
        logger.set_global()?;

        let config = logger.config();
        let (level, format, encoding) = (config.level, config.format, config.encoding);
        let prefix = self.prefix.as_str();
        event_at!(
            self.options.pre_run_level,
            prefix,
            %level,
            %format,
            ?encoding,
            "Configured logging"
        );

        Ok(logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Encoding;
    use clap::Command;

    fn command(adapter: &LoggerAdapter) -> Command {
        let mut flags = FlagSet::new();
        adapter.register_flags(&mut flags);
        flags.apply(Command::new("app"))
    }

    #[test]
    fn test_empty_prefix_falls_back_to_default() {
        let adapter =
            LoggerAdapter::new(LoggerOptions::default().with_flag_prefix("")).expect("valid");
        assert_eq!(adapter.prefix().as_str(), "log");
    }

    #[test]
    fn test_invalid_directives_fail_construction() {
        let options = LoggerOptions::default().with_directives("app=shouting");
        assert!(matches!(
            LoggerAdapter::new(options),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_config_from_custom_prefix() {
        let adapter =
            LoggerAdapter::new(LoggerOptions::default().with_flag_prefix("audit")).expect("valid");
        let matches = command(&adapter)
            .try_get_matches_from(["app", "--audit-level", "TRACE", "--audit-format", "json"])
            .expect("parse");

        let config = adapter.config_from_matches(&matches).expect("config");
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.encoding, Encoding::Json);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let adapter = LoggerAdapter::new(LoggerOptions::default()).expect("valid");
        let matches =
            command(&adapter).try_get_matches_from(["app", "--log-level", "loud"]).expect("parse");

        assert!(matches!(
            adapter.config_from_matches(&matches),
            Err(LoggerError::UnknownLevel { ref level }) if level == "loud"
        ));
    }

    #[test]
    fn test_unknown_format_falls_back_to_json() {
        let adapter = LoggerAdapter::new(LoggerOptions::default()).expect("valid");
        let matches = command(&adapter)
            .try_get_matches_from(["app", "--log-format", "pretty"])
            .expect("parse");

        let config = adapter.config_from_matches(&matches).expect("config");
        assert_eq!(config.encoding, Encoding::Json);
    }
}
