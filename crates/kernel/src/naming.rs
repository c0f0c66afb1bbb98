//! Flag and environment-variable naming convention.
//!
//! Every adapter namespaces its flags with a short prefix (`log`, `otel`,
//! `grpc`, `http`). The same prefix, upper-cased, namespaces the environment
//! variables that [`EnvSync`](crate::env::EnvSync) consults.

use std::borrow::Cow;
use std::fmt;

/// Separator placed between the prefix and the suffix words of a flag name.
pub const FLAG_SEPARATOR: &str = "-";
/// Separator placed between words of an environment variable name.
pub const ENV_SEPARATOR: &str = "_";

/// Joins `prefix` and `suffixes` with [`FLAG_SEPARATOR`].
///
/// Empty parts are skipped, so an empty prefix never yields a leading `-`.
///
/// ```rust
/// use cmdkit_kernel::naming::join_flag;
///
/// assert_eq!(join_flag("grpc", &["tls", "cert", "path"]), "grpc-tls-cert-path");
/// assert_eq!(join_flag("", &["level"]), "level");
/// ```
#[must_use]
pub fn join_flag(prefix: &str, suffixes: &[&str]) -> String {
    std::iter::once(prefix)
        .chain(suffixes.iter().copied())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(FLAG_SEPARATOR)
}

/// Derives the environment variable consulted for `flag`.
///
/// The result is `UPPER(env_prefix) + "_" + UPPER(flag)` with every `-`
/// replaced by `_`. An empty `env_prefix` yields only the flag part.
///
/// ```rust
/// use cmdkit_kernel::naming::env_var_name;
///
/// assert_eq!(env_var_name("my-app", "log-level"), "MY_APP_LOG_LEVEL");
/// ```
#[must_use]
pub fn env_var_name(env_prefix: &str, flag: &str) -> String {
    let flag = to_env_case(flag);
    if env_prefix.is_empty() {
        return flag;
    }
    format!("{}{ENV_SEPARATOR}{flag}", to_env_case(env_prefix))
}

fn to_env_case(value: &str) -> String {
    value.to_uppercase().replace(FLAG_SEPARATOR, ENV_SEPARATOR)
}

/// A flag namespace owned by one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix(Cow<'static, str>);

impl Prefix {
    pub fn new(prefix: impl Into<Cow<'static, str>>) -> Self {
        Self(prefix.into())
    }

    /// Full flag name for a single suffix, e.g. `grpc` + `addr` = `grpc-addr`.
    #[must_use]
    pub fn flag(&self, suffix: &str) -> String {
        join_flag(&self.0, &[suffix])
    }

    /// Full flag name for several suffix words.
    #[must_use]
    pub fn join(&self, suffixes: &[&str]) -> String {
        join_flag(&self.0, suffixes)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Prefix {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Prefix {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_joins_multiple_words() {
        let prefix = Prefix::new("otel");
        assert_eq!(prefix.flag("provider"), "otel-provider");
        assert_eq!(prefix.join(&["trace", "propagator"]), "otel-trace-propagator");
    }

    #[test]
    fn test_env_var_name_replaces_separators_in_prefix() {
        assert_eq!(env_var_name("spice-db", "grpc-max-conn-age"), "SPICE_DB_GRPC_MAX_CONN_AGE");
        assert_eq!(env_var_name("", "http-addr"), "HTTP_ADDR");
    }
}
