use crate::error::{KernelError, Result};
use crate::flags::get_string_expanded;
use crate::naming::Prefix;
use clap::ArgMatches;
use std::path::PathBuf;

/// A certificate/key pair used to serve TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsPaths {
    /// Applies the pair policy: neither path means plaintext (`None`), both
    /// paths mean TLS, exactly one is a [`KernelError::PartialTls`].
    pub fn from_flags(prefix: &str, cert: &str, key: &str) -> Result<Option<Self>> {
        match (cert.is_empty(), key.is_empty()) {
            (true, true) => Ok(None),
            (false, false) => Ok(Some(Self { cert: cert.into(), key: key.into() })),
            _ => Err(KernelError::PartialTls { prefix: prefix.to_owned() }),
        }
    }

    /// Reads `--<prefix>-tls-cert-path` and `--<prefix>-tls-key-path`, with
    /// environment variables and `~` expanded.
    pub fn from_matches(matches: &ArgMatches, prefix: &Prefix) -> Result<Option<Self>> {
        let cert = get_string_expanded(matches, &prefix.flag("tls-cert-path"))?;
        let key = get_string_expanded(matches, &prefix.flag("tls-key-path"))?;
        Self::from_flags(prefix.as_str(), &cert, &key)
    }
}
