//! A reusable `version` command.
//!
//! ## Example
//!
//! ```rust
//! use cmdkit_kernel::version::VersionInfo;
//!
//! let info = VersionInfo::new("myapp")
//!     .with_package_version("1.2.0")
//!     .with_revision("0123456789abcdef", true);
//! assert_eq!(info.usage_version(false), "myapp 0123456789ab-dirty");
//! ```

use crate::error::{KernelError, Result};
use crate::flags::{FlagSet, bool_flag, get_bool};
use clap::{ArgMatches, Command};
use std::io::Write;

/// Name of the flag toggling dependency output.
pub const INCLUDE_DEPS_FLAG: &str = "include-deps";

const DEVEL_VERSION: &str = "(devel)";
const SHORT_REVISION_LEN: usize = 12;

/// Build metadata describing a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    program: String,
    version: Option<String>,
    package_version: Option<String>,
    revision: Option<String>,
    dirty: bool,
    deps: Vec<(String, String)>,
}

impl VersionInfo {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    /// An explicit version, taking precedence over everything else.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into()).filter(|v| !v.is_empty());
        self
    }

    /// The version recorded in the package manifest.
    #[must_use]
    pub fn with_package_version(mut self, version: impl Into<String>) -> Self {
        self.package_version = Some(version.into()).filter(|v| !v.is_empty());
        self
    }

    /// The VCS revision the binary was built from.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>, dirty: bool) -> Self {
        self.revision = Some(revision.into()).filter(|v| !v.is_empty());
        self.dirty = dirty;
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.deps.push((name.into(), version.into()));
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolves the version: explicit version, then the short VCS revision,
    /// then the package version.
    #[must_use]
    pub fn version(&self) -> String {
        if let Some(version) = &self.version {
            return version.clone();
        }
        if let Some(revision) = &self.revision {
            let short: String = revision.chars().take(SHORT_REVISION_LEN).collect();
            return if self.dirty { format!("{short}-dirty") } else { short };
        }
        self.package_version.clone().unwrap_or_else(|| DEVEL_VERSION.to_owned())
    }

    /// Renders the text printed by the `version` command.
    #[must_use]
    pub fn usage_version(&self, include_deps: bool) -> String {
        let version = self.version();
        let mut out = if version == DEVEL_VERSION {
            format!("{} development build (unknown exact version)", self.program)
        } else {
            format!("{} {version}", self.program)
        };

        if include_deps {
            for (name, dep_version) in &self.deps {
                out.push_str(&format!("\n\t{name} {dep_version}"));
            }
        }
        out
    }

    /// Builds a `version` subcommand carrying `--include-deps`.
    #[must_use]
    pub fn version_command(&self) -> Command {
        let mut flags = FlagSet::new();
        register_version_flags(&mut flags);
        flags.apply(Command::new("version").about(format!("Display the version of {}", self.program)))
    }

    /// Writes the version line(s) for the parsed `version` command to `w`.
    pub fn write_version(&self, matches: &ArgMatches, mut w: impl Write) -> Result<()> {
        let include_deps = get_bool(matches, INCLUDE_DEPS_FLAG)?;
        writeln!(w, "{}", self.usage_version(include_deps)).map_err(|source| KernelError::Io {
            source,
            context: Some("writing version".into()),
        })
    }
}

/// Adds `--include-deps` to `flags`.
pub fn register_version_flags(flags: &mut FlagSet) {
    flags.add(bool_flag(INCLUDE_DEPS_FLAG, false, "include dependencies' versions"));
}
