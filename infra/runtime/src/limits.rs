//! CPU and memory limit detection.
//!
//! Container limits come from the cgroup filesystem (v2 first, then v1) and
//! fall back to whole-host values. Unreadable or malformed files are logged at
//! debug level and treated as "no limit".
//!
//! The process's own cgroup is located through `/proc/self/cgroup` and
//! `/proc/self/mountinfo`; the nearest ancestor carrying a limit wins. Without
//! those files the hierarchy root under `/sys/fs/cgroup` is read.

use crate::error::RuntimeError;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::thread::available_parallelism;
use tracing::debug;

/// Fraction of the memory ceiling used as soft limit by default.
pub const DEFAULT_MEMORY_RATIO: f64 = 0.9;

/// cgroup v1 reports "unlimited" as a page-aligned `i64::MAX`; anything this
/// large is not a real limit.
const UNLIMITED_THRESHOLD: u64 = 1 << 62;

/// Where a limit was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    CgroupV2,
    CgroupV1,
    Host,
}

impl fmt::Display for LimitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CgroupV2 => "cgroup2",
            Self::CgroupV1 => "cgroup",
            Self::Host => "host",
        })
    }
}

/// A CFS bandwidth quota: `quota` microseconds of CPU time per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuQuota {
    pub quota_us: u64,
    pub period_us: u64,
    pub source: LimitSource,
}

impl CpuQuota {
    /// Whole CPUs granted by the quota, rounded down and at least one.
    #[must_use]
    pub fn threads(&self) -> usize {
        usize::try_from(self.quota_us / self.period_us.max(1)).unwrap_or(usize::MAX).max(1)
    }
}

/// A memory ceiling in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimit {
    pub bytes: u64,
    pub source: LimitSource,
}

impl MemoryLimit {
    /// [`DEFAULT_MEMORY_RATIO`] of the ceiling.
    #[must_use]
    pub fn soft_limit(&self) -> u64 {
        self.scaled(DEFAULT_MEMORY_RATIO)
    }

    /// `ratio` of the ceiling; `ratio` must be in `(0, 1]`.
    pub fn soft_limit_with_ratio(&self, ratio: f64) -> Result<u64, RuntimeError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(RuntimeError::InvalidRatio { ratio });
        }
        Ok(self.scaled(ratio))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn scaled(&self, ratio: f64) -> u64 {
        (self.bytes as f64 * ratio) as u64
    }
}

/// Limits visible to the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcLimits {
    pub cpu: Option<CpuQuota>,
    pub memory: Option<MemoryLimit>,
    /// CPUs the OS lets this process run on.
    pub host_parallelism: usize,
}

impl ProcLimits {
    /// Detects limits from the live filesystem.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_from(Path::new("/"))
    }

    /// Detects limits with `root` standing in for `/`.
    #[must_use]
    pub fn detect_from(root: &Path) -> Self {
        let dirs = CgroupDirs::resolve(root);
        let host_parallelism = available_parallelism().map_or(1, std::num::NonZero::get);

        let cpu = dirs
            .v2
            .as_ref()
            .and_then(|dir| dir.nearest(cpu_quota_v2))
            .or_else(|| dirs.cpu_v1.as_ref().and_then(|dir| dir.nearest(cpu_quota_v1)));
        let memory = dirs
            .v2
            .as_ref()
            .and_then(|dir| dir.nearest(memory_limit_v2))
            .or_else(|| dirs.memory_v1.as_ref().and_then(|dir| dir.nearest(memory_limit_v1)))
            .or_else(|| host_memory(&root.join("proc/meminfo")));

        let limits = Self { cpu, memory, host_parallelism };
        debug!(
            cpu = ?limits.cpu,
            memory = ?limits.memory,
            host_parallelism,
            "Detected process limits"
        );
        limits
    }

    /// Worker threads matching the CPU quota, the host parallelism without one.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.cpu.map_or(self.host_parallelism, |quota| quota.threads()).max(1)
    }

    /// Soft memory limit at [`DEFAULT_MEMORY_RATIO`], when a ceiling is known.
    #[must_use]
    pub fn memory_soft_limit(&self) -> Option<u64> {
        self.memory.as_ref().map(MemoryLimit::soft_limit)
    }
}

/// A cgroup directory of this process and the mount point of its hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CgroupDir {
    path: PathBuf,
    mount: PathBuf,
}

impl CgroupDir {
    fn root(path: PathBuf) -> Self {
        Self { mount: path.clone(), path }
    }

    /// First limit found walking from the process's cgroup up to the mount point.
    fn nearest<T>(&self, read: impl Fn(&Path) -> Option<T>) -> Option<T> {
        self.path.ancestors().take_while(|dir| dir.starts_with(&self.mount)).find_map(read)
    }
}

#[derive(Debug, Default)]
struct CgroupDirs {
    v2: Option<CgroupDir>,
    cpu_v1: Option<CgroupDir>,
    memory_v1: Option<CgroupDir>,
}

impl CgroupDirs {
    fn resolve(root: &Path) -> Self {
        let fallback = root.join("sys/fs/cgroup");
        let membership = read_trimmed(&root.join("proc/self/cgroup")).unwrap_or_default();
        let mountinfo = read_trimmed(&root.join("proc/self/mountinfo")).unwrap_or_default();
        let mounts: Vec<CgroupMount<'_>> = mountinfo.lines().filter_map(CgroupMount::parse).collect();

        let locate = |controller: Option<&str>| {
            let path = membership.lines().find_map(|line| cgroup_path(line, controller))?;
            let mount = mounts.iter().find(|mount| mount.serves(controller))?;
            Some(mount.locate(root, path))
        };

        let dirs = Self {
            v2: locate(None).or_else(|| Some(CgroupDir::root(fallback.clone()))),
            cpu_v1: locate(Some("cpu")).or_else(|| {
                cgroup_v1_dir(&fallback, &["cpu", "cpu,cpuacct", "cpuacct,cpu"]).map(CgroupDir::root)
            }),
            memory_v1: locate(Some("memory"))
                .or_else(|| cgroup_v1_dir(&fallback, &["memory"]).map(CgroupDir::root)),
        };
        debug!(?dirs, "Resolved cgroup directories");
        dirs
    }
}

/// The path of a `/proc/self/cgroup` line (`id:controllers:path`) for the v2
/// hierarchy (`controller` is `None`) or the v1 hierarchy of `controller`.
fn cgroup_path<'a>(line: &'a str, controller: Option<&str>) -> Option<&'a str> {
    let mut fields = line.splitn(3, ':');
    let id = fields.next()?;
    let controllers = fields.next()?;
    let path = fields.next()?;
    let found = match controller {
        None => id == "0" && controllers.is_empty(),
        Some(name) => controllers.split(',').any(|c| c == name),
    };
    found.then_some(path)
}

/// A cgroup entry of `/proc/self/mountinfo`.
#[derive(Debug)]
struct CgroupMount<'a> {
    root: &'a str,
    point: &'a str,
    fstype: &'a str,
    options: &'a str,
}

impl<'a> CgroupMount<'a> {
    /// `id parent major:minor root point options [optional...] - fstype source super-options`
    fn parse(line: &'a str) -> Option<Self> {
        let (mount, filesystem) = line.split_once(" - ")?;
        let mut mount = mount.split_whitespace().skip(3);
        let root = mount.next()?;
        let point = mount.next()?;
        let mut filesystem = filesystem.split_whitespace();
        let fstype = filesystem.next()?;
        let options = filesystem.nth(1).unwrap_or_default();
        matches!(fstype, "cgroup" | "cgroup2").then_some(Self { root, point, fstype, options })
    }

    fn serves(&self, controller: Option<&str>) -> bool {
        match controller {
            None => self.fstype == "cgroup2",
            Some(name) => self.fstype == "cgroup" && self.options.split(',').any(|o| o == name),
        }
    }

    /// Maps the cgroup `path` onto this mount below `root`. A path outside the
    /// mounted subtree resolves to the mount point itself.
    fn locate(&self, root: &Path, path: &str) -> CgroupDir {
        let mount = root.join(self.point.trim_start_matches('/'));
        let relative = Path::new(path)
            .strip_prefix(self.root)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .filter(|relative| relative.components().all(|c| matches!(c, Component::Normal(_))));
        let path = relative.map_or_else(|| mount.clone(), |relative| mount.join(relative));
        CgroupDir { path, mount }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents.trim().to_owned()),
        Err(error) if error.kind() == ErrorKind::NotFound => None,
        Err(error) => {
            debug!(path = %path.display(), %error, "Failed to read limit file");
            None
        }
    }
}

fn parse_u64(path: &Path, value: &str) -> Option<u64> {
    value
        .parse()
        .inspect_err(|error| debug!(path = %path.display(), value, %error, "Malformed limit value"))
        .ok()
}

fn cpu_quota_v2(cgroup: &Path) -> Option<CpuQuota> {
    let path = cgroup.join("cpu.max");
    let contents = read_trimmed(&path)?;
    let mut fields = contents.split_whitespace();
    let quota = fields.next()?;
    if quota == "max" {
        return None;
    }
    let quota_us = parse_u64(&path, quota)?;
    let period_us = fields.next().map_or(Some(100_000), |period| parse_u64(&path, period))?;
    (quota_us > 0 && period_us > 0).then_some(CpuQuota {
        quota_us,
        period_us,
        source: LimitSource::CgroupV2,
    })
}

fn cgroup_v1_dir(cgroup: &Path, controllers: &[&str]) -> Option<PathBuf> {
    controllers.iter().map(|name| cgroup.join(name)).find(|dir| dir.is_dir())
}

fn cpu_quota_v1(dir: &Path) -> Option<CpuQuota> {
    let quota_path = dir.join("cpu.cfs_quota_us");
    let quota = read_trimmed(&quota_path)?;
    if quota.starts_with('-') {
        return None;
    }
    let quota_us = parse_u64(&quota_path, &quota)?;
    let period_path = dir.join("cpu.cfs_period_us");
    let period_us = parse_u64(&period_path, &read_trimmed(&period_path)?)?;
    (quota_us > 0 && period_us > 0).then_some(CpuQuota {
        quota_us,
        period_us,
        source: LimitSource::CgroupV1,
    })
}

fn memory_limit_v2(cgroup: &Path) -> Option<MemoryLimit> {
    let path = cgroup.join("memory.max");
    let contents = read_trimmed(&path)?;
    if contents == "max" {
        return None;
    }
    let bytes = parse_u64(&path, &contents)?;
    (bytes > 0).then_some(MemoryLimit { bytes, source: LimitSource::CgroupV2 })
}

fn memory_limit_v1(dir: &Path) -> Option<MemoryLimit> {
    let path = dir.join("memory.limit_in_bytes");
    let bytes = parse_u64(&path, &read_trimmed(&path)?)?;
    (bytes > 0 && bytes < UNLIMITED_THRESHOLD)
        .then_some(MemoryLimit { bytes, source: LimitSource::CgroupV1 })
}

fn host_memory(meminfo: &Path) -> Option<MemoryLimit> {
    let contents = read_trimmed(meminfo)?;
    let line = contents.lines().find(|line| line.starts_with("MemTotal:"))?;
    let mut fields = line.split_whitespace().skip(1);
    let kib = parse_u64(meminfo, fields.next()?)?;
    let bytes = match fields.next() {
        Some("kB") | None => kib.checked_mul(1024)?,
        Some(unit) => {
            debug!(unit, "Unexpected MemTotal unit");
            return None;
        }
    };
    Some(MemoryLimit { bytes, source: LimitSource::Host })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_rounds_down_to_at_least_one() {
        let quota = |quota_us| CpuQuota { quota_us, period_us: 100_000, source: LimitSource::CgroupV2 };
        assert_eq!(quota(250_000).threads(), 2);
        assert_eq!(quota(50_000).threads(), 1);
        assert_eq!(quota(100_000).threads(), 1);
    }

    #[test]
    fn test_soft_limit_ratio() {
        let limit = MemoryLimit { bytes: 1_000_000_000, source: LimitSource::CgroupV2 };
        assert_eq!(limit.soft_limit(), 900_000_000);
        assert_eq!(limit.soft_limit_with_ratio(0.5).ok(), Some(500_000_000));
        assert!(matches!(
            limit.soft_limit_with_ratio(0.0),
            Err(RuntimeError::InvalidRatio { .. })
        ));
        assert!(limit.soft_limit_with_ratio(1.5).is_err());
    }

    #[test]
    fn test_cgroup_membership_lines() {
        assert_eq!(cgroup_path("0::/kubepods/pod1/app", None), Some("/kubepods/pod1/app"));
        assert_eq!(cgroup_path("4:cpu,cpuacct:/docker/abc", Some("cpu")), Some("/docker/abc"));
        assert_eq!(cgroup_path("4:cpu,cpuacct:/docker/abc", Some("memory")), None);
        assert_eq!(cgroup_path("1:name=systemd:/init.scope", None), None);
    }

    #[test]
    fn test_mountinfo_cgroup_entries() {
        let v1 = "33 25 0:29 /docker/abc /sys/fs/cgroup/memory rw,nosuid shared:15 - cgroup cgroup rw,memory";
        let mount = CgroupMount::parse(v1).expect("cgroup mount");
        assert_eq!((mount.root, mount.point), ("/docker/abc", "/sys/fs/cgroup/memory"));
        assert!(mount.serves(Some("memory")));
        assert!(!mount.serves(Some("cpu")));
        assert!(!mount.serves(None));

        let v2 = "30 23 0:26 / /sys/fs/cgroup rw,nosuid - cgroup2 cgroup2 rw,nsdelegate";
        assert!(CgroupMount::parse(v2).expect("cgroup2 mount").serves(None));

        let ext4 = "25 1 8:1 / / rw,relatime - ext4 /dev/sda1 rw";
        assert!(CgroupMount::parse(ext4).is_none());
    }

    #[test]
    fn test_path_outside_mount_resolves_to_mount_point() {
        let mount = CgroupMount { root: "/", point: "/sys/fs/cgroup", fstype: "cgroup2", options: "rw" };
        let root = Path::new("/fake");
        assert_eq!(
            mount.locate(root, "/../../system.slice").path,
            PathBuf::from("/fake/sys/fs/cgroup")
        );
        assert_eq!(mount.locate(root, "/app").path, PathBuf::from("/fake/sys/fs/cgroup/app"));
    }

    #[test]
    fn test_worker_threads_without_quota_use_host() {
        let limits = ProcLimits { cpu: None, memory: None, host_parallelism: 6 };
        assert_eq!(limits.worker_threads(), 6);
        assert_eq!(limits.memory_soft_limit(), None);
    }
}
