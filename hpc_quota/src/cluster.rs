use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::Error;

/// Which family of quota tools a cluster uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystem {
    Lustre,
    /// BeeGFS 7.x, `beegfs-ctl`.
    BeegfsLegacy,
    /// BeeGFS 8.x, `beegfs`.
    BeegfsModern,
}

impl FromStr for FileSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<FileSystem, Error> {
        match s.trim() {
            "lustre" => Ok(FileSystem::Lustre),
            "beegfs" | "beegfs7" | "beegfs_legacy" => Ok(FileSystem::BeegfsLegacy),
            "beegfs8" | "beegfs_modern" => Ok(FileSystem::BeegfsModern),
            other => Err(Error::UnsupportedFilesystem(format!(
                "file system {} is not implemented",
                other
            ))),
        }
    }
}

impl fmt::Display for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FileSystem::Lustre => "lustre",
            FileSystem::BeegfsLegacy => "beegfs7",
            FileSystem::BeegfsModern => "beegfs8",
        };
        f.write_str(name)
    }
}

/// Static per-cluster settings.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub file_system:           FileSystem,
    /// Mount root, passed to Lustre as the quota target.
    pub file_system_prefix:    String,
    pub home_prefix:           String,
    pub scratch_prefix:        String,
    /// Search roots for project directories, tried in order.
    pub project_path_prefixes: Vec<String>,
    /// Resolve quota via directory project IDs instead of uid/gid.
    pub path_based:            bool,
    /// Groups matching this are never treated as projects.
    pub ignore_groups:         Option<Regex>,
}

impl ClusterConfig {
    pub fn new(
        file_system: FileSystem,
        file_system_prefix: impl Into<String>,
        home_prefix: impl Into<String>,
        scratch_prefix: impl Into<String>,
    ) -> ClusterConfig
    {
        ClusterConfig {
            file_system,
            file_system_prefix: file_system_prefix.into(),
            home_prefix: home_prefix.into(),
            scratch_prefix: scratch_prefix.into(),
            project_path_prefixes: Vec::new(),
            path_based: false,
            ignore_groups: None,
        }
    }
}
