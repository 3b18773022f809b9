#![doc(html_root_url = "https://docs.rs/hpc-quota/0.3.0")]
//! Storage quota reporting for shared HPC filesystems.
//!
//! BeeGFS and Lustre only expose quota information through their own
//! command line tools, and every tool (and every version of it) has its
//! own output format. This crate runs those tools, normalizes their output
//! into a single [`Usage`] record, and works out which paths and which
//! user, group or project identities to ask about for an account.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hpc_quota::{backend, exec, resolve, ClusterConfig, CurrentIdentity, FileSystem};
//!
//! # fn main() -> hpc_quota::Result<()> {
//! let config = ClusterConfig::new(FileSystem::Lustre, "/cluster", "/cluster/home", "/cluster/work/users");
//! let backend = backend::select(config.file_system, Arc::new(exec::System), || {
//!     Ok(CurrentIdentity::default())
//! })?;
//! let groups = |_: &str| -> hpc_quota::Result<Vec<String>> { Ok(Vec::new()) };
//! let resolver = resolve::Resolver::new(&config, backend.as_ref(), &groups, &resolve::LocalDirs);
//! for (path, usage) in resolver.resolve(&resolve::Subject::Account("alice".into()))? {
//!     println!("{}: {}", path, usage.space_used_bytes);
//! }
//! # Ok(())
//! # }
//! ```
#[macro_use]
extern crate log;

use std::fmt;

use serde::{Serialize, Serializer};

pub mod backend;
pub mod beegfs;
mod cluster;
mod error;
pub mod exec;
pub mod lustre;
pub mod resolve;
pub mod units;

pub use crate::backend::{Backend, CurrentIdentity, IdentityKind};
pub use crate::cluster::{ClusterConfig, FileSystem};
pub use crate::error::{Error, Result};
pub use crate::resolve::{Query, QueryTarget, ResultMap, Subject};

/// A used-amount that the backend may not be able to determine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Known(u64),
    Unknown,
}

impl Count {
    pub fn known(self) -> Option<u64> {
        match self {
            Count::Known(n) => Some(n),
            Count::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Count::Unknown
    }
}

impl From<u64> for Count {
    fn from(n: u64) -> Count {
        Count::Known(n)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Count::Known(n) => write!(f, "{}", n),
            Count::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for Count {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Count::Known(n) => serializer.serialize_u64(*n),
            Count::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// One quota snapshot for one (path, identity) pair.
///
/// A limit of `None` means there is no limit. Limits that are present
/// are always greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub space_used_bytes:       Count,
    pub space_soft_limit_bytes: Option<u64>,
    pub space_hard_limit_bytes: Option<u64>,
    pub inodes_used:            Count,
    pub inodes_soft_limit:      Option<u64>,
    pub inodes_hard_limit:      Option<u64>,
}

impl Usage {
    /// A snapshot for a path whose quota cannot be determined.
    pub fn unknown() -> Usage {
        Usage {
            space_used_bytes:       Count::Unknown,
            space_soft_limit_bytes: None,
            space_hard_limit_bytes: None,
            inodes_used:            Count::Unknown,
            inodes_soft_limit:      None,
            inodes_hard_limit:      None,
        }
    }

    /// Fraction of the space limit in use. Uses the soft limit, or the
    /// hard limit if there is no soft limit. `None` if unlimited or unknown.
    pub fn space_ratio(&self) -> Option<f64> {
        ratio(self.space_used_bytes, self.space_soft_limit_bytes, self.space_hard_limit_bytes)
    }

    /// Same as `space_ratio`, for inodes.
    pub fn inodes_ratio(&self) -> Option<f64> {
        ratio(self.inodes_used, self.inodes_soft_limit, self.inodes_hard_limit)
    }
}

fn ratio(used: Count, soft: Option<u64>, hard: Option<u64>) -> Option<f64> {
    let used = used.known()?;
    let limit = soft.or(hard).filter(|&l| l > 0)?;
    Some(used as f64 / limit as f64)
}
