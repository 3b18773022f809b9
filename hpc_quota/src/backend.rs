//! The filesystem backends behind one interface.
use std::fmt;
use std::sync::Arc;

use crate::beegfs::{BeegfsLegacy, BeegfsModern};
use crate::exec::Executor;
use crate::lustre::Lustre;
use crate::{FileSystem, Result, Usage};

/// Whether an identity query is about a user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    User,
    Group,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityKind::User => f.write_str("user"),
            IdentityKind::Group => f.write_str("group"),
        }
    }
}

/// The user running the tool and the groups it belongs to.
///
/// BeeGFS 8 only lets unprivileged users query their own identities, and
/// wants those queried as `current`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentIdentity {
    pub user:   String,
    pub groups: Vec<String>,
}

impl CurrentIdentity {
    pub fn is_current(&self, kind: IdentityKind, name: &str) -> bool {
        match kind {
            IdentityKind::User => self.user == name,
            IdentityKind::Group => self.groups.iter().any(|g| g == name),
        }
    }
}

/// Quota lookups for one filesystem type.
///
/// Both lookups return `Ok(None)` when there is simply no quota entry.
pub trait Backend {
    /// Short name, for log and error messages.
    fn name(&self) -> &'static str;

    /// Quota of a user or group on the filesystem mounted at `mount_prefix`.
    fn quota_by_identity(
        &self,
        kind: IdentityKind,
        name: &str,
        mount_prefix: &str,
    ) -> Result<Option<Usage>>;

    /// Quota of the directory `path`.
    fn quota_by_path(&self, path: &str, mount_prefix: &str) -> Result<Option<Usage>>;

    /// Whether `quota_by_path` can return anything at all.
    fn supports_path_query(&self) -> bool {
        false
    }
}

/// Build the backend for a filesystem type.
///
/// `current_identity` is only called for backends that need it.
pub fn select<F>(
    file_system: FileSystem,
    executor: Arc<dyn Executor>,
    current_identity: F,
) -> Result<Box<dyn Backend>>
where
    F: FnOnce() -> Result<CurrentIdentity>,
{
    let backend: Box<dyn Backend> = match file_system {
        FileSystem::Lustre => Box::new(Lustre::new(executor)),
        FileSystem::BeegfsLegacy => Box::new(BeegfsLegacy::new(executor)),
        FileSystem::BeegfsModern => Box::new(BeegfsModern::new(executor, current_identity()?)),
    };
    debug!("backend: {} for {}", backend.name(), file_system);
    Ok(backend)
}
