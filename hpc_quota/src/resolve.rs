//! Working out what to ask the backend for.
//!
//! An account has a home directory, a scratch directory, and a directory
//! for every project group it is a member of. Depending on the cluster,
//! the quota of each of these is found either by asking for the quota of
//! a uid or gid, or by looking up the project ID of the directory.
use std::path::Path;

use indexmap::IndexMap;

use crate::backend::{Backend, IdentityKind};
use crate::{ClusterConfig, Error, Result, Usage};

/// Quota per path, in the order the paths were discovered.
pub type ResultMap = IndexMap<String, Usage>;

/// What to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Account(String),
    Project(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    ByIdentity { kind: IdentityKind, name: String },
    ByPath(String),
}

/// One backend call, and the path its result is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub logical_path: String,
    pub target:       QueryTarget,
}

impl Query {
    fn identity(logical_path: String, kind: IdentityKind, name: &str) -> Query {
        Query {
            logical_path,
            target: QueryTarget::ByIdentity {
                kind,
                name: name.to_string(),
            },
        }
    }

    fn path(path: String) -> Query {
        Query {
            logical_path: path.clone(),
            target:       QueryTarget::ByPath(path),
        }
    }
}

/// Group membership lookup.
pub trait GroupLookup {
    /// Names of the groups `account` is a member of.
    fn groups_of(&self, account: &str) -> Result<Vec<String>>;
}

impl<F> GroupLookup for F
where F: Fn(&str) -> Result<Vec<String>>
{
    fn groups_of(&self, account: &str) -> Result<Vec<String>> {
        self(account)
    }
}

/// Directory existence check.
pub trait DirProbe {
    fn is_dir(&self, path: &str) -> bool;
}

/// Checks the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirs;

impl DirProbe for LocalDirs {
    fn is_dir(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }
}

fn join(prefix: &str, name: &str) -> String {
    Path::new(prefix).join(name).to_string_lossy().into_owned()
}

pub struct Resolver<'a> {
    config:  &'a ClusterConfig,
    backend: &'a dyn Backend,
    groups:  &'a dyn GroupLookup,
    dirs:    &'a dyn DirProbe,
}

impl<'a> Resolver<'a> {
    pub fn new(
        config: &'a ClusterConfig,
        backend: &'a dyn Backend,
        groups: &'a dyn GroupLookup,
        dirs: &'a dyn DirProbe,
    ) -> Resolver<'a>
    {
        Resolver {
            config,
            backend,
            groups,
            dirs,
        }
    }

    /// The backend calls needed for `subject`, in order.
    pub fn plan(&self, subject: &Subject) -> Result<Vec<Query>> {
        match subject {
            Subject::Account(name) => self.plan_account(name),
            Subject::Project(name) => Ok(self.plan_projects(&[name.clone()])),
            Subject::Path(path) => {
                if !self.backend.supports_path_query() {
                    return Err(Error::UnsupportedFilesystem(format!(
                        "path-based query not implemented for {}",
                        self.backend.name()
                    )));
                }
                Ok(vec![Query::path(path.clone())])
            },
        }
    }

    /// Run the backend calls for `subject`. Stops at the first error.
    ///
    /// A call that returns nothing leaves the map alone. A later result
    /// for a path replaces an earlier one.
    pub fn resolve(&self, subject: &Subject) -> Result<ResultMap> {
        let prefix = &self.config.file_system_prefix;
        let mut map = ResultMap::new();
        for q in self.plan(subject)? {
            let usage = match &q.target {
                QueryTarget::ByIdentity { kind, name } => {
                    self.backend.quota_by_identity(*kind, name, prefix)?
                },
                QueryTarget::ByPath(path) => self.backend.quota_by_path(path, prefix)?,
            };
            match usage {
                Some(u) => {
                    map.insert(q.logical_path, u);
                },
                None => debug!("resolve: no quota for {}", q.logical_path),
            }
        }
        Ok(map)
    }

    fn plan_account(&self, account: &str) -> Result<Vec<Query>> {
        let cfg = self.config;
        let home = join(&cfg.home_prefix, account);
        let projects = self.project_groups(account)?;

        let mut plan = Vec::new();
        if cfg.path_based {
            plan.push(Query::path(home));
        } else {
            // home and scratch share one mount; the user quota covers both.
            let account_g = format!("{}_g", account);
            plan.push(Query::identity(cfg.file_system_prefix.clone(), IdentityKind::User, account));
            plan.push(Query::identity(home, IdentityKind::Group, &account_g));
            plan.push(Query::identity(
                join(&cfg.scratch_prefix, account),
                IdentityKind::Group,
                account,
            ));
        }
        plan.extend(self.plan_projects(&projects));
        Ok(plan)
    }

    fn plan_projects(&self, groups: &[String]) -> Vec<Query> {
        let mut plan = Vec::new();
        for (group, path) in self.valid_project_paths(groups) {
            plan.push(Query::path(path.clone()));
            if !self.config.path_based {
                plan.push(Query::identity(path, IdentityKind::Group, &group));
            }
        }
        plan
    }

    // groups of `account` that could be projects.
    fn project_groups(&self, account: &str) -> Result<Vec<String>> {
        let account_g = format!("{}_g", account);
        let mut groups: Vec<String> = Vec::new();
        for g in self.groups.groups_of(account)? {
            if g == account || g == account_g || groups.contains(&g) {
                continue;
            }
            if let Some(re) = &self.config.ignore_groups {
                if re.is_match(&g) {
                    debug!("resolve: ignoring group {}", g);
                    continue;
                }
            }
            groups.push(g);
        }
        Ok(groups)
    }

    /// For every group, the first project prefix under which it has a
    /// directory. Groups without a directory are skipped.
    pub fn valid_project_paths(&self, groups: &[String]) -> Vec<(String, String)> {
        let mut result = Vec::new();
        for group in groups {
            let found = self
                .config
                .project_path_prefixes
                .iter()
                .map(|prefix| join(prefix, group))
                .find(|path| self.dirs.is_dir(path));
            match found {
                Some(path) => result.push((group.clone(), path)),
                None => debug!("resolve: group {} has no project directory", group),
            }
        }
        result
    }
}
