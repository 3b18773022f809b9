//! Lustre quota backend, via `lfs`.
//!
//! Lustre can report quota for a uid or gid, or for a project ID. Clusters
//! that assign project IDs to directories look up quota by path: first the
//! directory's project ID with `lfs project`, then that project's quota.
use std::sync::Arc;

use crate::backend::{Backend, IdentityKind};
use crate::exec::{CommandLine, Executor};
use crate::units::{kib_to_bytes, parse_integer, parse_limit};
use crate::{Count, Error, Result, Usage};

pub struct Lustre {
    exec: Arc<dyn Executor>,
}

impl Lustre {
    pub fn new(exec: Arc<dyn Executor>) -> Lustre {
        Lustre { exec }
    }

    /// The project ID assigned to a directory.
    pub fn project_id(&self, path: &str) -> Result<u64> {
        let cmd = CommandLine::new("lfs").arg("project").arg("-d").arg(path);
        let output = self.exec.execute(&cmd)?;
        let first = output.split_whitespace().next().unwrap_or("");
        first
            .parse::<u64>()
            .map_err(|_| Error::Parse(format!("lfs project: no project id for {}: {}", path, output)))
    }

    fn quota(&self, flag: &str, id: &str, mount_prefix: &str, grep: Option<&str>) -> Result<Usage> {
        let cmd = CommandLine::new("lfs")
            .arg("quota")
            .arg("-q")
            .arg(flag)
            .arg(id)
            .arg(mount_prefix);
        let output = self.exec.execute(&cmd)?;
        let line = quota_line(&output, grep)?;
        parse_quota_line(&line)
    }
}

impl Backend for Lustre {
    fn name(&self) -> &'static str {
        "lustre"
    }

    fn quota_by_identity(
        &self,
        kind: IdentityKind,
        name: &str,
        mount_prefix: &str,
    ) -> Result<Option<Usage>>
    {
        let flag = match kind {
            IdentityKind::User => "-u",
            IdentityKind::Group => "-g",
        };
        self.quota(flag, name, mount_prefix, Some(mount_prefix)).map(Some)
    }

    fn quota_by_path(&self, path: &str, mount_prefix: &str) -> Result<Option<Usage>> {
        let id = self.project_id(path)?;
        if id == 0 {
            // project 0 is "no project". its quota is the usage of
            // everything without a project, not of this directory.
            debug!("lustre: {} has no project id", path);
            return Ok(Some(Usage::unknown()));
        }
        debug!("lustre: {} has project id {}", path, id);
        self.quota("-p", &id.to_string(), mount_prefix, None).map(Some)
    }

    fn supports_path_query(&self) -> bool {
        true
    }
}

// Find the quota line in `lfs quota -q` output: the first line that
// contains `grep`, or the first line. lfs puts long filesystem names on
// a line of their own, in which case the numbers follow on the next line.
fn quota_line(output: &str, grep: Option<&str>) -> Result<String> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let idx = match grep {
        Some(pat) => lines.iter().position(|l| l.contains(pat)),
        None => if lines.is_empty() { None } else { Some(0) },
    };
    let idx = idx.ok_or_else(|| Error::BackendFormat(format!("lfs quota: {}", output.trim())))?;

    let line = lines[idx];
    if line.split_whitespace().count() == 1 && idx + 1 < lines.len() {
        return Ok(format!("{} {}", line, lines[idx + 1]));
    }
    Ok(line.to_string())
}

/// Parse one `lfs quota -q` line:
/// `filesystem kbytes quota limit grace files quota limit grace`.
///
/// Space is reported in KiB and converted to bytes. A `0` limit means
/// no limit.
pub fn parse_quota_line(line: &str) -> Result<Usage> {
    let f: Vec<&str> = line.split_whitespace().collect();
    if f.len() != 9 {
        return Err(Error::BackendFormat(format!("lfs quota: {}", line)));
    }
    let kib = |t: &str| parse_integer(t).map(kib_to_bytes);
    Ok(Usage {
        space_used_bytes:       Count::Known(kib(f[1])?),
        space_soft_limit_bytes: parse_limit(f[2], kib)?,
        space_hard_limit_bytes: parse_limit(f[3], kib)?,
        inodes_used:            Count::Known(parse_integer(f[5])?),
        inodes_soft_limit:      parse_limit(f[6], parse_integer)?,
        inodes_hard_limit:      parse_limit(f[7], parse_integer)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::Scripted;

    #[test]
    fn quota_line_fields() {
        let u = parse_quota_line("/cluster 360448 21474836480 32212254720 * 1 100000 110000 -").unwrap();
        assert_eq!(
            u,
            Usage {
                space_used_bytes:       Count::Known(360448 * 1024),
                space_soft_limit_bytes: Some(21474836480 * 1024),
                space_hard_limit_bytes: Some(32212254720 * 1024),
                inodes_used:            Count::Known(1),
                inodes_soft_limit:      Some(100000),
                inodes_hard_limit:      Some(110000),
            }
        );
    }

    #[test]
    fn over_quota_marker_is_ignored() {
        let a = parse_quota_line("/cluster 1234* 1000 2000 6d23h 50* 10 20 6d23h").unwrap();
        let b = parse_quota_line("/cluster 1234 1000 2000 6d23h 50 10 20 6d23h").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.space_used_bytes, Count::Known(1234 * 1024));
        assert_eq!(a.inodes_used, Count::Known(50));
    }

    #[test]
    fn zero_limits_are_unlimited() {
        let u = parse_quota_line("/cluster 0 0 0 - 0 0 0 -").unwrap();
        assert_eq!(u.space_used_bytes, Count::Known(0));
        assert_eq!(u.space_soft_limit_bytes, None);
        assert_eq!(u.space_hard_limit_bytes, None);
        assert_eq!(u.inodes_soft_limit, None);
        assert_eq!(u.inodes_hard_limit, None);
    }

    #[test]
    fn wrong_token_count() {
        assert!(matches!(
            parse_quota_line("/cluster 1 2 3 - 4 5 6"),
            Err(Error::BackendFormat(_))
        ));
        assert!(matches!(
            parse_quota_line("/cluster a 2 3 - 4 5 6 -"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn wrapped_filesystem_name() {
        let out = "/a/very/long/filesystem/name\n   10  20  30  -  1  2  3  -";
        let line = quota_line(out, Some("/a/very")).unwrap();
        assert_eq!(parse_quota_line(&line).unwrap().space_used_bytes, Count::Known(10240));
    }

    #[test]
    fn identity_query() {
        let exec = Arc::new(Scripted::new().ok(
            "lfs quota -q -g nn1234k /cluster",
            "Disk quotas for grp nn1234k (gid 3001):\n/cluster 10 20 30 - 1 2 3 -",
        ));
        let b = Lustre::new(exec.clone());
        let u = b.quota_by_identity(IdentityKind::Group, "nn1234k", "/cluster").unwrap().unwrap();
        assert_eq!(u.space_hard_limit_bytes, Some(30 * 1024));
        assert_eq!(exec.calls(), vec!["lfs quota -q -g nn1234k /cluster"]);
    }

    #[test]
    fn identity_query_without_quota_line() {
        let exec = Arc::new(Scripted::new().ok("lfs quota -q -u alice /cluster", "nothing here"));
        let b = Lustre::new(exec);
        assert!(matches!(
            b.quota_by_identity(IdentityKind::User, "alice", "/cluster"),
            Err(Error::BackendFormat(_))
        ));
    }

    #[test]
    fn path_query_uses_project_id() {
        let exec = Arc::new(
            Scripted::new()
                .ok("lfs project -d /cluster/projects/nn1234k", " 4321 P /cluster/projects/nn1234k")
                .ok("lfs quota -q -p 4321 /cluster", "/cluster 10 20 30 - 1 2 3 -\nsecond line"),
        );
        let b = Lustre::new(exec.clone());
        let u = b.quota_by_path("/cluster/projects/nn1234k", "/cluster").unwrap().unwrap();
        assert_eq!(u.space_used_bytes, Count::Known(10240));
        assert_eq!(exec.calls().len(), 2);
    }

    #[test]
    fn project_zero_is_unknown() {
        let exec = Arc::new(Scripted::new().ok("lfs project -d /cluster/home/alice", "    0 - /cluster/home/alice"));
        let b = Lustre::new(exec.clone());
        let u = b.quota_by_path("/cluster/home/alice", "/cluster").unwrap().unwrap();
        assert_eq!(u, Usage::unknown());
        assert_eq!(u.space_used_bytes, Count::Unknown);
        assert_eq!(u.space_soft_limit_bytes, None);
        assert_eq!(u.space_hard_limit_bytes, None);
        assert_eq!(u.inodes_soft_limit, None);
        assert_eq!(u.inodes_hard_limit, None);
        // the misleading project 0 query is never issued.
        assert_eq!(exec.calls(), vec!["lfs project -d /cluster/home/alice"]);
    }

    #[test]
    fn bad_project_id() {
        let exec = Arc::new(Scripted::new().ok("lfs project -d /x", "garbage"));
        let b = Lustre::new(exec);
        assert!(matches!(b.quota_by_path("/x", "/cluster"), Err(Error::Parse(_))));
    }
}
