use std::ffi::{CStr, CString};
use std::io;

use libc::{c_char, c_int, getgrgid_r, getgrouplist, getpwnam_r, getpwuid_r};

use hpc_quota::resolve::GroupLookup;
use hpc_quota::{CurrentIdentity, Error};

// getpw*_r / getgr*_r return ERANGE until the buffer is big enough.
const BUF_START: usize = 1024;
const BUF_MAX: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub uid:  u32,
    pub gid:  u32,
}

unsafe fn cptr_to_string(c: *const c_char) -> String {
    CStr::from_ptr(c).to_string_lossy().into_owned()
}

unsafe fn to_user(pwd: &libc::passwd) -> User {
    User {
        name: cptr_to_string(pwd.pw_name),
        uid:  pwd.pw_uid,
        gid:  pwd.pw_gid,
    }
}

// Call a reentrant passwd/group lookup, growing the buffer on ERANGE.
// Returns Ok(None) if the entry does not exist.
fn lookup<T, F>(mut call: F) -> io::Result<Option<T>>
where F: FnMut(&mut [c_char]) -> (c_int, Option<T>) {
    let mut size = BUF_START;
    loop {
        let mut buf = vec![0 as c_char; size];
        let (ret, found) = call(&mut buf);
        match ret {
            0 => return Ok(found),
            libc::ERANGE if size < BUF_MAX => size *= 2,
            libc::ENOENT | libc::ESRCH => return Ok(None),
            _ => return Err(io::Error::from_raw_os_error(ret)),
        }
    }
}

impl User {
    pub fn by_name(name: &str) -> io::Result<Option<User>> {
        let cname = match CString::new(name) {
            Ok(un) => un,
            Err(_) => return Ok(None),
        };
        lookup(|buf| {
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let ret = unsafe {
                getpwnam_r(
                    cname.as_ptr(),
                    &mut pwd as *mut _,
                    buf.as_mut_ptr(),
                    buf.len() as libc::size_t,
                    &mut result as *mut _,
                )
            };
            let user = if ret == 0 && !result.is_null() {
                Some(unsafe { to_user(&pwd) })
            } else {
                None
            };
            (ret, user)
        })
    }

    pub fn by_uid(uid: u32) -> io::Result<Option<User>> {
        lookup(|buf| {
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let ret = unsafe {
                getpwuid_r(
                    uid,
                    &mut pwd as *mut _,
                    buf.as_mut_ptr(),
                    buf.len() as libc::size_t,
                    &mut result as *mut _,
                )
            };
            let user = if ret == 0 && !result.is_null() {
                Some(unsafe { to_user(&pwd) })
            } else {
                None
            };
            (ret, user)
        })
    }

    /// Names of all groups this user is a member of, primary group first.
    pub fn groups(&self) -> io::Result<Vec<String>> {
        let cname = CString::new(self.name.as_str())
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;

        let mut gids: Vec<libc::gid_t> = vec![0; 64];
        loop {
            let mut ngroups = gids.len() as c_int;
            let ret = unsafe { getgrouplist(cname.as_ptr(), self.gid, gids.as_mut_ptr(), &mut ngroups) };
            if ret >= 0 {
                gids.truncate(ngroups as usize);
                break;
            }
            // too small. ngroups now holds the needed size.
            let want = std::cmp::max(ngroups as usize, gids.len() * 2);
            gids.resize(want, 0);
        }

        let mut names = Vec::with_capacity(gids.len());
        for gid in gids {
            match group_name(gid)? {
                Some(name) => names.push(name),
                None => debug!("unixuser: gid {} has no name", gid),
            }
        }
        Ok(names)
    }
}

fn group_name(gid: libc::gid_t) -> io::Result<Option<String>> {
    lookup(|buf| {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();
        let ret = unsafe {
            getgrgid_r(
                gid,
                &mut grp as *mut _,
                buf.as_mut_ptr(),
                buf.len() as libc::size_t,
                &mut result as *mut _,
            )
        };
        let name = if ret == 0 && !result.is_null() {
            Some(unsafe { cptr_to_string(grp.gr_name) })
        } else {
            None
        };
        (ret, name)
    })
}

/// Group membership from the system user database.
pub struct UnixGroups;

impl GroupLookup for UnixGroups {
    fn groups_of(&self, account: &str) -> hpc_quota::Result<Vec<String>> {
        let user = User::by_name(account)
            .map_err(|e| Error::Identity(format!("{}: {}", account, e)))?
            .ok_or_else(|| Error::Identity(format!("user {} not found", account)))?;
        user.groups()
            .map_err(|e| Error::Identity(format!("groups of {}: {}", account, e)))
    }
}

/// The user running this process, and their groups.
pub fn current_identity() -> hpc_quota::Result<CurrentIdentity> {
    let uid = unsafe { libc::getuid() };
    let user = User::by_uid(uid)
        .map_err(|e| Error::Identity(format!("uid {}: {}", uid, e)))?
        .ok_or_else(|| Error::Identity(format!("uid {} has no passwd entry", uid)))?;
    let groups = user
        .groups()
        .map_err(|e| Error::Identity(format!("groups of {}: {}", user.name, e)))?;
    Ok(CurrentIdentity {
        user: user.name,
        groups,
    })
}

/// Short hostname, without the domain.
pub fn hostname() -> io::Result<String> {
    let mut buf = [0 as c_char; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len() as libc::size_t) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    // not guaranteed to be terminated if truncated.
    buf[buf.len() - 1] = 0;
    let full = unsafe { cptr_to_string(buf.as_ptr()) };
    Ok(full.split('.').next().unwrap_or("").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_by_uid_and_name() {
        let root = User::by_uid(0).unwrap().unwrap();
        assert_eq!(root.uid, 0);
        let again = User::by_name(&root.name).unwrap().unwrap();
        assert_eq!(again.uid, 0);
    }

    #[test]
    fn unknown_user() {
        assert!(User::by_name("no-such-user-dusage-test").unwrap().is_none());
        assert!(User::by_name("nul\0byte").unwrap().is_none());
        assert!(matches!(
            UnixGroups.groups_of("no-such-user-dusage-test"),
            Err(Error::Identity(_))
        ));
    }

    #[test]
    fn root_groups_include_primary() {
        let root = User::by_uid(0).unwrap().unwrap();
        let groups = root.groups().unwrap();
        let primary = group_name(root.gid).unwrap().unwrap();
        assert!(groups.contains(&primary));
    }

    #[test]
    fn current_user() {
        let me = current_identity().unwrap();
        assert!(!me.user.is_empty());
        assert!(!me.groups.is_empty());
    }

    #[test]
    fn short_hostname() {
        let h = hostname().unwrap();
        assert!(!h.contains('.'));
    }
}
