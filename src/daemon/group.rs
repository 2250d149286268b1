//! Group database snapshot (§4.6, §5): a GID -> member-UID mapping
//! rebuilt off the request path and swapped in atomically via
//! `arc_swap`, so a multi-second refresh never blocks a request worker.

use std::collections::{HashMap, HashSet};

use arc_swap::ArcSwap;

/// A point-in-time view of `/etc/group` (or whatever NSS backs it).
#[derive(Debug, Default)]
pub struct GroupSnapshot {
    members: HashMap<u32, HashSet<u32>>,
}

impl GroupSnapshot {
    /// `true` if `uid` is a member of `gid` per this snapshot.
    pub fn is_member(&self, gid: u32, uid: u32) -> bool {
        self.members.get(&gid).is_some_and(|uids| uids.contains(&uid))
    }

    /// Rebuild from the system group database.
    ///
    /// # Safety
    /// `getgrent`/`setgrent`/`endgrent` operate on libc's thread-unsafe
    /// global iterator state; callers must serialize refreshes (the
    /// group-refresh timer runs this off the request path on its own,
    /// single background task, so no concurrent caller exists).
    pub fn rebuild() -> Self {
        let mut members: HashMap<u32, HashSet<u32>> = HashMap::new();
        // SAFETY: setgrent/getgrent/endgrent form one sequential,
        // single-threaded scan of the group database; no pointer
        // returned by getgrent is retained past this function.
        unsafe {
            libc::setgrent();
            loop {
                let entry = libc::getgrent();
                if entry.is_null() {
                    break;
                }
                let gid = (*entry).gr_gid;
                let mut uids = HashSet::new();
                let mut cursor = (*entry).gr_mem;
                while !(*cursor).is_null() {
                    if let Ok(name) = std::ffi::CStr::from_ptr(*cursor).to_str() {
                        if let Some(uid) = uid_for_name(name) {
                            uids.insert(uid);
                        }
                    }
                    cursor = cursor.add(1);
                }
                members.entry(gid).or_default().extend(uids);
            }
            libc::endgrent();
        }
        Self { members }
    }
}

/// Resolve a username to a UID via `getpwnam`.
///
/// # Safety
/// `name` is a short-lived, valid UTF-8 string converted to a
/// NUL-terminated `CString` for the duration of the call; the returned
/// pointer is read immediately and never retained.
fn uid_for_name(name: &str) -> Option<u32> {
    let c_name = std::ffi::CString::new(name).ok()?;
    // SAFETY: c_name is NUL-terminated and valid for the duration of the call.
    let passwd = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if passwd.is_null() {
        return None;
    }
    // SAFETY: passwd is a non-null pointer returned by getpwnam, valid
    // until the next call into the (single-threaded) passwd database.
    Some(unsafe { (*passwd).pw_uid })
}

/// Shared, atomically-swappable handle to the current snapshot.
pub type SharedSnapshot = ArcSwap<GroupSnapshot>;

pub fn new_shared() -> SharedSnapshot {
    ArcSwap::from_pointee(GroupSnapshot::rebuild())
}
