//! Replay suppression cache (§4.3). Answers "have I decoded this
//! credential before?" for a fingerprint (the credential's full MAC
//! tag) with an absolute expiry time attached to each entry.
//!
//! `probe_and_insert` is atomic: lookup and insertion happen under one
//! lock, so two concurrent decodes of the same credential can never
//! both observe `Fresh` (§8 property 8, concurrency safety). A single
//! `parking_lot::Mutex` covers both that check and purge.

use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;

use crate::{cfg::defaults::REPLAY_PURGE_TIMER, error::MungeError};

/// A credential's identity in the cache: its MAC tag.
pub type Fingerprint = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// Committed replay entry: this fingerprint has been accepted.
    Committed,
    /// Outstanding-transaction token: accepted provisionally, pending
    /// the worker confirming the reply reached the client.
    Reserved,
}

/// Outcome of [`ReplayCache::probe_and_insert`] and
/// [`ReplayCache::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Not seen before; now recorded.
    Fresh,
    /// Already decoded (or reserved, and retry is not permitted).
    Replay,
}

struct Slot {
    state: Entry,
    expiry: u32,
}

/// A time-bounded set of fingerprints, purged periodically.
pub struct ReplayCache {
    entries: Mutex<HashMap<Fingerprint, Slot>>,
    /// Soft ceiling; `0` means unbounded. Overflow rejects new
    /// insertions with `Snafu` rather than evicting older entries,
    /// since forgetting an entry would reopen a replay window.
    soft_ceiling: usize,
}

impl ReplayCache {
    pub fn new(soft_ceiling: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            soft_ceiling,
        }
    }

    fn now() -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    /// Atomic lookup-and-insert. On `Fresh`, the fingerprint is recorded
    /// as committed immediately (no retry accommodation).
    pub fn probe_and_insert(
        &self,
        fp: &[u8],
        expiry: u32,
    ) -> Result<ProbeOutcome, MungeError> {
        let mut guard = self.entries.lock();
        if let Some(slot) = guard.get(fp) {
            if slot.expiry > Self::now() {
                return Ok(ProbeOutcome::Replay);
            }
        }
        if self.soft_ceiling > 0 && guard.len() >= self.soft_ceiling && !guard.contains_key(fp) {
            return Err(MungeError::NoMemory);
        }
        guard.insert(
            fp.to_vec(),
            Slot {
                state: Entry::Committed,
                expiry,
            },
        );
        Ok(ProbeOutcome::Fresh)
    }

    /// Reserve a fingerprint as an outstanding transaction (§9 option b).
    /// A reservation behaves like a committed entry to every *other*
    /// caller, but the same retrying caller may be allowed to pass again
    /// via [`ReplayCache::retry`] before [`ReplayCache::commit`] is called.
    pub fn reserve(&self, fp: &[u8], expiry: u32) -> Result<ProbeOutcome, MungeError> {
        let mut guard = self.entries.lock();
        if let Some(slot) = guard.get(fp) {
            if slot.expiry > Self::now() {
                return Ok(ProbeOutcome::Replay);
            }
        }
        if self.soft_ceiling > 0 && guard.len() >= self.soft_ceiling && !guard.contains_key(fp) {
            return Err(MungeError::NoMemory);
        }
        guard.insert(
            fp.to_vec(),
            Slot {
                state: Entry::Reserved,
                expiry,
            },
        );
        Ok(ProbeOutcome::Fresh)
    }

    /// Probe-and-reserve for a decode whose caller set the "retry" bit
    /// (§4.2, §9 option b). A fingerprint that is still only reserved
    /// (never committed) is let through again — the reply from the
    /// first attempt presumably never reached the client. A fingerprint
    /// that is absent, or whose previous reservation/commit has expired,
    /// is reserved fresh. Only a *committed*, unexpired entry is a real
    /// replay.
    pub fn retry(&self, fp: &[u8], expiry: u32) -> Result<ProbeOutcome, MungeError> {
        let mut guard = self.entries.lock();
        match guard.get(fp) {
            Some(slot) if slot.expiry > Self::now() => {
                return Ok(match slot.state {
                    Entry::Reserved => ProbeOutcome::Fresh,
                    Entry::Committed => ProbeOutcome::Replay,
                });
            }
            _ => {}
        }
        if self.soft_ceiling > 0 && guard.len() >= self.soft_ceiling && !guard.contains_key(fp) {
            return Err(MungeError::NoMemory);
        }
        guard.insert(
            fp.to_vec(),
            Slot {
                state: Entry::Reserved,
                expiry,
            },
        );
        Ok(ProbeOutcome::Fresh)
    }

    /// Turn a reservation into a permanent replay entry, once the reply
    /// carrying `Success` is known to have reached the client.
    pub fn commit(&self, fp: &[u8]) {
        let mut guard = self.entries.lock();
        if let Some(slot) = guard.get_mut(fp) {
            slot.state = Entry::Committed;
        }
    }

    /// Remove every entry whose expiry has passed, in bounded-size
    /// chunks so one purge sweep cannot stall a request worker.
    pub fn purge(&self, chunk_size: usize) {
        let now = Self::now();
        let mut guard = self.entries.lock();
        let expired: Vec<Fingerprint> = guard
            .iter()
            .filter(|(_, slot)| slot.expiry <= now)
            .take(chunk_size.max(1))
            .map(|(fp, _)| fp.clone())
            .collect();
        for fp in expired {
            guard.remove(&fp);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs [`ReplayCache::purge`] on a fixed interval until `cancel` fires.
pub async fn run_purge_task(cache: std::sync::Arc<ReplayCache>, cancel: tokio_util::sync::CancellationToken) {
    let mut ticker = tokio::time::interval(REPLAY_PURGE_TIMER);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => cache.purge(1024),
        }
    }
}
