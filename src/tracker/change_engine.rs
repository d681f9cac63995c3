//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Uidtrack.
//
// Uidtrack is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Uidtrack is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Uidtrack. If not, see <http://www.gnu.org/licenses/>.

//! The diff engine which turns scans of a mailbox into change events.
//!
//! Each session with the mailbox selected periodically scans some UID range
//! of the underlying store and passes the results to `ChangeEngine::found()`.
//! The engine compares them with what it last knew about that range and
//! broadcasts whatever changed:
//!
//! - UIDs it did not know about become `Added`, unless they are at or below
//!   the highest UID known when the engine was created. Such messages were
//!   already part of the mailbox every session saw at selection time.
//!
//! - UIDs it knew about inside the range which the scan did not return
//!   become `Expunged`.
//!
//! - UIDs whose flags differ from the cached flags become `FlagsUpdated`.
//!
//! The engine's lock is the single point of serialisation for a mailbox.
//! Listener registration, diffing, and broadcasting all happen under it, so
//! no listener can observe events out of order with respect to the cache or
//! miss events because it registered concurrently with a scan.
//!
//! Lock order: an owning `TrackerCache` may lock an engine while holding its
//! own lock. The engine therefore never calls into the cache while locked.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, trace, warn};

use super::cache::MailboxCache;
use super::event::{Event, Listener};
use super::mailbox_tracker::Tracker;
use super::model::*;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

/// Tracks the UIDs and flags of one mailbox on behalf of all sessions that
/// have it selected.
pub struct ChangeEngine {
    state: Mutex<EngineState>,
    /// The cache this engine lives in, if any. Only used to tell the cache
    /// when the engine becomes evictable.
    cache: Option<Weak<dyn MailboxCache>>,
    log_prefix: LogPrefix,
}

struct EngineState {
    tracker: Tracker,

    /// Every UID believed to currently exist, with its flags if they have
    /// ever been loaded.
    messages: BTreeMap<Uid, Option<Flags>>,

    /// The greatest UID known when the engine was created.
    ///
    /// Messages at or below this are never reported as added.
    last_uid_at_start: Option<Uid>,

    /// The greatest UID ever seen. Never decreases.
    last_uid: Option<Uid>,

    /// The greatest UID up to which the mailbox has been scanned.
    last_scanned_uid: Option<Uid>,

    /// Set once the owning cache has dropped this engine. No listener may be
    /// added afterwards, since it would never hear from other sessions.
    evicted: bool,
}

impl ChangeEngine {
    /// Create a free-standing engine for the mailbox `name`, whose greatest
    /// UID is currently `last_uid`.
    pub fn new(name: String, last_uid: Option<Uid>) -> Self {
        Self::create(name, last_uid, None)
    }

    /// Create an engine which notifies `cache` of its lifecycle changes.
    pub fn with_cache(
        name: String,
        last_uid: Option<Uid>,
        cache: Weak<dyn MailboxCache>,
    ) -> Self {
        Self::create(name, last_uid, Some(cache))
    }

    fn create(
        name: String,
        last_uid: Option<Uid>,
        cache: Option<Weak<dyn MailboxCache>>,
    ) -> Self {
        let tracker = Tracker::new(name);
        let log_prefix = tracker.log_prefix().clone();
        debug!("{} Tracking changes from UID {:?}", log_prefix, last_uid);

        ChangeEngine {
            state: Mutex::new(EngineState {
                tracker,
                messages: BTreeMap::new(),
                last_uid_at_start: last_uid,
                last_uid,
                last_scanned_uid: None,
                evicted: false,
            }),
            cache,
            log_prefix,
        }
    }

    // Poisoning is ignored; state is always committed before listeners run.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owning_cache(&self) -> Option<Arc<dyn MailboxCache>> {
        self.cache.as_ref().and_then(Weak::upgrade)
    }

    /// Reconcile the results of scanning `range` with the cache.
    ///
    /// `results` must describe every message in `range`; `None` entries are
    /// gaps and are ignored. `cause` is the session that performed the scan,
    /// and is attached to the resulting events.
    ///
    /// The batch is rejected without effect if it contains a UID outside
    /// `range` or the same UID twice. An error from a listener is returned
    /// after the engine state has been updated.
    pub fn found(
        &self,
        range: Range,
        results: &[Option<ScanResult>],
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        state.tracker.check_existing()?;
        if let Err(e) = validate(range, results) {
            warn!("{} Rejected scan of {:?}: {}", self.log_prefix, range, e);
            return Err(e);
        }

        let events = state.diff(range, results, cause);
        trace!(
            "{} Scan of {:?} produced {} events",
            self.log_prefix,
            range,
            events.len()
        );
        state.tracker.dispatcher().dispatch_all(&events)
    }

    /// Reconcile a single scanned message.
    ///
    /// Equivalent to `found()` on a range covering just that message.
    pub fn found_one(
        &self,
        result: ScanResult,
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        let range = Range::single(result.uid);
        self.found(range, &[Some(result)], cause)
    }

    /// Note that the mailbox is known to contain UIDs up to `uid` without
    /// scanning it.
    pub fn found_last_uid(&self, uid: Uid) -> Result<(), Error> {
        let mut state = self.lock();
        state.tracker.check_existing()?;
        if Some(uid) > state.last_uid {
            state.last_uid = Some(uid);
        }
        Ok(())
    }

    /// Directly record the expunction of `uids`.
    ///
    /// UIDs not currently cached are ignored.
    pub fn expunged(
        &self,
        uids: &[Uid],
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        state.tracker.check_existing()?;

        let uids: BTreeSet<Uid> = uids.iter().copied().collect();
        let events = uids
            .into_iter()
            .filter(|uid| state.messages.remove(uid).is_some())
            .map(|uid| Event::Expunged { uid, cause })
            .collect::<Vec<_>>();
        state.tracker.dispatcher().dispatch_all(&events)
    }

    /// The greatest UID known to exist or have existed. Never decreases.
    pub fn last_uid(&self) -> Option<Uid> {
        self.lock().last_uid
    }

    pub fn last_uid_at_start(&self) -> Option<Uid> {
        self.lock().last_uid_at_start
    }

    pub fn last_scanned_uid(&self) -> Option<Uid> {
        self.lock().last_scanned_uid
    }

    /// Return the cached flags of `uid`.
    ///
    /// The outer `Option` is `None` if the UID is not believed to exist; the
    /// inner one is `None` if its flags have never been loaded.
    pub fn cached_flags(&self, uid: Uid) -> Option<Option<Flags>> {
        self.lock().messages.get(&uid).cloned()
    }

    /// Return every UID believed to exist, ascending.
    pub fn cached_uids(&self) -> Vec<Uid> {
        self.lock().messages.keys().copied().collect()
    }

    pub fn name(&self) -> String {
        self.lock().tracker.name().to_owned()
    }

    pub fn is_existing(&self) -> bool {
        self.lock().tracker.is_existing()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().tracker.listener_count()
    }

    /// Register `listener`.
    ///
    /// Fails with `TrackerEvicted` if the owning cache has already dropped
    /// this engine; the caller must then obtain a fresh one from the cache.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> Result<(), Error> {
        let mut state = self.lock();
        if state.evicted {
            warn!("{} Attempted to listen to evicted tracker", self.log_prefix);
            return Err(Error::TrackerEvicted);
        }
        state.tracker.add_listener(listener)
    }

    /// Mark this engine evicted if it has no listeners.
    ///
    /// Returns whether it was marked.
    pub(super) fn evict_if_unused(&self) -> bool {
        let mut state = self.lock();
        if 0 == state.tracker.listener_count() {
            state.evicted = true;
        }
        state.evicted
    }

    /// Deregister `listener`, telling the owning cache if no listeners
    /// remain.
    ///
    /// Returns whether `listener` had been registered.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool {
        let (was_registered, now_unused) = {
            let mut state = self.lock();
            let was_registered = state.tracker.dispatcher().contains(listener);
            (was_registered, state.tracker.remove_listener(listener))
        };

        if now_unused {
            if let Some(cache) = self.owning_cache() {
                cache.unused(self);
            }
        }

        was_registered
    }

    /// Mark the mailbox deleted and notify all listeners.
    pub fn signal_deletion(&self, cause: Option<SessionId>) -> Result<(), Error> {
        self.lock().tracker.signal_deletion(cause)
    }

    /// Mark the mailbox as not existing and tell the owning cache.
    pub fn not_found(&self) -> Result<(), Error> {
        let name = {
            let mut state = self.lock();
            state.tracker.not_found()?;
            state.tracker.name().to_owned()
        };

        if let Some(cache) = self.owning_cache() {
            cache.not_found(&name);
        }
        Ok(())
    }

    /// Record a rename of the mailbox and notify all listeners.
    ///
    /// Engines owned by a `TrackerCache` should be renamed through
    /// `TrackerCache::rename()` so the cache key follows.
    pub fn signal_rename(
        &self,
        new_name: String,
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        self.lock().tracker.signal_rename(new_name, cause)
    }
}

/// Reject inverted ranges and batches with UIDs outside the scanned range or repeated UIDs.
fn validate(range: Range, results: &[Option<ScanResult>]) -> Result<(), Error> {
    if let Range::Bounded(from, to) = range {
        if from > to {
            return Err(Error::InvertedRange);
        }
    }

    let mut seen = HashSet::with_capacity(results.len());
    for result in results.iter().flatten() {
        if !range.contains(result.uid) {
            return Err(Error::UidOutsideRange(result.uid));
        }
        if !seen.insert(result.uid) {
            return Err(Error::DuplicateUid(result.uid));
        }
    }

    Ok(())
}

impl EngineState {
    /// Apply a validated scan to the cache and watermarks, returning the
    /// events to broadcast, in order.
    fn diff(
        &mut self,
        range: Range,
        results: &[Option<ScanResult>],
        cause: Option<SessionId>,
    ) -> Vec<Event> {
        let mut expected = self
            .messages
            .range(range.bounds())
            .map(|(&uid, _)| uid)
            .collect::<BTreeSet<_>>();
        let mut events = Vec::new();

        for result in results.iter().flatten() {
            let uid = result.uid;
            if Some(uid) > self.last_scanned_uid {
                self.last_scanned_uid = Some(uid);
            }

            if expected.remove(&uid) {
                if let (Some(flags), Some(cached)) =
                    (result.flags.as_ref(), self.messages.get_mut(&uid))
                {
                    if cached.as_ref() != Some(flags) {
                        let previous = cached.replace(flags.clone());
                        events.push(Event::FlagsUpdated {
                            uid,
                            flags: flags.clone(),
                            previous,
                            cause,
                        });
                    }
                }
            } else {
                self.messages.insert(uid, result.flags.clone());
                if Some(uid) > self.last_uid_at_start {
                    events.push(Event::Added { uid, cause });
                }
            }
        }

        if self.last_scanned_uid > self.last_uid {
            self.last_uid = self.last_scanned_uid;
        }

        match range.upper() {
            UpperBound::Unbounded => {
                self.last_scanned_uid = self.last_uid;
            }
            UpperBound::Bounded(to) if Some(to) >= self.last_uid => {
                self.last_scanned_uid = self.last_uid;
            }
            UpperBound::Bounded(to) if Some(to) > self.last_scanned_uid => {
                self.last_scanned_uid = Some(to);
            }
            UpperBound::Bounded(_) => (),
        }

        for uid in expected {
            self.messages.remove(&uid);
            events.push(Event::Expunged { uid, cause });
        }

        events
    }
}
