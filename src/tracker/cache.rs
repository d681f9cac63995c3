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

//! The process-wide store of live mailbox trackers.

use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, warn};

use super::change_engine::ChangeEngine;
use super::event::Listener;
use super::model::*;
use crate::support::error::Error;
use crate::support::tracker_config::CacheConfig;

/// The callbacks an engine makes into whatever owns it.
///
/// Engines hold only a weak reference to their cache, and calls are always
/// made with the engine unlocked, so implementations may freely lock the
/// engine they are given.
pub trait MailboxCache: Send + Sync {
    /// The mailbox `name` turned out not to exist.
    fn not_found(&self, name: &str);

    /// `tracker` has lost its last listener.
    fn unused(&self, tracker: &ChangeEngine);
}

/// Maps mailbox names to the `ChangeEngine` shared by every session with
/// that mailbox selected.
///
/// Lock order is cache first, then engine.
pub struct TrackerCache {
    this: Weak<TrackerCache>,
    config: CacheConfig,
    trackers: Mutex<HashMap<String, Arc<ChangeEngine>>>,
}

impl TrackerCache {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| TrackerCache {
            this: this.clone(),
            config,
            trackers: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ChangeEngine>>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, name: &str, last_uid: Option<Uid>) -> Arc<ChangeEngine> {
        let cache: Weak<dyn MailboxCache> = self.this.clone();
        Arc::new(ChangeEngine::with_cache(name.to_owned(), last_uid, cache))
    }

    fn get_or_create_locked(
        &self,
        trackers: &mut HashMap<String, Arc<ChangeEngine>>,
        name: &str,
        last_uid: Option<Uid>,
    ) -> Arc<ChangeEngine> {
        if let Some(engine) = trackers.get(name) {
            // A deleted mailbox may have been recreated under the same name.
            if engine.is_existing() {
                return Arc::clone(engine);
            }
        }

        debug!("{} Creating tracker", name);
        let engine = self.create(name, last_uid);
        trackers.insert(name.to_owned(), Arc::clone(&engine));
        engine
    }

    /// Return the engine for `name`, creating it if needed.
    ///
    /// The engine may be evicted before a listener is added to it, in which
    /// case `ChangeEngine::add_listener()` fails with `TrackerEvicted`.
    /// Sessions should attach through `subscribe()` instead.
    ///
    /// `last_uid` is the greatest UID currently in the mailbox. It is only
    /// used if a new engine is created, and becomes the baseline below which
    /// messages are never reported as new.
    pub fn get_or_create(
        &self,
        name: &str,
        last_uid: Option<Uid>,
    ) -> Arc<ChangeEngine> {
        let mut trackers = self.lock();
        self.get_or_create_locked(&mut trackers, name, last_uid)
    }

    /// Get or create the engine for `name` and register `listener` on it,
    /// atomically with respect to eviction.
    pub fn subscribe(
        &self,
        name: &str,
        last_uid: Option<Uid>,
        listener: Arc<dyn Listener>,
    ) -> Result<Arc<ChangeEngine>, Error> {
        let mut trackers = self.lock();
        let engine = self.get_or_create_locked(&mut trackers, name, last_uid);
        engine.add_listener(listener)?;
        Ok(engine)
    }

    /// Return the engine for `name` if one is cached.
    pub fn get(&self, name: &str) -> Option<Arc<ChangeEngine>> {
        self.lock().get(name).cloned()
    }

    /// Rename the mailbox `old_name` to `new_name`, moving its engine (if
    /// any) to the new key and notifying its listeners.
    ///
    /// Fails with `NameInUse`, changing nothing, if a live engine is already
    /// cached under `new_name`.
    ///
    /// Returns whether an engine was cached under `old_name`.
    pub fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        cause: Option<SessionId>,
    ) -> Result<bool, Error> {
        let mut trackers = self.lock();
        if !trackers.contains_key(old_name) {
            return Ok(false);
        }

        if trackers.get(new_name).map_or(false, |e| e.is_existing()) {
            warn!(
                "{} Refusing to rename {} onto a live tracker",
                new_name, old_name
            );
            return Err(Error::NameInUse);
        }

        let engine = match trackers.remove(old_name) {
            Some(engine) => engine,
            None => return Ok(false),
        };

        let result = engine.signal_rename(new_name.to_owned(), cause);
        if engine.is_existing() {
            trackers.insert(new_name.to_owned(), engine);
        }

        result.map(|()| true)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl MailboxCache for TrackerCache {
    fn not_found(&self, name: &str) {
        let mut trackers = self.lock();
        if trackers.get(name).map_or(false, |e| !e.is_existing()) {
            debug!("{} Evicting tracker for missing mailbox", name);
            trackers.remove(name);
        }
    }

    fn unused(&self, tracker: &ChangeEngine) {
        if !self.config.evict_unused {
            return;
        }

        let mut trackers = self.lock();
        let name = tracker.name();
        let is_cached = trackers
            .get(&name)
            .map_or(false, |e| ptr::eq(Arc::as_ptr(e), tracker));
        // Someone may have subscribed between the last removal and now.
        if is_cached && tracker.evict_if_unused() {
            debug!("{} Evicting unused tracker", name);
            trackers.remove(&name);
        }
    }
}
