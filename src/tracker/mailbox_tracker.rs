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

//! Existence and listener bookkeeping for a single mailbox.

use std::sync::Arc;

use log::{debug, warn};

use super::dispatcher::EventDispatcher;
use super::event::{Event, Listener};
use super::model::SessionId;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

/// The lifecycle half of a mailbox tracker.
///
/// A `Tracker` knows the mailbox's name, whether it still exists, and who is
/// listening to it. It does not lock anything or talk to the owning cache
/// itself; `ChangeEngine` wraps it in its lock and performs the cache
/// callbacks the return values here call for.
///
/// Once the mailbox has been deleted or found not to exist, the tracker is
/// disposed and every further mutation fails with `Error::TrackerDisposed`.
/// Listeners may still be removed.
pub struct Tracker {
    name: String,
    existing: bool,
    dispatcher: EventDispatcher,
    log_prefix: LogPrefix,
}

impl Tracker {
    pub fn new(name: String) -> Self {
        Tracker {
            log_prefix: LogPrefix::new(name.clone()),
            name,
            existing: true,
            dispatcher: EventDispatcher::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    pub fn is_existing(&self) -> bool {
        self.existing
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn listener_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// Fail with `TrackerDisposed` if this tracker has been disposed.
    pub fn check_existing(&self) -> Result<(), Error> {
        if self.existing {
            Ok(())
        } else {
            warn!(
                "{} Attempted to modify disposed mailbox tracker",
                self.log_prefix
            );
            Err(Error::TrackerDisposed)
        }
    }

    pub fn add_listener(
        &mut self,
        listener: Arc<dyn Listener>,
    ) -> Result<(), Error> {
        self.check_existing()?;
        if self.dispatcher.add_listener(listener) {
            debug!(
                "{} Listener added; now {}",
                self.log_prefix,
                self.dispatcher.len()
            );
        }
        Ok(())
    }

    /// Deregister `listener`.
    ///
    /// Returns `true` if this removal left the tracker without listeners, in
    /// which case the owning cache should be told it is unused.
    pub fn remove_listener(&mut self, listener: &Arc<dyn Listener>) -> bool {
        if !self.dispatcher.remove_listener(listener) {
            return false;
        }

        debug!(
            "{} Listener removed; now {}",
            self.log_prefix,
            self.dispatcher.len()
        );
        self.dispatcher.is_empty()
    }

    /// Mark the mailbox deleted and tell every listener.
    pub fn signal_deletion(
        &mut self,
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        self.check_existing()?;
        self.existing = false;
        debug!("{} Mailbox deleted", self.log_prefix);
        self.dispatcher.dispatch(&Event::MailboxDeleted { cause })
    }

    /// Mark the mailbox as not existing.
    ///
    /// The caller is responsible for informing the owning cache.
    pub fn not_found(&mut self) -> Result<(), Error> {
        self.check_existing()?;
        self.existing = false;
        debug!("{} Mailbox not found", self.log_prefix);
        Ok(())
    }

    /// Record that the mailbox now goes by `new_name` and tell every
    /// listener.
    pub fn signal_rename(
        &mut self,
        new_name: String,
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        self.check_existing()?;
        let old_name = std::mem::replace(&mut self.name, new_name.clone());
        debug!("{} Mailbox renamed to {}", self.log_prefix, new_name);
        self.log_prefix.set_mailbox(new_name.clone());
        self.dispatcher.dispatch(&Event::MailboxRenamed {
            old_name,
            new_name,
            cause,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::dispatcher::test::Recorder;

    #[test]
    fn last_removal_reports_unused() {
        let mut tracker = Tracker::new("INBOX".to_owned());
        let a: Arc<dyn Listener> = Recorder::new();
        let b: Arc<dyn Listener> = Recorder::new();

        tracker.add_listener(Arc::clone(&a)).unwrap();
        tracker.add_listener(Arc::clone(&a)).unwrap();
        tracker.add_listener(Arc::clone(&b)).unwrap();
        assert_eq!(2, tracker.listener_count());

        assert!(!tracker.remove_listener(&a));
        // Not registered any more, so not a transition to empty
        assert!(!tracker.remove_listener(&a));
        assert!(tracker.remove_listener(&b));
        assert!(!tracker.remove_listener(&b));
    }

    #[test]
    fn deletion_is_broadcast_and_terminal() {
        let mut tracker = Tracker::new("INBOX".to_owned());
        let recorder = Recorder::new();
        let listener: Arc<dyn Listener> = recorder.clone();
        tracker.add_listener(Arc::clone(&listener)).unwrap();

        tracker.signal_deletion(Some(SessionId(3))).unwrap();
        assert!(!tracker.is_existing());
        assert_eq!(
            vec![Event::MailboxDeleted {
                cause: Some(SessionId(3))
            }],
            recorder.take()
        );

        assert_matches!(
            Err(Error::TrackerDisposed),
            tracker.signal_deletion(None)
        );
        assert_matches!(Err(Error::TrackerDisposed), tracker.not_found());
        assert_matches!(
            Err(Error::TrackerDisposed),
            tracker.signal_rename("Archive".to_owned(), None)
        );
        assert_matches!(
            Err(Error::TrackerDisposed),
            tracker.add_listener(Recorder::new())
        );
        assert!(recorder.take().is_empty());

        // Deregistration still works so sessions can deselect
        assert!(tracker.remove_listener(&listener));
    }

    #[test]
    fn not_found_is_terminal() {
        let mut tracker = Tracker::new("Nope".to_owned());
        tracker.not_found().unwrap();
        assert!(!tracker.is_existing());
        assert_matches!(Err(Error::TrackerDisposed), tracker.not_found());
    }

    #[test]
    fn rename_updates_name() {
        let mut tracker = Tracker::new("Drafts".to_owned());
        let recorder = Recorder::new();
        tracker.add_listener(recorder.clone()).unwrap();

        tracker.signal_rename("Old Drafts".to_owned(), None).unwrap();
        assert_eq!("Old Drafts", tracker.name());
        assert_eq!("Old Drafts", tracker.log_prefix().to_string());
        assert!(tracker.is_existing());
        assert_eq!(
            vec![Event::MailboxRenamed {
                old_name: "Drafts".to_owned(),
                new_name: "Old Drafts".to_owned(),
                cause: None,
            }],
            recorder.take()
        );
    }
}
