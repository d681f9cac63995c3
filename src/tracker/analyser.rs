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

//! Per-session accumulation of mailbox changes.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use super::event::Listener;
use super::model::*;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::tracker_config::AnalyserConfig;

/// Collects the changes one session needs to report to its client.
///
/// The analyser is registered as a listener on the selected mailbox's engine.
/// After each command, the protocol layer asks it whether the mailbox size
/// changed (calling for `EXISTS`/`EXPUNGE` responses) and which UIDs need
/// unsolicited `FETCH` responses for their flags, then calls `reset()`.
///
/// Rules:
///
/// - Additions and expunges always mark the size as changed, even when this
///   session caused them.
///
/// - A flag change that differs from the previous flags only in `\Recent` is
///   never recorded.
///
/// - With `silent_flag_changes` set, flag changes caused by this session are
///   not recorded. Changes from other sessions always are.
pub struct SessionAnalyser {
    session: SessionId,
    config: AnalyserConfig,
    log_prefix: LogPrefix,
    state: Mutex<AnalyserState>,
}

#[derive(Default)]
struct AnalyserState {
    size_changed: bool,
    flag_update_uids: BTreeSet<Uid>,
}

impl SessionAnalyser {
    /// Create an analyser for `session`, which has `mailbox` selected.
    pub fn new(
        session: SessionId,
        mailbox: &str,
        config: AnalyserConfig,
    ) -> Arc<Self> {
        Arc::new(SessionAnalyser {
            session,
            config,
            log_prefix: LogPrefix::for_session(mailbox.to_owned(), session),
            state: Mutex::new(AnalyserState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AnalyserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Whether any message was added or expunged since the last reset.
    pub fn is_size_changed(&self) -> bool {
        self.lock().size_changed
    }

    /// The UIDs whose flags changed since the last reset, ascending and
    /// without duplicates.
    ///
    /// The sequence is a snapshot; calling this again restarts it.
    pub fn flag_update_uids(&self) -> impl Iterator<Item = Uid> {
        self.lock().flag_update_uids.clone().into_iter()
    }

    /// Whether anything has been recorded since the last reset.
    pub fn is_dirty(&self) -> bool {
        let state = self.lock();
        state.size_changed || !state.flag_update_uids.is_empty()
    }

    /// Forget everything recorded so far.
    ///
    /// The analyser stays registered.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.size_changed = false;
        state.flag_update_uids.clear();
    }

    fn size_changed(&self) {
        self.lock().size_changed = true;
    }
}

impl Listener for SessionAnalyser {
    fn added(&self, uid: Uid, _cause: Option<SessionId>) -> Result<(), Error> {
        trace!("{} {:?} added", self.log_prefix, uid);
        self.size_changed();
        Ok(())
    }

    fn expunged(
        &self,
        uid: Uid,
        _cause: Option<SessionId>,
    ) -> Result<(), Error> {
        trace!("{} {:?} expunged", self.log_prefix, uid);
        self.size_changed();
        Ok(())
    }

    fn flags_updated(
        &self,
        uid: Uid,
        flags: &Flags,
        previous: Option<&Flags>,
        cause: Option<SessionId>,
    ) -> Result<(), Error> {
        let no_flags = Flags::new();
        if flags.differs_only_in_recent(previous.unwrap_or(&no_flags)) {
            return Ok(());
        }

        if self.config.silent_flag_changes && Some(self.session) == cause {
            trace!("{} Silent flag change on {:?}", self.log_prefix, uid);
            return Ok(());
        }

        trace!("{} {:?} flags now {}", self.log_prefix, uid, flags);
        self.lock().flag_update_uids.insert(uid);
        Ok(())
    }

    fn mailbox_deleted(&self, _cause: Option<SessionId>) -> Result<(), Error> {
        debug!("{} Selected mailbox deleted", self.log_prefix);
        Ok(())
    }

    fn mailbox_renamed(
        &self,
        old_name: &str,
        new_name: &str,
        _cause: Option<SessionId>,
    ) -> Result<(), Error> {
        debug!(
            "{} Selected mailbox renamed from {} to {}",
            self.log_prefix, old_name, new_name
        );
        self.log_prefix.set_mailbox(new_name.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracker::event::Event;

    fn analyser(session: u64, silent: bool) -> Arc<SessionAnalyser> {
        SessionAnalyser::new(
            SessionId(session),
            "INBOX",
            AnalyserConfig {
                silent_flag_changes: silent,
            },
        )
    }

    fn flags(list: &[Flag]) -> Flags {
        list.iter().cloned().collect()
    }

    fn flags_updated(uid: u64, f: &[Flag], cause: u64) -> Event {
        Event::FlagsUpdated {
            uid: Uid::u(uid),
            flags: flags(f),
            previous: Some(Flags::new()),
            cause: Some(SessionId(cause)),
        }
    }

    fn uids(a: &SessionAnalyser) -> Vec<u64> {
        a.flag_update_uids().map(|u| u.0.get()).collect()
    }

    #[test]
    fn size_changes_are_never_suppressed() {
        let a = analyser(99, true);
        assert!(!a.is_size_changed());
        assert!(!a.is_dirty());

        a.event(&Event::Added {
            uid: Uid::u(1),
            cause: Some(SessionId(99)),
        })
        .unwrap();
        assert!(a.is_size_changed());
        assert!(a.is_dirty());

        a.reset();
        a.event(&Event::Expunged {
            uid: Uid::u(1),
            cause: Some(SessionId(99)),
        })
        .unwrap();
        assert!(a.is_size_changed());
        assert!(uids(&a).is_empty());
    }

    #[test]
    fn foreign_flag_change_recorded() {
        let a = analyser(99, false);
        a.event(&flags_updated(900, &[Flag::Answered], 11)).unwrap();
        assert_eq!(vec![900], uids(&a));
        assert!(!a.is_size_changed());
    }

    #[test]
    fn own_flag_change_recorded_without_silent() {
        let a = analyser(99, false);
        a.event(&flags_updated(900, &[Flag::Answered], 99)).unwrap();
        assert_eq!(vec![900], uids(&a));
    }

    #[test]
    fn own_flag_change_suppressed_when_silent() {
        let a = analyser(99, true);
        a.event(&flags_updated(900, &[Flag::Answered], 99)).unwrap();
        assert!(uids(&a).is_empty());
        assert!(!a.is_dirty());

        a.event(&flags_updated(901, &[Flag::Answered], 11)).unwrap();
        assert_eq!(vec![901], uids(&a));
    }

    #[test]
    fn recent_only_changes_are_discarded() {
        for &silent in &[false, true] {
            let a = analyser(99, silent);
            a.event(&Event::FlagsUpdated {
                uid: Uid::u(5),
                flags: flags(&[Flag::Seen, Flag::Recent]),
                previous: Some(flags(&[Flag::Seen])),
                cause: Some(SessionId(11)),
            })
            .unwrap();
            a.event(&Event::FlagsUpdated {
                uid: Uid::u(6),
                flags: flags(&[Flag::Recent]),
                previous: None,
                cause: None,
            })
            .unwrap();
            assert!(uids(&a).is_empty());
            assert!(!a.is_dirty());
        }
    }

    #[test]
    fn flag_uids_are_sorted_and_deduplicated() {
        let a = analyser(1, false);
        for &uid in &[7, 3, 7, 5, 3] {
            a.event(&flags_updated(uid, &[Flag::Seen], 2)).unwrap();
        }
        assert_eq!(vec![3, 5, 7], uids(&a));
        // Restartable
        assert_eq!(vec![3, 5, 7], uids(&a));
    }

    #[test]
    fn reset_clears_everything() {
        let a = analyser(1, false);
        a.event(&Event::Added {
            uid: Uid::u(1),
            cause: None,
        })
        .unwrap();
        a.event(&flags_updated(1, &[Flag::Seen], 2)).unwrap();
        assert!(a.is_dirty());

        a.reset();
        assert!(!a.is_size_changed());
        assert!(uids(&a).is_empty());
        assert!(!a.is_dirty());

        a.reset();
        assert!(!a.is_dirty());
    }

    #[test]
    fn lifecycle_events_are_not_accumulated() {
        let a = analyser(1, false);
        a.event(&Event::MailboxRenamed {
            old_name: "A".to_owned(),
            new_name: "B".to_owned(),
            cause: None,
        })
        .unwrap();
        a.event(&Event::MailboxDeleted { cause: None }).unwrap();
        assert!(!a.is_dirty());
        assert_eq!("B[session=1]", a.log_prefix.to_string());
    }
}
