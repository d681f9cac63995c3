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

//! Change events and the capability that consumes them.

use super::model::*;
use crate::support::error::Error;

/// A single change to a tracked mailbox.
///
/// `cause` identifies the session whose action produced the event, if known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A message not previously known to exist has been found.
    Added { uid: Uid, cause: Option<SessionId> },
    /// A message has been removed from the mailbox.
    Expunged { uid: Uid, cause: Option<SessionId> },
    /// The flags on a message have changed.
    ///
    /// `previous` is the last flag set the engine knew for the message, or
    /// `None` if it had never loaded the flags.
    FlagsUpdated {
        uid: Uid,
        flags: Flags,
        previous: Option<Flags>,
        cause: Option<SessionId>,
    },
    /// The mailbox has been deleted. No further events follow.
    MailboxDeleted { cause: Option<SessionId> },
    /// The mailbox has been renamed.
    MailboxRenamed {
        old_name: String,
        new_name: String,
        cause: Option<SessionId>,
    },
}

/// Something that wants to know about changes to a mailbox.
///
/// Listeners are invoked synchronously while the mailbox's engine is locked.
/// Implementations must therefore do only trivial bookkeeping, and must never
/// call back into the engine that is notifying them.
///
/// Returning an error aborts the broadcast; the error is passed on to
/// whoever triggered it.
pub trait Listener: Send + Sync {
    fn added(&self, _uid: Uid, _cause: Option<SessionId>) -> Result<(), Error> {
        Ok(())
    }

    fn expunged(
        &self,
        _uid: Uid,
        _cause: Option<SessionId>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn flags_updated(
        &self,
        _uid: Uid,
        _flags: &Flags,
        _previous: Option<&Flags>,
        _cause: Option<SessionId>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn mailbox_deleted(&self, _cause: Option<SessionId>) -> Result<(), Error> {
        Ok(())
    }

    fn mailbox_renamed(
        &self,
        _old_name: &str,
        _new_name: &str,
        _cause: Option<SessionId>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Receive an arbitrary event.
    ///
    /// The default implementation routes the event to the method for its
    /// kind.
    fn event(&self, event: &Event) -> Result<(), Error> {
        match *event {
            Event::Added { uid, cause } => self.added(uid, cause),
            Event::Expunged { uid, cause } => self.expunged(uid, cause),
            Event::FlagsUpdated {
                uid,
                ref flags,
                ref previous,
                cause,
            } => self.flags_updated(uid, flags, previous.as_ref(), cause),
            Event::MailboxDeleted { cause } => self.mailbox_deleted(cause),
            Event::MailboxRenamed {
                ref old_name,
                ref new_name,
                cause,
            } => self.mailbox_renamed(old_name, new_name, cause),
        }
    }
}
