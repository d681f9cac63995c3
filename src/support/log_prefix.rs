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

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::tracker::model::SessionId;

/// Tracks text that should be included in at the start of every log statement.
///
/// Clones of a `LogPrefix` share the same underlying data, so a mailbox
/// rename is visible to every holder at once.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    mailbox: String,
    session: Option<SessionId>,
}

impl LogPrefix {
    pub fn new(mailbox: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mailbox: sanitise(mailbox),
                session: None,
            })),
        }
    }

    pub fn for_session(mailbox: String, session: SessionId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mailbox: sanitise(mailbox),
                session: Some(session),
            })),
        }
    }

    pub fn set_mailbox(&self, mailbox: String) {
        self.lock().mailbox = sanitise(mailbox);
    }

    // Poisoning is ignored; the data is only ever used for display.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.lock();
        if inner.mailbox.is_empty() {
            write!(f, "-")?;
        } else {
            write!(f, "{}", inner.mailbox)?;
        }

        if let Some(session) = inner.session {
            write!(f, "[session={session}]")?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}
