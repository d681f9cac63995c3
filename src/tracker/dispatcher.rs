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

//! Fan-out of events to registered listeners.

use std::sync::Arc;

use log::trace;

use super::event::{Event, Listener};
use crate::support::error::Error;

/// The set of listeners on one mailbox, in registration order.
///
/// Listeners are identified by the address of their shared allocation, so
/// the same `Arc` registered twice is only notified once.
///
/// This does no locking of its own; it lives inside the engine's lock.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn Listener>>,
}

fn same_listener(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
    // Compare data pointers only; vtable pointers for the same type are not
    // guaranteed to be unique.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`.
    ///
    /// Returns whether it was newly added.
    pub fn add_listener(&mut self, listener: Arc<dyn Listener>) -> bool {
        if self.contains(&listener) {
            false
        } else {
            self.listeners.push(listener);
            true
        }
    }

    /// Deregister `listener`.
    ///
    /// Returns whether it had been registered.
    pub fn remove_listener(&mut self, listener: &Arc<dyn Listener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        before != self.listeners.len()
    }

    pub fn contains(&self, listener: &Arc<dyn Listener>) -> bool {
        self.listeners.iter().any(|l| same_listener(l, listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, in registration order.
    ///
    /// The first listener failure stops delivery and is returned.
    pub fn dispatch(&self, event: &Event) -> Result<(), Error> {
        trace!("Dispatching {:?} to {} listeners", event, self.len());
        for listener in &self.listeners {
            listener.event(event)?;
        }
        Ok(())
    }

    /// Deliver each event in turn.
    pub fn dispatch_all<'a>(
        &self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<(), Error> {
        for event in events {
            self.dispatch(event)?;
        }
        Ok(())
    }
}
