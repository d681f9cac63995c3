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

//! Shared-mailbox change tracking for concurrent IMAP sessions.
//!
//! Every session with a mailbox selected registers a `SessionAnalyser` with
//! the mailbox's `ChangeEngine`. Whenever any session scans the underlying
//! store, it feeds the results to the engine, which diffs them against its
//! cache and broadcasts the resulting events to all analysers. Each session
//! later asks its own analyser what untagged responses it owes its client.
//!
//! Nothing here does I/O. Scans are performed by the caller.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod support;
pub mod tracker;

#[cfg(test)]
mod integration_tests;

pub use crate::support::error::Error;
pub use crate::support::tracker_config::TrackerConfig;
pub use crate::tracker::{
    ChangeEngine, Event, Flag, Flags, Listener, MailboxCache, Range,
    ScanResult, SessionAnalyser, SessionId, TrackerCache, Uid, UpperBound,
};

#[cfg(test)]
static INIT_TEST_LOG: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
fn init_test_log() {
    INIT_TEST_LOG.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}][{}] {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message,
                ))
            })
            .level(log::LevelFilter::Trace)
            .chain(std::io::stderr())
            .apply()
            .unwrap();
    })
}
