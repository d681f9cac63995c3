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

pub mod analyser;
pub mod cache;
pub mod change_engine;
pub mod dispatcher;
pub mod event;
pub mod mailbox_tracker;
pub mod model;

pub use self::analyser::SessionAnalyser;
pub use self::cache::{MailboxCache, TrackerCache};
pub use self::change_engine::ChangeEngine;
pub use self::dispatcher::EventDispatcher;
pub use self::event::{Event, Listener};
pub use self::mailbox_tracker::Tracker;
pub use self::model::{
    Flag, Flags, Range, ScanResult, SessionId, Uid, UpperBound,
};
