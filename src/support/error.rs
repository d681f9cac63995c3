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

use thiserror::Error;

use crate::tracker::model::Uid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mailbox tracker already disposed")]
    TrackerDisposed,
    #[error("Mailbox tracker evicted from cache")]
    TrackerEvicted,
    #[error("Mailbox name already tracked")]
    NameInUse,
    #[error("UID range lower bound exceeds upper bound")]
    InvertedRange,
    #[error("UID {0} reported more than once in one scan")]
    DuplicateUid(Uid),
    #[error("UID {0} lies outside the scanned range")]
    UidOutsideRange(Uid),
    #[error("Non-existent flag")]
    NxFlag,
    #[error("Unsafe keyword or mailbox name")]
    UnsafeName,
    #[error("Listener failed: {0}")]
    ListenerFailed(String),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}
