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

//! Value types shared by the tracker, engine, and analysers.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU64;
use std::ops::Bound;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

use crate::support::error::Error;

/// Uniquely identifies a message within a single mailbox.
///
/// UIDs start at 1 and increase monotonically as messages are added to the
/// mailbox. UIDs are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU64);

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({})", self.0.get())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl Uid {
    pub const MIN: Self = Uid(NonZeroU64::MIN);
    pub const MAX: Self = Uid(NonZeroU64::MAX);

    pub fn of(uid: u64) -> Option<Self> {
        NonZeroU64::new(uid).map(Uid)
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Uid)
    }

    #[cfg(test)]
    pub fn u(uid: u64) -> Self {
        Uid::of(uid).unwrap()
    }
}

impl From<Uid> for u64 {
    fn from(uid: Uid) -> u64 {
        uid.0.get()
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the session which caused a change.
///
/// Analysers compare this against their own session to decide whether a flag
/// change needs to be echoed back to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocate a process-unique session identifier.
    pub fn allocate() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, SeqCst))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single message flag.
///
/// `Recent` is carried along with the others because the store reports it,
/// but it is session-relative and is never reported as a change on its own.
#[derive(Clone)]
pub enum Flag {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Recent,
    Seen,
    Keyword(String),
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Flag::Answered => write!(f, "\\Answered"),
            Flag::Deleted => write!(f, "\\Deleted"),
            Flag::Draft => write!(f, "\\Draft"),
            Flag::Flagged => write!(f, "\\Flagged"),
            Flag::Recent => write!(f, "\\Recent"),
            Flag::Seen => write!(f, "\\Seen"),
            Flag::Keyword(ref kw) => write!(f, "{}", kw),
        }
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <Flag as fmt::Display>::fmt(self, f)
    }
}

impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.eq_ignore_ascii_case("\\answered") {
            Ok(Flag::Answered)
        } else if s.eq_ignore_ascii_case("\\deleted") {
            Ok(Flag::Deleted)
        } else if s.eq_ignore_ascii_case("\\draft") {
            Ok(Flag::Draft)
        } else if s.eq_ignore_ascii_case("\\flagged") {
            Ok(Flag::Flagged)
        } else if s.eq_ignore_ascii_case("\\recent") {
            Ok(Flag::Recent)
        } else if s.eq_ignore_ascii_case("\\seen") {
            Ok(Flag::Seen)
        } else if s.starts_with('\\') {
            Err(Error::NxFlag)
        } else if !s.is_empty() && s.as_bytes().iter().copied().all(is_atom_char)
        {
            Ok(Flag::Keyword(s.to_owned()))
        } else {
            Err(Error::UnsafeName)
        }
    }
}

fn is_atom_char(ch: u8) -> bool {
    match ch {
        0..=b' ' => false,
        127..=255 => false,
        b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b']' => false,
        _ => true,
    }
}

impl Flag {
    fn rank(&self) -> u8 {
        match *self {
            Flag::Answered => 0,
            Flag::Deleted => 1,
            Flag::Draft => 2,
            Flag::Flagged => 3,
            Flag::Recent => 4,
            Flag::Seen => 5,
            Flag::Keyword(_) => 6,
        }
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Flag) -> bool {
        match (self, other) {
            // Keywords are ASCII case-insensitive, as clients expect.
            (&Flag::Keyword(ref a), &Flag::Keyword(ref b)) => {
                a.eq_ignore_ascii_case(b)
            }
            _ => self.rank() == other.rank(),
        }
    }
}

impl Eq for Flag {}

impl Ord for Flag {
    fn cmp(&self, other: &Flag) -> Ordering {
        match (self, other) {
            (&Flag::Keyword(ref a), &Flag::Keyword(ref b)) => a
                .bytes()
                .map(|c| c.to_ascii_lowercase())
                .cmp(b.bytes().map(|c| c.to_ascii_lowercase())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Flag {
    fn partial_cmp(&self, other: &Flag) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Flag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        if let Flag::Keyword(ref kw) = *self {
            for c in kw.bytes() {
                c.to_ascii_lowercase().hash(state);
            }
        }
    }
}

/// The set of flags on one message.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    pub fn insert(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: &Flag) -> bool {
        self.0.remove(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> + '_ {
        self.0.iter()
    }

    /// Return whether `\Recent` is the one and only flag distinguishing
    /// `self` from `other`.
    pub fn differs_only_in_recent(&self, other: &Flags) -> bool {
        let mut delta = self.0.symmetric_difference(&other.0);
        matches!(
            (delta.next(), delta.next()),
            (Some(&Flag::Recent), None)
        )
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(it: I) -> Self {
        Flags(it.into_iter().collect())
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (ix, flag) in self.0.iter().enumerate() {
            if ix > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", flag)?;
        }
        write!(f, ")")
    }
}

/// One message as observed by a scan of the underlying store.
///
/// `flags` is `None` when the scan did not load flags, in which case the
/// result only confirms the message's existence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub uid: Uid,
    pub flags: Option<Flags>,
}

impl ScanResult {
    pub fn new(uid: Uid, flags: Option<Flags>) -> Self {
        ScanResult { uid, flags }
    }
}

/// The upper end of a `Range`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpperBound {
    Bounded(Uid),
    Unbounded,
}

/// A span of UIDs covered by one scan.
///
/// All bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Range {
    All,
    Single(Uid),
    /// `from..=to`, `from <= to`.
    Bounded(Uid, Uid),
    /// `from..`
    Unbounded(Uid),
}

impl Range {
    pub fn all() -> Self {
        Range::All
    }

    pub fn single(uid: Uid) -> Self {
        Range::Single(uid)
    }

    /// Construct `from..=to`.
    ///
    /// A `to` of `Uid::MAX` is treated as having no upper bound.
    pub fn bounded(from: Uid, to: Uid) -> Result<Self, Error> {
        if from > to {
            Err(Error::InvertedRange)
        } else if Uid::MAX == to {
            Ok(Range::Unbounded(from))
        } else {
            Ok(Range::Bounded(from, to))
        }
    }

    pub fn unbounded(from: Uid) -> Self {
        Range::Unbounded(from)
    }

    pub fn upper(&self) -> UpperBound {
        match *self {
            Range::All | Range::Unbounded(_) => UpperBound::Unbounded,
            Range::Single(uid) | Range::Bounded(_, uid) => {
                UpperBound::Bounded(uid)
            }
        }
    }

    pub fn contains(&self, uid: Uid) -> bool {
        match *self {
            Range::All => true,
            Range::Single(u) => u == uid,
            Range::Bounded(from, to) => from <= uid && uid <= to,
            Range::Unbounded(from) => from <= uid,
        }
    }

    /// Return the bounds of this range, suitable for `BTreeMap::range()`.
    pub fn bounds(&self) -> (Bound<Uid>, Bound<Uid>) {
        match *self {
            Range::All => (Bound::Unbounded, Bound::Unbounded),
            Range::Single(uid) => (Bound::Included(uid), Bound::Included(uid)),
            Range::Bounded(from, to) => {
                (Bound::Included(from), Bound::Included(to))
            }
            Range::Unbounded(from) => (Bound::Included(from), Bound::Unbounded),
        }
    }
}
