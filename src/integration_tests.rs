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

//! Scenarios spanning the cache, engine, and analysers together.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::support::tracker_config::{AnalyserConfig, TrackerConfig};
use crate::tracker::dispatcher::test::Recorder;
use crate::tracker::*;

fn flags(list: &[Flag]) -> Flags {
    list.iter().cloned().collect()
}

fn res(uid: u64, f: &[Flag]) -> Option<ScanResult> {
    Some(ScanResult::new(Uid::u(uid), Some(flags(f))))
}

fn uids(a: &SessionAnalyser) -> Vec<u64> {
    a.flag_update_uids().map(|u| u.0.get()).collect()
}

struct Setup {
    cache: Arc<TrackerCache>,
    config: TrackerConfig,
}

fn set_up(silent: bool) -> Setup {
    crate::init_test_log();
    let config = TrackerConfig {
        analyser: AnalyserConfig {
            silent_flag_changes: silent,
        },
        ..TrackerConfig::default()
    };
    Setup {
        cache: TrackerCache::new(config.cache),
        config,
    }
}

impl Setup {
    fn select(
        &self,
        session: u64,
        last_uid: Option<u64>,
    ) -> (Arc<ChangeEngine>, Arc<SessionAnalyser>) {
        let analyser =
            SessionAnalyser::new(
                SessionId(session),
                "INBOX",
                self.config.analyser,
            );
        let engine = self
            .cache
            .subscribe("INBOX", last_uid.map(Uid::u), analyser.clone())
            .unwrap();
        (engine, analyser)
    }
}

#[test]
fn new_mail_reaches_every_session() {
    let setup = set_up(false);
    let (engine, a) = setup.select(1, Some(100));
    let (_, b) = setup.select(2, Some(100));

    engine
        .found(Range::unbounded(Uid::u(1)), &[res(150, &[])], None)
        .unwrap();
    assert!(a.is_size_changed());
    assert!(b.is_size_changed());

    a.reset();
    assert!(!a.is_size_changed());
    assert!(b.is_size_changed());
}

#[test]
fn silent_store_only_suppressed_for_originator() {
    let setup = set_up(true);
    let (engine, originator) = setup.select(11, None);
    let (_, other) = setup.select(99, None);

    engine
        .found(Range::all(), &[res(900, &[])], None)
        .unwrap();
    originator.reset();
    other.reset();

    engine
        .found_one(
            ScanResult::new(Uid::u(900), Some(flags(&[Flag::Answered]))),
            Some(SessionId(11)),
        )
        .unwrap();

    assert!(uids(&originator).is_empty());
    assert_eq!(vec![900], uids(&other));
}

#[test]
fn non_silent_store_reaches_originator() {
    let setup = set_up(false);
    let (engine, originator) = setup.select(11, None);

    engine
        .found(Range::all(), &[res(900, &[])], None)
        .unwrap();
    originator.reset();

    engine
        .found_one(
            ScanResult::new(Uid::u(900), Some(flags(&[Flag::Answered]))),
            Some(SessionId(11)),
        )
        .unwrap();
    assert_eq!(vec![900], uids(&originator));
}

#[test]
fn recent_claim_is_invisible() {
    let setup = set_up(false);
    let (engine, a) = setup.select(1, None);

    engine
        .found(Range::all(), &[res(1, &[Flag::Seen])], None)
        .unwrap();
    a.reset();

    engine
        .found(Range::all(), &[res(1, &[Flag::Seen, Flag::Recent])], None)
        .unwrap();
    assert!(!a.is_dirty());
    // The cache still follows the store
    assert_eq!(
        Some(Some(flags(&[Flag::Seen, Flag::Recent]))),
        engine.cached_flags(Uid::u(1))
    );
}

#[test]
fn expunge_then_deselect() {
    let setup = set_up(false);
    let (engine, a) = setup.select(1, None);
    let (_, b) = setup.select(2, None);

    engine
        .found(Range::all(), &[res(1, &[]), res(2, &[])], None)
        .unwrap();
    a.reset();
    b.reset();

    engine.expunged(&[Uid::u(1)], Some(SessionId(1))).unwrap();
    assert!(a.is_size_changed());
    assert!(b.is_size_changed());

    let a: Arc<dyn Listener> = a;
    let b: Arc<dyn Listener> = b;
    engine.remove_listener(&a);
    assert!(setup.cache.get("INBOX").is_some());
    engine.remove_listener(&b);
    assert!(setup.cache.get("INBOX").is_none());
}

#[test]
fn deleted_mailbox_is_replaced_on_reselect() {
    let setup = set_up(false);
    let recorder = Recorder::new();
    let engine = setup
        .cache
        .subscribe("INBOX", None, recorder.clone())
        .unwrap();

    engine.signal_deletion(Some(SessionId(3))).unwrap();
    assert_eq!(
        vec![Event::MailboxDeleted {
            cause: Some(SessionId(3))
        }],
        recorder.take()
    );
    assert_matches!(
        Err(crate::Error::TrackerDisposed),
        engine.found(Range::all(), &[], None)
    );

    let (fresh, _) = setup.select(4, None);
    assert!(!Arc::ptr_eq(&engine, &fresh));
    assert!(fresh.is_existing());
}

#[test]
fn concurrent_sessions_see_each_message_once() {
    const SESSIONS: u64 = 8;
    const PER_SESSION: u64 = 64;

    let setup = set_up(false);
    let recorder = Recorder::new();
    let engine = setup
        .cache
        .subscribe("INBOX", None, recorder.clone())
        .unwrap();
    let analysers = (1..=SESSIONS)
        .map(|session| setup.select(session, None).1)
        .collect::<Vec<_>>();

    // Each session's window overlaps the next session's
    (0..SESSIONS).into_par_iter().for_each(|session| {
        for i in 0..2 * PER_SESSION {
            let uid = (session * PER_SESSION + i) % (SESSIONS * PER_SESSION)
                + 1;
            engine
                .found_one(
                    ScanResult::new(Uid::u(uid), Some(Flags::new())),
                    Some(SessionId(session + 1)),
                )
                .unwrap();
            // Learn of a neighbour out of band
            let neighbour = uid % (SESSIONS * PER_SESSION) + 1;
            engine.found_last_uid(Uid::u(neighbour)).unwrap();
        }
    });

    let added = recorder
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Added { uid, .. } => Some(uid.0.get()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let unique = added.iter().copied().collect::<BTreeSet<_>>();
    assert_eq!(added.len(), unique.len());
    assert_eq!((1..=SESSIONS * PER_SESSION).collect::<BTreeSet<_>>(), unique);
    assert_eq!(
        Some(Uid::u(SESSIONS * PER_SESSION)),
        engine.last_uid()
    );

    for analyser in analysers {
        assert!(analyser.is_size_changed());
    }
}

#[test]
fn concurrent_registration_and_scans() {
    let setup = set_up(false);
    let (engine, _) = setup.select(1, None);

    (0..32u64).into_par_iter().for_each(|n| {
        if 0 == n % 2 {
            let analyser = SessionAnalyser::new(
                SessionId(100 + n),
                "INBOX",
                setup.config.analyser,
            );
            let listener: Arc<dyn Listener> = analyser.clone();
            engine.add_listener(Arc::clone(&listener)).unwrap();
            engine
                .found_one(
                    ScanResult::new(Uid::u(n + 1), Some(Flags::new())),
                    None,
                )
                .unwrap();
            // Registered before the scan, so it must have seen the addition
            assert!(analyser.is_size_changed());
            engine.remove_listener(&listener);
        } else {
            engine
                .found_one(
                    ScanResult::new(Uid::u(n + 1), Some(Flags::new())),
                    None,
                )
                .unwrap();
        }
    });

    assert_eq!(32, engine.cached_uids().len());
    assert_eq!(1, engine.listener_count());
}
