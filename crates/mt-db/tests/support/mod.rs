#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use mt_core::{
    BatchId, CowId, DailySummary, NewMilking, SummaryKey, TimeBucket, UserId, Volume,
};
use mt_db::{Database, SummaryFilter};
use tempfile::TempDir;

pub struct TestFarm {
    pub db: Database,
    pub bessie: CowId,
    pub daisy: CowId,
    pub ana: UserId,
    pub ben: UserId,
}

/// Two cows and two users. Ana manages both cows, Ben manages Bessie.
pub fn setup_farm() -> TestFarm {
    let mut db = Database::open_in_memory().expect("open in-memory db");
    let bessie = db.add_cow("Bessie").expect("add cow");
    let daisy = db.add_cow("Daisy").expect("add cow");
    let ana = db.add_user("Ana").expect("add user");
    let ben = db.add_user("Ben").expect("add user");
    db.assign_manager(bessie, ana).expect("assign");
    db.assign_manager(bessie, ben).expect("assign");
    db.assign_manager(daisy, ana).expect("assign");
    TestFarm {
        db,
        bessie,
        daisy,
        ana,
        ben,
    }
}

pub struct TestFile {
    pub _dir: TempDir,
    pub path: PathBuf,
}

/// A database file in a fresh temp dir, with the farm directory already set up.
pub fn setup_file_farm() -> (TestFile, TestFarm) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("mt.db");
    let mut db = Database::open(&path).expect("open db");
    let bessie = db.add_cow("Bessie").expect("add cow");
    let daisy = db.add_cow("Daisy").expect("add cow");
    let ana = db.add_user("Ana").expect("add user");
    let ben = db.add_user("Ben").expect("add user");
    db.assign_manager(bessie, ana).expect("assign");
    db.assign_manager(bessie, ben).expect("assign");
    db.assign_manager(daisy, ana).expect("assign");
    (
        TestFile { _dir: dir, path },
        TestFarm {
            db,
            bessie,
            daisy,
            ana,
            ben,
        },
    )
}

pub fn milking(cow: CowId, milker: UserId, liters: &str, at: &str) -> NewMilking {
    NewMilking::parse(cow, milker, liters, at).expect("valid milking")
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
}

/// Rebuilds every summary and batch total from the stored milkings and checks
/// the stored rows agree.
pub fn assert_invariants(db: &Database) {
    let events = db.list_events(None).expect("list events");

    let mut expected: BTreeMap<SummaryKey, DailySummary> = BTreeMap::new();
    let mut batch_totals: BTreeMap<BatchId, Volume> = BTreeMap::new();
    for event in &events {
        let placement = event.placement();
        expected
            .entry(placement.key)
            .or_insert_with(|| DailySummary::empty(placement.key))
            .credit(placement.bucket, placement.volume)
            .expect("credit");
        if let Some(batch_id) = event.batch_id {
            *batch_totals.entry(batch_id).or_default() += event.volume;
        }
    }

    let stored = db
        .list_summaries(&SummaryFilter::default())
        .expect("list summaries");
    for summary in &stored {
        assert_eq!(
            summary.total,
            summary.morning + summary.afternoon + summary.evening,
            "total drifted for {:?}",
            summary.key()
        );
        for bucket in TimeBucket::ALL {
            assert!(summary.bucket(bucket) >= Volume::ZERO, "negative bucket");
        }
        assert!(summary.total > Volume::ZERO, "drained summary kept");
    }
    let stored: BTreeMap<_, _> = stored.into_iter().map(|s| (s.key(), s)).collect();
    assert_eq!(stored, expected);

    for batch in db.list_batches(None).expect("list batches") {
        let linked = batch_totals.get(&batch.id).copied().unwrap_or_default();
        assert_eq!(
            batch.total_volume, linked,
            "batch {} total does not match its milkings",
            batch.batch_number
        );
    }
}
