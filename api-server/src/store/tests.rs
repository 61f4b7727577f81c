use super::*;
use harness_core::{Genre, RecordedMetrics, SessionStatus};
use tempfile::TempDir;

fn test_store(max_records: usize) -> (HistoryStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::open(dir.path(), max_records).unwrap();
    (store, dir)
}

fn record(genre: Genre, status: SessionStatus, timestamp: u64, crashes: u64) -> SessionRecord {
    SessionRecord {
        id: Uuid::new_v4(),
        timestamp,
        genre,
        algorithm: genre.algorithm().as_str().to_string(),
        status,
        duration_seconds: 12.5,
        metrics: RecordedMetrics {
            coverage: (timestamp as usize) * 10,
            crashes,
            total_steps: 500,
            reward_mean: 0.25,
            episodes: 2,
        },
        notes: Some("policy random-explorer".to_string()),
    }
}

#[test]
fn open_creates_database_file() {
    let (store, dir) = test_store(10);
    assert!(dir.path().join("history.db").exists());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn insert_and_get_round_trip() {
    let (store, _dir) = test_store(10);
    let rec = record(Genre::Racing, SessionStatus::Completed, 100, 3);
    store.record(&rec).unwrap();

    let fetched = store.get(rec.id).unwrap().expect("record should exist");
    assert_eq!(fetched, rec);
    assert!(store.get(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn list_is_newest_first_and_filters_ignore_case() {
    let (store, _dir) = test_store(10);
    store
        .insert(&record(Genre::Platformer, SessionStatus::Stopped, 100, 0))
        .unwrap();
    store
        .insert(&record(Genre::Racing, SessionStatus::Error, 200, 1))
        .unwrap();
    store
        .insert(&record(Genre::Racing, SessionStatus::Completed, 300, 2))
        .unwrap();

    let all = store.list(&HistoryQuery::default()).unwrap();
    let stamps: Vec<u64> = all.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![300, 200, 100]);

    let query = HistoryQuery {
        genre: Some("RACING".into()),
        algorithm: Some("sac".into()),
        ..Default::default()
    };
    let racing = store.list(&query).unwrap();
    assert_eq!(racing.len(), 2);
    assert_eq!(store.count_matching(&query).unwrap(), 2);

    let errored = store
        .list(&HistoryQuery {
            status: Some("error".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].timestamp, 200);

    let limited = HistoryQuery {
        limit: Some(1),
        ..Default::default()
    };
    assert_eq!(store.list(&limited).unwrap().len(), 1);
    assert_eq!(store.count_matching(&limited).unwrap(), 3);
}

#[test]
fn insert_prunes_oldest_beyond_cap() {
    let (store, _dir) = test_store(2);
    let oldest = record(Genre::Fps, SessionStatus::Stopped, 10, 0);
    store.insert(&oldest).unwrap();
    store
        .insert(&record(Genre::Fps, SessionStatus::Stopped, 20, 0))
        .unwrap();
    store
        .insert(&record(Genre::Fps, SessionStatus::Stopped, 30, 0))
        .unwrap();

    assert_eq!(store.count().unwrap(), 2);
    assert!(store.get(oldest.id).unwrap().is_none());
}

#[test]
fn delete_and_clear() {
    let (store, _dir) = test_store(10);
    let a = record(Genre::Rpg, SessionStatus::Completed, 1, 0);
    let b = record(Genre::Rpg, SessionStatus::Completed, 2, 0);
    store.insert(&a).unwrap();
    store.insert(&b).unwrap();

    assert!(store.delete(a.id).unwrap());
    assert!(!store.delete(a.id).unwrap());
    assert_eq!(store.clear().unwrap(), 1);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.clear().unwrap(), 0);
}

#[test]
fn statistics_aggregate_all_records() {
    let (store, _dir) = test_store(10);
    assert_eq!(store.statistics().unwrap(), HistoryStatistics::default());

    store
        .insert(&record(Genre::Racing, SessionStatus::Completed, 1, 2))
        .unwrap();
    store
        .insert(&record(Genre::Racing, SessionStatus::Error, 2, 4))
        .unwrap();
    store
        .insert(&record(Genre::Fps, SessionStatus::Completed, 3, 0))
        .unwrap();

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_tests, 3);
    assert_eq!(stats.by_genre.get("racing"), Some(&2));
    assert_eq!(stats.by_genre.get("fps"), Some(&1));
    assert_eq!(stats.by_algorithm.get("SAC"), Some(&2));
    assert_eq!(stats.by_status.get("Completed"), Some(&2));
    assert_eq!(stats.by_status.get("Error"), Some(&1));
    assert_eq!(stats.total_crashes, 6);
    assert!((stats.average_crashes - 2.0).abs() < 1e-9);
    assert!((stats.average_coverage - 20.0).abs() < 1e-9);
}

#[test]
fn reopen_keeps_existing_records() {
    let dir = TempDir::new().unwrap();
    let rec = record(Genre::Platformer, SessionStatus::Stopped, 5, 1);
    {
        let store = HistoryStore::open(dir.path(), 10).unwrap();
        store.insert(&rec).unwrap();
    }

    let store = HistoryStore::open(dir.path(), 10).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get(rec.id).unwrap(), Some(rec));
}
