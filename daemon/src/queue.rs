use std::collections::VecDeque;

use tracing::warn;

use crate::record::PlaybackRecord;
use crate::store::{KeyValueStore, StoreResult};

/// Store key shared with the consumer that drains and uploads the queue.
pub const QUEUE_KEY: &str = "flutter.scrobble_queue";
/// Maximum number of records kept; older ones are dropped first.
pub const QUEUE_CAPACITY: usize = 50;

/// Durable, insertion-ordered, capacity-capped list of [`PlaybackRecord`]s.
///
/// Nothing is cached in memory: every call round-trips through the store, so
/// the queue survives restarts and sees what the consumer removed. When the
/// stored value cannot be parsed it is treated as empty and overwritten by the
/// next append.
pub struct EventQueue<S> {
    store: S,
}

impl<S: KeyValueStore> EventQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends `record`, drops the oldest entries beyond [`QUEUE_CAPACITY`] and
    /// returns the resulting length.
    pub fn append(&self, record: PlaybackRecord) -> StoreResult<usize> {
        let mut record = Some(record);
        let mut len = 0;
        self.store.update(QUEUE_KEY, &mut |current| {
            let mut records = decode(current);
            if let Some(r) = record.take() {
                push_bounded(&mut records, r, QUEUE_CAPACITY);
            }
            len = records.len();
            Ok(serde_json::to_string(&records)?)
        })?;
        Ok(len)
    }

    /// Returns every queued record, oldest first, without removing anything.
    pub fn read_all(&self) -> StoreResult<Vec<PlaybackRecord>> {
        let current = self.store.get(QUEUE_KEY)?;
        Ok(decode(current.as_deref()).into())
    }
}

/// Pushes `record`, evicting from the front until `records` holds at most `capacity`.
fn push_bounded(records: &mut VecDeque<PlaybackRecord>, record: PlaybackRecord, capacity: usize) {
    records.push_back(record);
    while records.len() > capacity {
        records.pop_front();
    }
}

fn decode(raw: Option<&str>) -> VecDeque<PlaybackRecord> {
    let Some(raw) = raw else {
        return VecDeque::new();
    };
    match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("Queue contents are unreadable, treating as empty: {e}");
            VecDeque::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn make_record(i: usize) -> PlaybackRecord {
        PlaybackRecord::new(
            1_700_000_000_000 + i as i64,
            format!("Song {i}"),
            "Artist",
            "Album",
            0,
            "pkg",
        )
        .unwrap()
    }

    fn titles(records: &[PlaybackRecord]) -> Vec<String> {
        records.iter().map(|r| r.title.clone()).collect()
    }

    // ── append / cap ──────────────────────────────────────────────────────────

    #[test]
    fn empty_queue_reads_empty() {
        let q = EventQueue::new(MemoryStore::default());
        assert!(q.read_all().unwrap().is_empty());
    }

    #[test]
    fn append_preserves_insertion_order() {
        let q = EventQueue::new(MemoryStore::default());
        for i in 0..3 {
            q.append(make_record(i)).unwrap();
        }
        assert_eq!(titles(&q.read_all().unwrap()), ["Song 0", "Song 1", "Song 2"]);
    }

    #[test]
    fn append_returns_new_length() {
        let q = EventQueue::new(MemoryStore::default());
        assert_eq!(q.append(make_record(0)).unwrap(), 1);
        assert_eq!(q.append(make_record(1)).unwrap(), 2);
    }

    #[test]
    fn length_is_min_of_appends_and_capacity() {
        for n in [0, 1, 49, 50, 51, 120] {
            let q = EventQueue::new(MemoryStore::default());
            for i in 0..n {
                q.append(make_record(i)).unwrap();
            }
            let all = q.read_all().unwrap();
            assert_eq!(all.len(), n.min(QUEUE_CAPACITY), "after {n} appends");
            // The survivors are exactly the most recent ones, in order.
            let expected: Vec<String> =
                (n.saturating_sub(QUEUE_CAPACITY)..n).map(|i| format!("Song {i}")).collect();
            assert_eq!(titles(&all), expected);
        }
    }

    #[test]
    fn fifty_first_append_drops_the_oldest() {
        let q = EventQueue::new(MemoryStore::default());
        for i in 0..51 {
            q.append(make_record(i)).unwrap();
        }
        let all = q.read_all().unwrap();
        assert_eq!(all.len(), 50);
        assert_eq!(all[0].title, "Song 1");
        assert_eq!(all[49].title, "Song 50");
        assert!(all.iter().all(|r| r.title != "Song 0"));
    }

    #[test]
    fn oversized_stored_queue_is_trimmed_on_append() {
        let many: Vec<PlaybackRecord> = (0..60).map(make_record).collect();
        let store = MemoryStore::with_value(QUEUE_KEY, &serde_json::to_string(&many).unwrap());
        let q = EventQueue::new(store);
        assert_eq!(q.append(make_record(60)).unwrap(), QUEUE_CAPACITY);
        let all = q.read_all().unwrap();
        assert_eq!(all.first().unwrap().title, "Song 11");
        assert_eq!(all.last().unwrap().title, "Song 60");
    }

    // ── corruption ────────────────────────────────────────────────────────────

    #[test]
    fn append_to_corrupt_queue_starts_fresh() {
        let q = EventQueue::new(MemoryStore::with_value(QUEUE_KEY, "[{broken"));
        assert_eq!(q.append(make_record(7)).unwrap(), 1);
        assert_eq!(titles(&q.read_all().unwrap()), ["Song 7"]);
    }

    #[test]
    fn corrupt_queue_reads_as_empty() {
        let q = EventQueue::new(MemoryStore::with_value(QUEUE_KEY, "not json at all"));
        assert!(q.read_all().unwrap().is_empty());
    }

    #[test]
    fn wrong_shape_counts_as_corrupt() {
        let q = EventQueue::new(MemoryStore::with_value(QUEUE_KEY, r#"{"title":"x"}"#));
        assert!(q.read_all().unwrap().is_empty());
        assert_eq!(q.append(make_record(1)).unwrap(), 1);
    }

    // ── read_all ──────────────────────────────────────────────────────────────

    #[test]
    fn read_all_does_not_clear() {
        let q = EventQueue::new(MemoryStore::default());
        q.append(make_record(0)).unwrap();
        let _ = q.read_all().unwrap();
        assert_eq!(q.read_all().unwrap().len(), 1);
    }

    #[test]
    fn consumer_trimming_is_seen_by_next_append() {
        let store = MemoryStore::default();
        let q = EventQueue::new(store);
        q.append(make_record(0)).unwrap();
        q.append(make_record(1)).unwrap();
        // The consumer drained everything.
        q.store.update(QUEUE_KEY, &mut |_| Ok("[]".to_string())).unwrap();
        assert_eq!(q.append(make_record(2)).unwrap(), 1);
    }

    // ── persistence ───────────────────────────────────────────────────────────

    #[test]
    fn stored_format_is_a_json_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let q = EventQueue::new(FileStore::open(path.clone()));
        q.append(make_record(0)).unwrap();

        let file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let raw = file[QUEUE_KEY].as_str().unwrap();
        let array: serde_json::Value = serde_json::from_str(raw).unwrap();
        let entry = &array.as_array().unwrap()[0];
        assert_eq!(entry["title"], "Song 0");
        assert_eq!(entry["duration"], 0);
        assert_eq!(entry["source"], "pkg");
    }

    #[test]
    fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        EventQueue::new(FileStore::open(path.clone()))
            .append(make_record(3))
            .unwrap();
        let reopened = EventQueue::new(FileStore::open(path));
        assert_eq!(titles(&reopened.read_all().unwrap()), ["Song 3"]);
    }

    // ── push_bounded ──────────────────────────────────────────────────────────

    #[test]
    fn push_bounded_with_room_only_appends() {
        let mut records = VecDeque::new();
        push_bounded(&mut records, make_record(0), 3);
        push_bounded(&mut records, make_record(1), 3);
        assert_eq!(records.len(), 2);
    }
}
