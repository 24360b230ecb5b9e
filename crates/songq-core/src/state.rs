//! Typed view over the key-value store: one [`DayRecord`] per log day plus
//! the process-wide last matching index.
//!
//! ## Keys
//!
//!   requestSongs-<YYYY-MM-DD>        DayRecord JSON `{"offset": n, "songs": [..]}`
//!   requestSongsOffset-<YYYY-MM-DD>  legacy offset (integer string), read only
//!   lastMatchingIndex                integer string
//!
//! Older stores kept the accumulator as a bare JSON array under
//! `requestSongs-*` with the offset in a separate key, and spelled the date
//! without zero padding (`requestSongs-2024-6-1`). Those still load; the
//! next commit for that day rewrites them as a single padded record.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::day_key::DayKey;
use crate::error::{Error, Result};
use crate::store::KvStore;

pub const SONGS_PREFIX: &str = "requestSongs-";
pub const OFFSET_PREFIX: &str = "requestSongsOffset-";
pub const LAST_MATCHING_INDEX_KEY: &str = "lastMatchingIndex";

/// Cursor and accumulator of one log day, always written together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    /// Lines of the channel log already consumed.
    pub offset: u64,
    /// Raw request-reward lines in log order.
    pub songs: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDay {
    Record(DayRecord),
    Legacy(Vec<String>),
}

pub fn songs_key(day: &DayKey) -> String {
    format!("{SONGS_PREFIX}{day}")
}

pub fn offset_key(day: &DayKey) -> String {
    format!("{OFFSET_PREFIX}{day}")
}

/// Date spellings a day may be stored under, padded first.
fn day_labels(day: &DayKey) -> Vec<String> {
    let padded = day.to_string();
    let unpadded = day.unpadded();
    if padded == unpadded {
        vec![padded]
    } else {
        vec![padded, unpadded]
    }
}

pub struct QueueState<S> {
    store: S,
}

impl<S: KvStore> QueueState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Load the record for `day`. A record that does not decode is dropped
    /// and the day starts over from an empty accumulator.
    pub fn load_day(&self, day: &DayKey) -> DayRecord {
        match self.try_load_day(day) {
            Ok(record) => record,
            Err(e) => {
                warn!("state: {}; resetting accumulator for {}", e, day);
                DayRecord {
                    offset: self.legacy_offset(day).unwrap_or(0),
                    songs: Vec::new(),
                }
            }
        }
    }

    pub fn try_load_day(&self, day: &DayKey) -> Result<DayRecord> {
        let found = day_labels(day).into_iter().find_map(|label| {
            let key = format!("{SONGS_PREFIX}{label}");
            self.store.get(&key).map(|raw| (key, raw))
        });
        let Some((key, raw)) = found else {
            return Ok(DayRecord {
                offset: self.legacy_offset(day).unwrap_or(0),
                songs: Vec::new(),
            });
        };
        if key != songs_key(day) {
            debug!("state: reading {} under its unpadded key", day);
        }
        match serde_json::from_str::<StoredDay>(&raw) {
            Ok(StoredDay::Record(record)) => Ok(record),
            Ok(StoredDay::Legacy(songs)) => Ok(DayRecord {
                offset: self.legacy_offset(day).unwrap_or(0),
                songs,
            }),
            Err(e) => Err(Error::Parse {
                key,
                reason: e.to_string(),
            }),
        }
    }

    fn legacy_offset(&self, day: &DayKey) -> Option<u64> {
        let (key, raw) = day_labels(day).into_iter().find_map(|label| {
            let key = format!("{OFFSET_PREFIX}{label}");
            self.store.get(&key).map(|raw| (key, raw))
        })?;
        match raw.trim().parse::<u64>() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("state: ignoring {}={:?}: {}", key, raw, e);
                None
            }
        }
    }

    /// Persist `record` for `day` in one store write.
    pub fn commit_day(&mut self, day: &DayKey, record: &DayRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let canonical = songs_key(day);
        self.store.set(&canonical, json)?;

        // The record now carries the offset; stale keys are harmless if this fails
        for label in day_labels(day) {
            let offset = format!("{OFFSET_PREFIX}{label}");
            let songs = format!("{SONGS_PREFIX}{label}");
            for legacy in [offset, songs] {
                if legacy == canonical || self.store.get(&legacy).is_none() {
                    continue;
                }
                if let Err(e) = self.store.remove(&legacy) {
                    warn!("state: could not drop legacy key {}: {}", legacy, e);
                }
            }
        }
        Ok(())
    }

    pub fn last_matching_index(&self) -> Option<usize> {
        let raw = self.store.get(LAST_MATCHING_INDEX_KEY)?;
        match raw.trim().parse::<usize>() {
            Ok(i) => Some(i),
            Err(_) => {
                debug!("state: ignoring non-numeric {}={:?}", LAST_MATCHING_INDEX_KEY, raw);
                None
            }
        }
    }

    pub fn set_last_matching_index(&mut self, index: usize) -> Result<()> {
        self.store.set(LAST_MATCHING_INDEX_KEY, index.to_string())
    }

    pub fn clear_last_matching_index(&mut self) -> Result<()> {
        self.store.remove(LAST_MATCHING_INDEX_KEY)
    }

    /// Remove every day entry (either key prefix) at least `retention_days`
    /// calendar days older than `current`. Returns the number of keys removed.
    ///
    /// Keys whose date part does not parse are left in place.
    pub fn prune_older_than(&mut self, current: &DayKey, retention_days: i64) -> Result<usize> {
        let stale: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| {
                let Some(date_part) = key
                    .strip_prefix(OFFSET_PREFIX)
                    .or_else(|| key.strip_prefix(SONGS_PREFIX))
                else {
                    return false;
                };
                DayKey::parse(date_part)
                    .map(|day| day.days_before(current) >= retention_days)
                    .unwrap_or(false)
            })
            .collect();

        for key in &stale {
            self.store.remove(key)?;
        }
        if !stale.is_empty() {
            info!("state: pruned {} key(s) older than {} day(s): {:?}", stale.len(), retention_days, stale);
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn day(y: i32, m: u32, d: u32) -> DayKey {
        DayKey::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_day_is_empty() {
        let state = QueueState::new(MemoryStore::new());
        assert_eq!(state.load_day(&day(2024, 5, 1)), DayRecord::default());
    }

    #[test]
    fn test_accumulator_roundtrip_keeps_order() {
        let mut state = QueueState::new(MemoryStore::new());
        let today = day(2024, 5, 1);
        let record = DayRecord {
            offset: 42,
            songs: vec!["b".into(), "a".into(), "b".into(), "c".into()],
        };
        state.commit_day(&today, &record).unwrap();
        assert_eq!(state.load_day(&today), record);

        let raw = state.store().get("requestSongs-2024-05-01").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["songs"], serde_json::json!(["b", "a", "b", "c"]));
        assert_eq!(value["offset"], 42);
    }

    #[test]
    fn test_legacy_layout_loads_and_migrates() {
        let mut store = MemoryStore::new();
        store
            .set("requestSongs-2024-05-01", r#"["one","two"]"#.into())
            .unwrap();
        store.set("requestSongsOffset-2024-05-01", "17".into()).unwrap();
        let mut state = QueueState::new(store);
        let today = day(2024, 5, 1);

        let record = state.load_day(&today);
        assert_eq!(record.offset, 17);
        assert_eq!(record.songs, vec!["one".to_string(), "two".to_string()]);

        state.commit_day(&today, &record).unwrap();
        assert!(state.store().get("requestSongsOffset-2024-05-01").is_none());
        assert_eq!(state.load_day(&today), record);
    }

    #[test]
    fn test_unpadded_legacy_keys_load_and_migrate() {
        let mut store = MemoryStore::new();
        store.set("requestSongs-2024-6-1", r#"["one","two"]"#.into()).unwrap();
        store.set("requestSongsOffset-2024-6-1", "17".into()).unwrap();
        let mut state = QueueState::new(store);
        let today = DayKey::from_log_path("/channel/quin69/2024/6/1").unwrap();

        let record = state.load_day(&today);
        assert_eq!(record.offset, 17);
        assert_eq!(record.songs, vec!["one".to_string(), "two".to_string()]);

        state.commit_day(&today, &record).unwrap();
        assert_eq!(state.store().keys(), vec!["requestSongs-2024-06-01".to_string()]);
        assert_eq!(state.load_day(&today), record);
    }

    #[test]
    fn test_corrupt_accumulator_resets() {
        let mut store = MemoryStore::new();
        store.set("requestSongs-2024-05-01", "{oops".into()).unwrap();
        let state = QueueState::new(store);
        let today = day(2024, 5, 1);

        assert!(matches!(state.try_load_day(&today), Err(Error::Parse { .. })));
        assert_eq!(state.load_day(&today), DayRecord::default());
    }

    #[test]
    fn test_non_array_accumulator_resets() {
        let mut store = MemoryStore::new();
        store.set("requestSongs-2024-05-01", r#""just a string""#.into()).unwrap();
        store.set("requestSongsOffset-2024-05-01", "9".into()).unwrap();
        let state = QueueState::new(store);

        let record = state.load_day(&day(2024, 5, 1));
        assert!(record.songs.is_empty());
        assert_eq!(record.offset, 9);
    }

    #[test]
    fn test_last_matching_index() {
        let mut state = QueueState::new(MemoryStore::new());
        assert_eq!(state.last_matching_index(), None);
        state.set_last_matching_index(3).unwrap();
        assert_eq!(state.last_matching_index(), Some(3));
        state.clear_last_matching_index().unwrap();
        assert_eq!(state.last_matching_index(), None);
    }

    #[test]
    fn test_prune_keeps_today_and_yesterday() {
        let mut state = QueueState::new(MemoryStore::new());
        let today = day(2024, 3, 1);
        for d in [day(2024, 3, 1), day(2024, 2, 29), day(2024, 2, 28), day(2024, 1, 10)] {
            state.commit_day(&d, &DayRecord::default()).unwrap();
        }
        let mut raw = state.into_inner();
        raw.set("requestSongsOffset-2024-2-27", "5".into()).unwrap();
        raw.set("requestSongs-garbage", "[]".into()).unwrap();
        raw.set(LAST_MATCHING_INDEX_KEY, "1".into()).unwrap();
        let mut state = QueueState::new(raw);

        let removed = state.prune_older_than(&today, 2).unwrap();
        assert_eq!(removed, 3);

        let keys = state.store().keys();
        assert!(keys.contains(&"requestSongs-2024-03-01".to_string()));
        assert!(keys.contains(&"requestSongs-2024-02-29".to_string()));
        assert!(keys.contains(&"requestSongs-garbage".to_string()));
        assert!(keys.contains(&LAST_MATCHING_INDEX_KEY.to_string()));
        assert!(!keys.contains(&"requestSongs-2024-02-28".to_string()));
        assert!(!keys.contains(&"requestSongsOffset-2024-2-27".to_string()));
    }

    #[test]
    fn test_prune_ignores_future_days() {
        let mut state = QueueState::new(MemoryStore::new());
        state.commit_day(&day(2024, 3, 5), &DayRecord::default()).unwrap();
        assert_eq!(state.prune_older_than(&day(2024, 3, 1), 2).unwrap(), 0);
    }
}
