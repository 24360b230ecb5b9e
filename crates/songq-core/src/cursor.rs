//! Incremental reader for the append-only channel log.
//!
//! Each day's record remembers how many lines of that day's log were already
//! consumed. [`advance`] asks the log for everything after that offset,
//! keeps the request-reward lines, and commits the new offset together with
//! the grown accumulator.
//!
//! The offset always moves by the number of lines the server returned, not
//! the number kept, so non-request chatter is never re-read or skipped.

use std::future::Future;
use tracing::{debug, info, warn};

use crate::day_key::DayKey;
use crate::error::Result;
use crate::state::{DayRecord, QueueState};
use crate::store::KvStore;

/// Outcome of one cursor step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorAdvance {
    /// Request lines appended by this step (empty on failure).
    pub new_lines: Vec<String>,
    /// Offset persisted for the day after this step.
    pub offset: u64,
    /// The day's full accumulator after this step.
    pub songs: Vec<String>,
    /// The fetch (and commit, if anything was new) went through.
    pub succeeded: bool,
}

impl CursorAdvance {
    fn unchanged(record: DayRecord, succeeded: bool) -> Self {
        Self {
            new_lines: Vec::new(),
            offset: record.offset,
            songs: record.songs,
            succeeded,
        }
    }
}

/// Advance the cursor for `day`.
///
/// `fetch` receives the persisted offset and returns the log text after it,
/// or `None` when the server has nothing for that offset (404). A fetch or
/// commit failure is logged and leaves the stored record untouched; the
/// previously stored accumulator is still returned in `songs`.
pub async fn advance<S, F, Fut>(
    state: &mut QueueState<S>,
    day: &DayKey,
    marker: &str,
    fetch: F,
) -> CursorAdvance
where
    S: KvStore,
    F: FnOnce(u64) -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let stored = state.load_day(day);
    let offset = stored.offset;

    let text = match fetch(offset).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("cursor: {} has nothing past offset {}", day, offset);
            return CursorAdvance::unchanged(stored, true);
        }
        Err(e) => {
            warn!("cursor: fetch for {} at offset {} failed: {}", day, offset, e);
            return CursorAdvance::unchanged(stored, false);
        }
    };

    let lines = split_lines(&text);
    if lines.is_empty() {
        return CursorAdvance::unchanged(stored, true);
    }

    let new_lines: Vec<String> = lines
        .iter()
        .filter(|line| line.contains(marker))
        .map(|line| line.to_string())
        .collect();

    let mut record = stored.clone();
    record.offset = offset + lines.len() as u64;
    record.songs.extend(new_lines.iter().cloned());

    if let Err(e) = state.commit_day(day, &record) {
        warn!("cursor: commit for {} failed, keeping offset {}: {}", day, offset, e);
        return CursorAdvance::unchanged(stored, false);
    }

    info!(
        "cursor: {} offset {} -> {} ({} lines, {} requests)",
        day,
        offset,
        record.offset,
        lines.len(),
        new_lines.len()
    );

    CursorAdvance {
        new_lines,
        offset: record.offset,
        songs: record.songs,
        succeeded: true,
    }
}

/// Non-empty `\n`-separated lines, with a trailing `\r` stripped.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;

    const MARKER: &str = "custom-reward-id=r1";

    fn today() -> DayKey {
        DayKey::from_ymd(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_offset_counts_unfiltered_lines() {
        let mut state = QueueState::new(MemoryStore::new());
        let text = "a chat line\n@custom-reward-id=r1 :u!u PRIVMSG #c :A - B\n\nanother\n";

        let step = advance(&mut state, &today(), MARKER, |offset| async move {
            assert_eq!(offset, 0);
            Ok::<_, Error>(Some(text.to_string()))
        })
        .await;

        assert_eq!(step.offset, 3);
        assert_eq!(step.new_lines.len(), 1);
        assert_eq!(step.songs, step.new_lines);
        assert_eq!(state.load_day(&today()).offset, 3);
    }

    #[tokio::test]
    async fn test_not_found_leaves_state_unchanged() {
        let mut state = QueueState::new(MemoryStore::new());
        let step = advance(&mut state, &today(), MARKER, |_| async { Ok::<_, Error>(None) }).await;
        assert!(step.succeeded);
        assert!(step.new_lines.is_empty());
        assert_eq!(step.offset, 0);
        assert!(state.store().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_previous_accumulator() {
        let mut state = QueueState::new(MemoryStore::new());
        let record = DayRecord {
            offset: 10,
            songs: vec!["kept".into()],
        };
        state.commit_day(&today(), &record).unwrap();

        let step = advance(&mut state, &today(), MARKER, |_| async {
            Err::<Option<String>, _>(Error::Network("connection reset".into()))
        })
        .await;

        assert!(!step.succeeded);
        assert!(step.new_lines.is_empty());
        assert_eq!(step.offset, 10);
        assert_eq!(step.songs, vec!["kept".to_string()]);
        assert_eq!(state.load_day(&today()), record);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\r\nb\n\n\nc"), vec!["a", "b", "c"]);
        assert!(split_lines("").is_empty());
    }
}
