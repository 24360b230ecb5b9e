//! Locate the current song inside the request queue.
//!
//! Titles come from free-form chat, so matching is layered:
//!
//!   1. exact string equality
//!   2. split both on `" - "`, trim + lowercase, compare the first two parts
//!      a. same order or swapped ("artist - title" vs "title - artist")
//!      b. any single part equal to any single part
//!
//! Step 2b is deliberately loose and will match two different songs by the
//! same artist. It is kept because request titles are typed by viewers and
//! rarely agree with the announcer's spelling otherwise.

use tracing::{debug, warn};

use crate::state::QueueState;
use crate::store::KvStore;

const PART_SEPARATOR: &str = " - ";

/// Entries still ahead of the current song, soonest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayWindow {
    /// Queue index of the current song (or the fallback position).
    pub position: usize,
    /// True when `position` comes from a previous cycle.
    pub from_fallback: bool,
    pub entries: Vec<String>,
}

/// How a queue entry matched the current song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Parts,
    Swapped,
    Partial,
}

/// Index of the first queue entry matching `current`, and how it matched.
pub fn find_match<S: AsRef<str>>(queue: &[S], current: &str) -> Option<(usize, MatchKind)> {
    let current_parts = split_parts(current);
    queue.iter().enumerate().find_map(|(idx, song)| {
        let song = song.as_ref();
        if song == current {
            return Some((idx, MatchKind::Exact));
        }
        let (Some((cur_a, cur_b)), Some((song_a, song_b))) =
            (current_parts.as_ref(), split_parts(song))
        else {
            return None;
        };
        if song_a == *cur_a && song_b == *cur_b {
            Some((idx, MatchKind::Parts))
        } else if song_a == *cur_b && song_b == *cur_a {
            Some((idx, MatchKind::Swapped))
        } else if song_a == *cur_a || song_b == *cur_b || song_a == *cur_b || song_b == *cur_a {
            Some((idx, MatchKind::Partial))
        } else {
            None
        }
    })
}

/// First two `" - "` parts, normalised, when there are at least two.
fn split_parts(title: &str) -> Option<(String, String)> {
    let mut parts = title.split(PART_SEPARATOR).map(|p| p.trim().to_lowercase());
    let first = parts.next()?;
    let second = parts.next()?;
    Some((first, second))
}

/// Resolve the display window for `current` and remember the match.
///
/// Without a match the last persisted position is reused; without one of
/// those there is nothing to display. A stale position past the end of a
/// shorter queue is clamped to its length.
pub fn locate<S, Q>(queue: &[Q], current: &str, state: &mut QueueState<S>) -> Option<DisplayWindow>
where
    S: KvStore,
    Q: AsRef<str>,
{
    let (position, from_fallback) = match find_match(queue, current) {
        Some((idx, kind)) => {
            debug!("matcher: {:?} matched queue[{}] ({:?})", current, idx, kind);
            if let Err(e) = state.set_last_matching_index(idx) {
                warn!("matcher: could not persist last matching index: {}", e);
            }
            (idx, false)
        }
        None => {
            let idx = state.last_matching_index()?;
            debug!("matcher: {:?} not in queue, reusing position {}", current, idx);
            (idx, true)
        }
    };

    let end = position.min(queue.len());
    let entries = queue[..end]
        .iter()
        .rev()
        .map(|s| s.as_ref().to_string())
        .collect();

    Some(DisplayWindow {
        position,
        from_fallback,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn state() -> QueueState<MemoryStore> {
        QueueState::new(MemoryStore::new())
    }

    #[test]
    fn test_exact_match() {
        let mut state = state();
        let queue = ["A - B", "C - D"];
        let window = locate(&queue, "C - D", &mut state).unwrap();
        assert_eq!(window.position, 1);
        assert!(!window.from_fallback);
        assert_eq!(window.entries, vec!["A - B".to_string()]);
        assert_eq!(state.last_matching_index(), Some(1));
    }

    #[test]
    fn test_window_is_reversed() {
        let mut state = state();
        let queue = ["one - 1", "two - 2", "three - 3", "now - playing"];
        let window = locate(&queue, "now - playing", &mut state).unwrap();
        assert_eq!(window.entries, vec!["three - 3", "two - 2", "one - 1"]);
    }

    #[test]
    fn test_case_and_whitespace_insensitive_parts() {
        let queue = ["x - y", "  Daft Punk -   One More Time "];
        assert_eq!(
            find_match(&queue, "daft punk - ONE MORE TIME"),
            Some((1, MatchKind::Parts))
        );
    }

    #[test]
    fn test_swapped_parts() {
        let queue = ["One More Time - Daft Punk"];
        assert_eq!(
            find_match(&queue, "Daft Punk - One More Time"),
            Some((0, MatchKind::Swapped))
        );
    }

    #[test]
    fn test_partial_fallback_match() {
        let mut state = state();
        let queue = ["X - Y"];
        assert_eq!(find_match(&queue, "Y - Z"), Some((0, MatchKind::Partial)));
        let window = locate(&queue, "Y - Z", &mut state).unwrap();
        assert_eq!(window.position, 0);
        assert!(window.entries.is_empty());
    }

    #[test]
    fn test_first_entry_passing_any_tier_wins() {
        let mut state = state();
        let queue = ["A - X", "A - B"];
        assert_eq!(find_match(&queue, "A - B"), Some((0, MatchKind::Partial)));
        let window = locate(&queue, "A - B", &mut state).unwrap();
        assert_eq!(window.position, 0);
        assert!(window.entries.is_empty());
        assert_eq!(state.last_matching_index(), Some(0));
    }

    #[test]
    fn test_single_part_titles_only_match_exactly() {
        let queue = ["Intro", "Outro - Band"];
        assert_eq!(find_match(&queue, "Outro"), None);
        assert_eq!(find_match(&queue, "Intro"), Some((0, MatchKind::Exact)));
    }

    #[test]
    fn test_no_match_reuses_last_index() {
        let mut state = state();
        state.set_last_matching_index(2).unwrap();
        let queue = ["a - 1", "b - 2", "c - 3", "d - 4"];
        let window = locate(&queue, "nothing - here", &mut state).unwrap();
        assert_eq!(window.position, 2);
        assert!(window.from_fallback);
        assert_eq!(window.entries, vec!["b - 2", "a - 1"]);
        assert_eq!(state.last_matching_index(), Some(2));
    }

    #[test]
    fn test_no_match_without_history_displays_nothing() {
        let mut state = state();
        assert!(locate(&["a - 1"], "b - 2", &mut state).is_none());
        assert!(locate::<_, &str>(&[], "b - 2", &mut state).is_none());
    }

    #[test]
    fn test_fallback_past_end_is_clamped() {
        let mut state = state();
        state.set_last_matching_index(9).unwrap();
        let window = locate(&["a - 1", "b - 2"], "zzz", &mut state).unwrap();
        assert_eq!(window.position, 9);
        assert_eq!(window.entries, vec!["b - 2", "a - 1"]);
    }
}
