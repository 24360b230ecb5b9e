//! Parsing of chat log lines: the announcer's now-playing lines and the raw
//! IRC lines of song-request redemptions.

use tracing::{debug, info, warn};

use crate::state::QueueState;
use crate::store::KvStore;

/// Glyph the announcer prefixes the current song with.
pub const SPEAKER_GLYPH: &str = "🔊";
/// Announcer lines carrying this are mood blurbs, not songs.
pub const EXCLUSION_MARKER: &str = "VIBE";
/// Posted by the announcer when the stream ends and the queue is wiped.
pub const OFFLINE_SIGNAL: &str = "The stream is offline. Clearing the spotify request queue.";

/// Result of scanning the announcer's log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlayingScan {
    pub song: Option<String>,
    /// An offline signal was seen before the current song line.
    pub went_offline: bool,
}

/// Scan `lines` (newest first) for the current song.
///
/// Stops at the first line that names a song. Offline signals seen on the
/// way are reported in `went_offline`.
pub fn scan_now_playing<'a, I>(lines: I) -> NowPlayingScan
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scan = NowPlayingScan::default();
    for line in lines {
        if line.contains(OFFLINE_SIGNAL) {
            scan.went_offline = true;
            continue;
        }
        if line.contains(EXCLUSION_MARKER) {
            continue;
        }
        if let Some(pos) = line.find(SPEAKER_GLYPH) {
            let song = line[pos + SPEAKER_GLYPH.len()..].trim();
            scan.song = Some(song.to_string());
            break;
        }
    }
    scan
}

/// Extract the current song and clear the last matching index if the
/// stream went offline.
pub fn extract_current_song<'a, S, I>(lines: I, state: &mut QueueState<S>) -> Option<String>
where
    S: KvStore,
    I: IntoIterator<Item = &'a str>,
{
    let scan = scan_now_playing(lines);
    if scan.went_offline {
        info!("chat: stream went offline, forgetting last queue position");
        if let Err(e) = state.clear_last_matching_index() {
            warn!("chat: could not clear last matching index: {}", e);
        }
    }
    match &scan.song {
        Some(song) => debug!("chat: now playing {:?}", song),
        None => debug!("chat: no now-playing line found"),
    }
    scan.song
}

/// Song title of a raw request line: the message text after the last `" :"`.
///
/// `@tags :user!user@user.tmi.twitch.tv PRIVMSG #chan :Artist - Title`
pub fn parse_request_title(line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split(" :").collect();
    if parts.len() < 3 {
        return None;
    }
    let title = parts[parts.len() - 1].trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Map an accumulator to the ordered queue of titles, dropping unparsable lines.
pub fn request_titles<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| parse_request_title(line.as_ref()))
        .collect()
}
