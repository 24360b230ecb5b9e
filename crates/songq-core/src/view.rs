//! Render model handed to whatever displays the queue.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::matcher::DisplayWindow;

pub const NO_SONG_MESSAGE: &str = "No song is currently playing.";
pub const NO_REQUESTS_MESSAGE: &str = "The stream is currently not using song request.";

const SEARCH_BASE: &str = "https://www.youtube.com/results";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub search_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 1 = plays next.
    pub rank: usize,
    pub title: String,
    pub wait: String,
    pub search_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueView {
    pub current: Option<NowPlaying>,
    pub entries: Vec<QueueEntry>,
    /// Time until the last queued song has finished.
    pub total_wait: Option<String>,
    pub message: Option<String>,
    pub day: Option<String>,
    pub updated_at: DateTime<Local>,
}

impl QueueView {
    /// Build the view for one cycle.
    ///
    /// With no current song the queue is not shown at all.
    pub fn build(
        current: Option<&str>,
        window: Option<&DisplayWindow>,
        average_song_minutes: f64,
        day: Option<String>,
    ) -> Self {
        let updated_at = Local::now();
        let Some(title) = current else {
            return Self {
                current: None,
                entries: Vec::new(),
                total_wait: None,
                message: Some(NO_SONG_MESSAGE.to_string()),
                day,
                updated_at,
            };
        };

        let current = Some(NowPlaying {
            title: title.to_string(),
            search_url: search_url(title),
        });

        let entries: Vec<QueueEntry> = window
            .map(|w| {
                w.entries
                    .iter()
                    .enumerate()
                    .map(|(i, title)| QueueEntry {
                        rank: i + 1,
                        title: title.clone(),
                        wait: wait_label(i + 1, average_song_minutes),
                        search_url: search_url(title),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let total_wait = window.map(|_| wait_label(entries.len() + 1, average_song_minutes));
        let message = entries
            .is_empty()
            .then(|| NO_REQUESTS_MESSAGE.to_string());

        Self {
            current,
            entries,
            total_wait,
            message,
            day,
            updated_at,
        }
    }

    /// Plain-text rendering, one line per entry.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        match &self.current {
            Some(now) => out.push_str(&format!("🔊 {}\n", now.title)),
            None => out.push_str(&format!("{}\n", NO_SONG_MESSAGE)),
        }
        for entry in &self.entries {
            out.push_str(&format!("{:>3}. {}  ➡️ {}\n", entry.rank, entry.title, entry.wait));
        }
        if let Some(message) = &self.message {
            if self.current.is_some() {
                out.push_str(&format!("{}\n", message));
            }
        }
        if let Some(total) = &self.total_wait {
            out.push_str(&format!("Estimated total time of playlist: {}\n", total));
        }
        out
    }
}

/// Estimated wait for the entry at `rank`.
pub fn wait_label(rank: usize, average_song_minutes: f64) -> String {
    format_minutes(rank as f64 * average_song_minutes)
}

/// `{M}m` under an hour, `{H}h {M}m` otherwise. Hours are truncated and the
/// remaining minutes rounded.
pub fn format_minutes(minutes: f64) -> String {
    let hours = (minutes / 60.0).floor() as i64;
    let remaining = (minutes % 60.0).round() as i64;
    if hours <= 0 {
        format!("{}m", remaining)
    } else {
        format!("{}h {}m", hours, remaining)
    }
}

pub fn search_url(title: &str) -> String {
    format!("{}?search_query={}", SEARCH_BASE, urlencoding::encode(title))
}
