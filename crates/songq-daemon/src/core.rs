//! PollCore owns the persisted queue state and runs poll cycles.
//!
//! A cycle is started by the interval ticker or by an HTTP refresh request.
//! Only one cycle runs at a time: `trigger` flips the phase from Idle to
//! Polling and hands a guard to the spawned cycle, which flips it back when
//! dropped. Triggers that arrive while Polling are skipped, not queued.
//!
//! One cycle:
//!
//! ```text
//!   ┌─ announcer log ────────────────┐
//!   │                                ├─> extract current song ─> match ─> view
//!   └─ resolve day ─> advance cursor ┘          (clears last index on offline)
//!                     └─> prune old days
//! ```
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use songq_core::chat;
use songq_core::config::Config;
use songq_core::cursor::{self, split_lines};
use songq_core::day_key::DayKey;
use songq_core::matcher;
use songq_core::state::QueueState;
use songq_core::store::FileStore;
use songq_core::view::QueueView;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::logs::LogClient;

// ── PollEvent ─────────────────────────────────────────────────────────────────

/// Inputs into the poll loop besides the ticker.
#[derive(Debug)]
pub enum PollEvent {
    /// Run a cycle now (HTTP `POST /api/refresh`).
    Refresh,
    /// Ctrl-C or channel teardown.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollPhase {
    Idle,
    Polling,
}

/// Outcome bookkeeping for `/api/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub completed: u64,
    pub failed: u64,
    pub last_finished: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub day: Option<String>,
}

// ── PollCore ──────────────────────────────────────────────────────────────────

pub struct PollCore {
    config: Config,
    client: LogClient,
    state: Mutex<QueueState<FileStore>>,
    view: RwLock<Option<QueueView>>,
    report: RwLock<CycleReport>,
    polling: AtomicBool,
    skipped: AtomicU64,
}

/// Returns the core to Idle when the cycle holding it ends, however it ends.
struct PollGuard {
    core: Arc<PollCore>,
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.core.polling.store(false, Ordering::Release);
    }
}

impl PollCore {
    pub fn new(config: Config, client: LogClient, store: FileStore) -> Self {
        Self {
            config,
            client,
            state: Mutex::new(QueueState::new(store)),
            view: RwLock::new(None),
            report: RwLock::new(CycleReport::default()),
            polling: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> PollPhase {
        if self.polling.load(Ordering::Acquire) {
            PollPhase::Polling
        } else {
            PollPhase::Idle
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub async fn view(&self) -> Option<QueueView> {
        self.view.read().await.clone()
    }

    pub async fn report(&self) -> CycleReport {
        self.report.read().await.clone()
    }

    fn try_begin(self: &Arc<Self>) -> Option<PollGuard> {
        self.polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollGuard {
                core: Arc::clone(self),
            })
    }

    /// Start a cycle in the background unless one is already running.
    /// Returns `false` when the trigger was skipped.
    pub fn trigger(self: &Arc<Self>, reason: &str) -> bool {
        let Some(guard) = self.try_begin() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("poll: {} while a cycle is in progress, skipping", reason);
            return false;
        };
        debug!("poll: cycle started by {}", reason);
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            core.cycle().await;
        });
        true
    }

    /// Run one cycle and record its outcome. Never fails; errors are logged.
    pub async fn cycle(&self) {
        let outcome = self.run_cycle().await;
        let mut report = self.report.write().await;
        report.last_finished = Some(Local::now());
        match outcome {
            Ok(view) => {
                report.completed += 1;
                report.last_error = None;
                report.day = view.day.clone();
                info!(
                    "poll: now playing {:?}, {} queued ahead{}",
                    view.current.as_ref().map(|c| c.title.as_str()),
                    view.entries.len(),
                    view.total_wait
                        .as_deref()
                        .map(|t| format!(", total {}", t))
                        .unwrap_or_default()
                );
                *self.view.write().await = Some(view);
            }
            Err(e) => {
                report.failed += 1;
                report.last_error = Some(format!("{:#}", e));
                error!("poll: cycle failed: {:#}", e);
            }
        }
    }

    async fn run_cycle(&self) -> anyhow::Result<QueueView> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let (announcer, (day, songs)) =
            tokio::join!(self.client.announcer_lines(), self.advance_queue(state));

        let announcer = announcer.context("fetching announcer log")?;
        let current = chat::extract_current_song(split_lines(&announcer), state);

        let queue = chat::request_titles(&songs);
        let window = current
            .as_deref()
            .and_then(|song| matcher::locate(&queue, song, state));

        Ok(QueueView::build(
            current.as_deref(),
            window.as_ref(),
            self.config.queue.average_song_minutes,
            day.map(|d| d.to_string()),
        ))
    }

    /// Queue side of a cycle. Failures degrade to the stored accumulator,
    /// or to an empty queue when the day itself is unknown.
    async fn advance_queue(
        &self,
        state: &mut QueueState<FileStore>,
    ) -> (Option<DayKey>, Vec<String>) {
        let day = match self.client.resolve_current_day().await {
            Ok(day) => day,
            Err(e) => {
                warn!("poll: could not resolve the current log day: {}", e);
                return (None, Vec::new());
            }
        };

        let marker = self.config.logs.reward_marker();
        let step = cursor::advance(state, &day, &marker, |offset| {
            self.client.channel_suffix(offset)
        })
        .await;

        if step.succeeded {
            if let Err(e) = state.prune_older_than(&day, self.config.poll.retention_days) {
                warn!("poll: pruning old days failed: {}", e);
            }
        }
        (Some(day), step.songs)
    }

    /// Drive cycles from the ticker and `event_rx` until shutdown.
    pub async fn run(self: Arc<Self>, mut event_rx: mpsc::Receiver<PollEvent>) -> anyhow::Result<()> {
        let every = Duration::from_secs(self.config.poll.interval_secs.max(1));
        info!("poll: starting loop, every {:?}", every);

        // First tick fires immediately
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger("tick");
                }
                event = event_rx.recv() => match event {
                    Some(PollEvent::Refresh) => {
                        self.trigger("refresh");
                    }
                    Some(PollEvent::Shutdown) | None => {
                        info!("poll: shutting down");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
