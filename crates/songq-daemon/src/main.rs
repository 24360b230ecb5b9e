mod core;
mod http;
mod logs;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use songq_core::config::Config;
use songq_core::store::FileStore;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Most recent WARN/ERROR lines, newest last, for `/api/status`.
#[derive(Clone)]
pub struct RecentWarnings {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl RecentWarnings {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        // A poisoned lock only means a panicking writer; the lines are still fine
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }
}

/// A tracing layer that copies WARN and ERROR events into [`RecentWarnings`].
struct RecentWarningsLayer {
    warnings: RecentWarnings,
}

impl<S> tracing_subscriber::Layer<S> for RecentWarningsLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        self.warnings.push(message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let warnings = RecentWarnings::new(50);

    // Setup file logging + stderr + recent warnings
    let data_dir = songq_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {:?}", data_dir))?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Keep connection-level chatter from the HTTP stack out of the default output
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(RecentWarningsLayer {
            warnings: warnings.clone(),
        })
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,songq_daemon=debug,songq_core=debug,hyper_util=warn,reqwest=warn",
                )
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());
    info!(
        "Following #{} (announcer {}) on {}",
        config.logs.channel, config.logs.announcer, config.logs.base_url
    );

    let store = FileStore::open(&config.daemon.state_file)
        .with_context(|| format!("opening state file {:?}", config.daemon.state_file))?;
    info!("State file: {:?}", store.path());

    let client = logs::LogClient::new(&config.logs)?;
    let core = Arc::new(core::PollCore::new(config.clone(), client, store));

    let (event_tx, event_rx) = mpsc::channel::<core::PollEvent>(16);

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            core.clone(),
            event_tx.clone(),
            warnings.clone(),
        );
    }

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(core::PollEvent::Shutdown).await;
        }
    });

    core.run(event_rx).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_warnings_is_bounded() {
        let warnings = RecentWarnings::new(2);
        warnings.push("a".into());
        warnings.push("b".into());
        warnings.push("c".into());
        assert_eq!(warnings.snapshot(), vec!["b".to_string(), "c".to_string()]);
    }
}
