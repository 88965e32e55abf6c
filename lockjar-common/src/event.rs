// lockjar-common/src/event.rs
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStage {
    Starting,
    Complete,
}

/// Progress reported while a resolution runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Download {
        stage: DownloadStage,
        target: String,
    },
    Log {
        source: String,
        message: String,
        /// Only surfaced by listeners running verbose.
        detail: Option<String>,
    },
    Phase {
        name: String,
    },
}

impl Event {
    pub fn download_starting(target: impl Into<String>) -> Self {
        Event::Download {
            stage: DownloadStage::Starting,
            target: target.into(),
        }
    }

    pub fn download_complete(target: impl Into<String>) -> Self {
        Event::Download {
            stage: DownloadStage::Complete,
            target: target.into(),
        }
    }

    pub fn log(source: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Log {
            source: source.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn log_with_detail(
        source: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Event::Log {
            source: source.into(),
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn phase(name: impl Into<String>) -> Self {
        Event::Phase { name: name.into() }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Download { stage, target } => write!(f, "{stage:?}: {target}"),
            Event::Log {
                source, message, ..
            } => write!(f, "{source}: {message}"),
            Event::Phase { name } => write!(f, "{name}"),
        }
    }
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);

    fn close(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl EventListener for NullListener {
    fn on_event(&self, _event: &Event) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    pub verbose: bool,
}

/// Line-oriented listener for terminals and CI logs.
pub struct ConsoleListener {
    options: ConsoleOptions,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleListener {
    pub fn new(options: ConsoleOptions) -> Self {
        Self::with_writer(options, Box::new(io::stderr()))
    }

    pub fn with_writer(options: ConsoleOptions, out: Box<dyn Write + Send>) -> Self {
        Self {
            options,
            out: Mutex::new(out),
        }
    }

    fn render(&self, event: &Event) -> Option<String> {
        match event {
            Event::Download {
                stage: DownloadStage::Starting,
                target,
            } => Some(format!("Downloading: {target}")),
            Event::Download {
                stage: DownloadStage::Complete,
                ..
            } => None,
            Event::Log {
                source,
                message,
                detail,
            } => {
                let mut line = format!("[WARNING]: {source}: {message}");
                if let (true, Some(detail)) = (self.options.verbose, detail) {
                    line.push('\n');
                    line.push_str(detail);
                }
                Some(line)
            }
            Event::Phase { name } => Some(format!("Currently: {}", name.to_lowercase())),
        }
    }
}

impl EventListener for ConsoleListener {
    fn on_event(&self, event: &Event) {
        let Some(line) = self.render(event) else {
            return;
        };
        // A poisoned writer still holds a usable stream.
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(out, "{line}") {
            debug!("Console listener write failed: {}", e);
        }
    }

    fn close(&self) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        let _ = out.flush();
    }
}

/// Collects every event; handy for assertions and for replaying a run.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}

/// Shared handle the resolver emits through. A listener that panics loses
/// that event and nothing else.
#[derive(Clone)]
pub struct EventSink {
    listener: Arc<dyn EventListener>,
}

impl EventSink {
    pub fn new(listener: Arc<dyn EventListener>) -> Self {
        Self { listener }
    }

    pub fn null() -> Self {
        Self::new(Arc::new(NullListener))
    }

    pub fn emit(&self, event: Event) {
        let listener = &self.listener;
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
        if delivered.is_err() {
            warn!("Event listener panicked; dropped event {}", event);
        }
    }

    pub fn phase(&self, name: &str) {
        self.emit(Event::phase(name));
    }

    pub fn close(&self) {
        let listener = &self.listener;
        if panic::catch_unwind(AssertUnwindSafe(|| listener.close())).is_err() {
            warn!("Event listener panicked while closing");
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}
