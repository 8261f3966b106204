//! Progress reporting for conversions.
//!
//! The processor reports job boundaries and every line the Spine process
//! prints through a [`ConversionObserver`]. The CLI installs a console
//! observer; library users can plug in their own.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{ConversionJob, ConversionResult};

/// Which pipe a process output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives progress events from the conversion processor.
///
/// Methods are called from the processor's task and from the output reader
/// tasks, so implementations must be thread-safe. All methods default to
/// no-ops.
pub trait ConversionObserver: Send + Sync {
    /// A job is about to start. `index` is zero-based.
    fn job_started(&self, _index: usize, _total: usize, _job: &ConversionJob) {}

    /// The Spine process printed a line.
    fn output_line(&self, _stream: OutputStream, _line: &str) {}

    /// A job finished, successfully or not.
    fn job_finished(&self, _index: usize, _total: usize, _result: &ConversionResult) {}
}

/// Observer that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ConversionObserver for TracingObserver {
    fn job_started(&self, index: usize, total: usize, job: &ConversionJob) {
        info!(
            job = index + 1,
            total,
            source = %job.source.display(),
            "Starting export"
        );
    }

    fn output_line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => debug!(target: "spine", "{}", line),
            OutputStream::Stderr => debug!(target: "spine", stream = "stderr", "{}", line),
        }
    }

    fn job_finished(&self, index: usize, total: usize, result: &ConversionResult) {
        if result.success {
            info!(
                job = index + 1,
                total,
                duration_ms = result.duration_ms,
                "Export completed"
            );
        } else {
            warn!(
                job = index + 1,
                total,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Export failed"
            );
        }
    }
}

/// Event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    JobStarted { index: usize, total: usize },
    Output { stream: OutputStream, line: String },
    JobFinished { index: usize, success: bool },
}

/// Observer that stores every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of all events recorded so far.
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Output lines recorded for one stream, in arrival order.
    pub fn lines(&self, stream: OutputStream) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObserverEvent::Output { stream: s, line } if s == stream => Some(line),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObserverEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ConversionObserver for RecordingObserver {
    fn job_started(&self, index: usize, total: usize, _job: &ConversionJob) {
        self.push(ObserverEvent::JobStarted { index, total });
    }

    fn output_line(&self, stream: OutputStream, line: &str) {
        self.push(ObserverEvent::Output {
            stream,
            line: line.to_string(),
        });
    }

    fn job_finished(&self, index: usize, _total: usize, result: &ConversionResult) {
        self.push(ObserverEvent::JobFinished {
            index,
            success: result.success,
        });
    }
}
