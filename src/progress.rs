//! Progress events and the sinks that receive them.
//!
//! Every stage reports through a [`Reporter`]. The reporter never fails the
//! stage: a sink that returns an error is logged and otherwise ignored.

use std::fmt::{self, Write};

use crossbeam_channel::{Sender, TrySendError};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use thiserror::Error;
use tracing::warn;

/// Whether a percentage was observed or approximated after the fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressKind {
    Measured,
    /// Emitted for tools that give no progress signal. Not real-time.
    Estimated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub message: String,
    pub percent: f64,
    pub kind: ProgressKind,
}

impl ProgressEvent {
    pub fn measured(message: impl Into<String>, percent: f64) -> Self {
        Self::new(message, percent, ProgressKind::Measured)
    }

    pub fn estimated(message: impl Into<String>, percent: f64) -> Self {
        Self::new(message, percent, ProgressKind::Estimated)
    }

    fn new(message: impl Into<String>, percent: f64, kind: ProgressKind) -> Self {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        Self { message: message.into(), percent, kind }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.message, self.percent)
    }
}

/// `i` out of `total`, as a percentage. Zero totals count as complete.
pub fn percent_of(i: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    i as f64 / total as f64 * 100.0
}

#[derive(Debug, Error)]
#[error("progress sink rejected event: {0}")]
pub struct SinkError(pub String);

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError> {
        self(event);
        Ok(())
    }
}

/// Forwards events to another thread without blocking. A full or
/// disconnected channel is reported as a sink failure.
impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError> {
        self.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError("channel full".to_string()),
            TrySendError::Disconnected(_) => SinkError("channel disconnected".to_string()),
        })
    }
}

/// Terminal progress bar for the command line. Clones share the same bar.
#[derive(Clone)]
pub struct ProgressBarSink {
    progress_bar: ProgressBar,
}

impl ProgressBarSink {
    const SCALE: u64 = 1000;

    pub fn new() -> Self {
        let progress_bar = ProgressBar::new(Self::SCALE);
        let progress_style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{wide_bar:.white/green}] {percent} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░-")
            .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
                let _ = write!(w, "({:.0}%)", state.fraction() * 100.0);
            });
        progress_bar.set_style(progress_style);
        Self { progress_bar }
    }

    pub fn finish(&self) {
        self.progress_bar.finish();
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn report(&self, event: &ProgressEvent) -> Result<(), SinkError> {
        let position = (event.percent / 100.0 * Self::SCALE as f64).round() as u64;
        self.progress_bar.set_position(position);
        match event.kind {
            ProgressKind::Measured => self.progress_bar.set_message(event.message.clone()),
            ProgressKind::Estimated => self.progress_bar.set_message(format!("{} [estimated]", event.message)),
        }
        Ok(())
    }
}

/// Single-slot progress callback shared by all stages.
#[derive(Default)]
pub struct Reporter {
    sink: Option<Box<dyn ProgressSink>>,
}

impl Reporter {
    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self { sink: Some(Box::new(sink)) }
    }

    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.report(&event) {
                warn!(error = %e, message = %event.message, "Progress sink failed");
            }
        }
    }

    pub fn report(&self, message: impl Into<String>, percent: f64) {
        self.emit(ProgressEvent::measured(message, percent));
    }

    pub fn estimate(&self, message: impl Into<String>, percent: f64) {
        self.emit(ProgressEvent::estimated(message, percent));
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").field("attached", &self.sink.is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::{Arc, Mutex};

    struct FailingSink;

    impl ProgressSink for FailingSink {
        fn report(&self, _event: &ProgressEvent) -> Result<(), SinkError> {
            Err(SinkError("window closed".to_string()))
        }
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ProgressEvent::measured("x", 140.0).percent, 100.0);
        assert_eq!(ProgressEvent::measured("x", -3.0).percent, 0.0);
        assert_eq!(ProgressEvent::measured("x", f64::NAN).percent, 0.0);
    }

    #[test]
    fn percent_of_handles_empty_total() {
        assert_eq!(percent_of(0, 0), 100.0);
        assert_eq!(percent_of(1, 4), 25.0);
    }

    #[test]
    fn closure_sink_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let reporter = Reporter::new(move |event: &ProgressEvent| {
            captured.lock().unwrap().push(event.clone());
        });

        reporter.report("Extracting", 50.0);
        reporter.estimate("Reassembling", 100.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ProgressKind::Measured);
        assert_eq!(seen[1].kind, ProgressKind::Estimated);
        assert!(seen[1].is_complete());
    }

    #[test]
    fn failing_sink_does_not_interrupt() {
        let reporter = Reporter::new(FailingSink);
        reporter.report("still going", 10.0);
        reporter.report("done", 100.0);
    }

    #[test]
    fn full_channel_is_a_sink_error_not_a_block() {
        let (sender, receiver) = bounded::<ProgressEvent>(1);
        assert!(sender.report(&ProgressEvent::measured("a", 1.0)).is_ok());
        assert!(sender.report(&ProgressEvent::measured("b", 2.0)).is_err());
        assert_eq!(receiver.recv().unwrap().message, "a");

        let reporter = Reporter::new(sender);
        reporter.report("c", 3.0);
        reporter.report("dropped", 4.0);
        assert_eq!(receiver.try_recv().unwrap().message, "c");
        assert!(receiver.try_recv().is_err());
    }
}
