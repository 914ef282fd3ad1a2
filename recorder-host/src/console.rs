//! Text rendering of command results and recorder notifications.

use std::io::Write;

use parking_lot::Mutex;

use recorder_core::{
    CaptureEnd, Command, CommandOutcome, PlaybackOutcome, RecorderDelegate, RecorderError, SaveReport, SystemState,
};

/// One line (or block) describing a command result.
pub fn describe(command: &Command, result: &Result<CommandOutcome, RecorderError>) -> String {
    match result {
        Ok(CommandOutcome::RecordingStarted) => "Recording... (stop-record to finish)".into(),
        Ok(CommandOutcome::RecordingStopped { sample_count: Some(n) }) => {
            format!("Recording stopped ({} samples), saving", n)
        }
        Ok(CommandOutcome::RecordingStopped { sample_count: None }) => {
            "WARNING: recording stop was not confirmed in time".into()
        }
        Ok(CommandOutcome::Listed(entries)) if entries.is_empty() => "No recordings".into(),
        Ok(CommandOutcome::Listed(entries)) => entries
            .iter()
            .map(|e| format!("  {}  ({} bytes)", e.name, e.size_bytes))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(CommandOutcome::PlaybackStarted(name)) => format!("Playing {}", name),
        Ok(CommandOutcome::Deleted(name)) => format!("Deleted {}", name),
        Err(RecorderError::Usage(text)) => text.clone(),
        Err(e) => format!("{} failed: {}", command.name(), e),
    }
}

/// Prints notifications to a writer (stdout in the binary).
pub struct ConsoleDelegate<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleDelegate<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }
}

impl<W: Write + Send> RecorderDelegate for ConsoleDelegate<W> {
    fn on_state_changed(&self, state: SystemState) {
        log::info!("Recorder is {}", state);
    }

    fn on_capture_completed(&self, end: CaptureEnd, sample_count: usize) {
        if end == CaptureEnd::Overflow {
            self.line(&format!("Capture buffer full, recording stopped ({} samples)", sample_count));
        }
    }

    fn on_recording_saved(&self, report: &SaveReport) {
        match serde_json::to_string_pretty(report) {
            Ok(json) => self.line(&format!("Saved {}\n{}", report.file_name, json)),
            Err(_) => self.line(&format!("Saved {}", report.file_name)),
        }
    }

    fn on_playback_finished(&self, outcome: &PlaybackOutcome) {
        if let PlaybackOutcome::Completed(report) = outcome {
            self.line(&format!(
                "Finished {} ({} samples, {} chunks)",
                report.file_name,
                report.samples_played,
                report.chunks.len()
            ));
        }
    }

    fn on_error(&self, error: &RecorderError) {
        self.line(&format!("ERROR: {}", error));
    }
}
