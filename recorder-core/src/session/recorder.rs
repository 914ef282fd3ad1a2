use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use super::capture::CapturePipeline;
use super::command::{Command, CommandOutcome};
use super::events::RecorderEvent;
use super::playback::{PlaybackParams, PlaybackSession};
use super::storage;
use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::models::records::{CompletedCapture, FileEntry, PlaybackOutcome};
use crate::models::state::{SharedState, StateFlags, StateView, SystemState};
use crate::processing::playback_cursor::PlaybackCursor;
use crate::storage::naming::FileNamer;
use crate::traits::byte_store::{ByteStore, OpenMode};
use crate::traits::capture_source::CaptureSource;
use crate::traits::playback_sink::PlaybackSink;
use crate::traits::recorder_delegate::RecorderDelegate;

/// How long the control loop waits for a command before checking events.
pub const CONTROL_POLL: Duration = Duration::from_millis(200);

/// The control state machine.
///
/// Owns the capture pipeline, the storage writer and the playback sink, and
/// is the only writer of the [`SystemState`]. Commands arrive through
/// [`handle`](Self::handle) or [`run`](Self::run); pipeline notifications
/// arrive on an internal event channel and are applied by
/// [`poll_events`](Self::poll_events) / [`next_event`](Self::next_event).
///
/// ```text
///              ┌──────────── commands ────────────┐
///              ↓                                  │
/// [capture-monitor] ──events──→ [Recorder] ←── [storage-writer]
///                                   ↑
///                     [playback-feeder] (one outcome per session)
/// ```
pub struct Recorder<C, P, S>
where
    C: CaptureSource + 'static,
    P: PlaybackSink,
    S: ByteStore + ?Sized + 'static,
{
    config: RecorderConfig,
    state: SharedState,
    capture: CapturePipeline<C>,
    sink: P,
    sink_running: bool,
    store: Arc<S>,
    namer: FileNamer,
    cursor: Arc<PlaybackCursor>,
    playback: Option<PlaybackSession>,
    captures_tx: Option<Sender<CompletedCapture>>,
    writer: Option<thread::JoinHandle<()>>,
    events_tx: Sender<RecorderEvent>,
    events_rx: Receiver<RecorderEvent>,
    delegate: Option<Arc<dyn RecorderDelegate>>,
}

impl<C, P, S> Recorder<C, P, S>
where
    C: CaptureSource + 'static,
    P: PlaybackSink,
    S: ByteStore + ?Sized + 'static,
{
    pub fn new(config: RecorderConfig, source: C, sink: P, store: Arc<S>) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;

        let namer = FileNamer::new(config.naming.clone());
        let (captures_tx, captures_rx) = bounded(1);
        let (events_tx, events_rx) = unbounded();
        let writer = storage::spawn_writer(
            Arc::clone(&store),
            namer.clone(),
            config.write_chunk_bytes,
            captures_rx,
            events_tx.clone(),
        )?;

        Ok(Self {
            capture: CapturePipeline::new(source, &config),
            config,
            state: SharedState::default(),
            sink,
            sink_running: false,
            store,
            namer,
            cursor: Arc::new(PlaybackCursor::new()),
            playback: None,
            captures_tx: Some(captures_tx),
            writer: Some(writer),
            events_tx,
            events_rx,
            delegate: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecorderDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SystemState {
        self.state.snapshot().state
    }

    pub fn flags(&self) -> StateFlags {
        self.state.snapshot()
    }

    pub fn state_view(&self) -> StateView {
        self.state.view()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn cursor(&self) -> &Arc<PlaybackCursor> {
        &self.cursor
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> Result<CommandOutcome, RecorderError> {
        log::debug!("Command: {}", command);
        match command {
            Command::StartRecord => self.start_record().map(|()| CommandOutcome::RecordingStarted),
            Command::StopRecord => self
                .stop_record()
                .map(|sample_count| CommandOutcome::RecordingStopped { sample_count }),
            Command::List => self.list().map(CommandOutcome::Listed),
            Command::Play(name) => self.play(&name).map(|()| CommandOutcome::PlaybackStarted(name)),
            Command::Delete(name) => self.delete(&name).map(|()| CommandOutcome::Deleted(name)),
        }
    }

    /// Start a capture. Transitions: idle → recording.
    pub fn start_record(&mut self) -> Result<(), RecorderError> {
        self.require("start-record", SystemState::Idle)?;
        let captures_tx = self
            .captures_tx
            .clone()
            .ok_or_else(|| RecorderError::Capture("recorder is shut down".into()))?;

        self.capture.start(captures_tx, self.events_tx.clone())?;
        self.state.update(|f| {
            f.record_done = false;
            f.playback_done = false;
        });
        self.set_state(SystemState::Recording);
        log::info!("Recording started");
        Ok(())
    }

    /// Stop the capture and wait (bounded) for it to confirm.
    /// Transitions: recording → idle, also when the wait times out.
    ///
    /// Returns the captured sample count when the capture confirmed in time.
    /// A confirmation arriving after the timeout is applied later by the
    /// event loop and never affects a newer capture.
    pub fn stop_record(&mut self) -> Result<Option<usize>, RecorderError> {
        self.require("stop-record", SystemState::Recording)?;
        self.capture.request_stop();

        let deadline = Instant::now() + self.config.stop_timeout();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(left) {
                Ok(RecorderEvent::CaptureCompleted {
                    generation,
                    end,
                    sample_count,
                }) => {
                    let current = generation == self.capture.generation();
                    self.apply(RecorderEvent::CaptureCompleted {
                        generation,
                        end,
                        sample_count,
                    });
                    if current {
                        return Ok(Some(sample_count));
                    }
                }
                Ok(other) => self.apply(other),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    log::warn!(
                        "Capture did not confirm stop within {:?}; returning to idle",
                        self.config.stop_timeout()
                    );
                    self.set_state(SystemState::Idle);
                    return Ok(None);
                }
            }
        }
    }

    /// Start playing `name`. Transitions: idle → playing.
    ///
    /// Open and header failures are reported asynchronously as a
    /// [`RecorderEvent::PlaybackFinished`] with an aborted outcome.
    pub fn play(&mut self, name: &str) -> Result<(), RecorderError> {
        self.require("play", SystemState::Idle)?;
        self.reap_playback();

        self.state.update(|f| f.playback_done = false);
        self.cursor.reset();
        if !self.sink_running {
            self.sink.start(Arc::clone(&self.cursor))?;
            self.sink_running = true;
        }

        self.set_state(SystemState::Playing);
        let params = PlaybackParams::from_config(name, &self.config);
        match PlaybackSession::start(
            Arc::clone(&self.store),
            params,
            Arc::clone(&self.cursor),
            self.state.view(),
            self.events_tx.clone(),
        ) {
            Ok(session) => {
                log::info!("Playing {}", name);
                self.playback = Some(session);
                Ok(())
            }
            Err(e) => {
                self.stop_sink();
                self.set_state(SystemState::Idle);
                Err(e)
            }
        }
    }

    /// Report the candidate names that exist, with their sizes. Valid in any state.
    ///
    /// Covers at least `list_limit` candidates and every name the counter has
    /// already passed.
    pub fn list(&self) -> Result<Vec<FileEntry>, RecorderError> {
        let limit = self.config.list_limit.max(self.namer.next_counter());
        let mut entries = Vec::new();
        for name in self.namer.candidates(limit) {
            let file = match self.store.open(&name, OpenMode::Read) {
                Ok(file) => file,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            let size = file.len();
            if let Err(e) = file.close() {
                log::warn!("Failed to close {}: {}", name, e);
            }
            entries.push(FileEntry {
                name,
                size_bytes: size?,
            });
        }
        Ok(entries)
    }

    /// Remove a stored file. Valid in any state.
    pub fn delete(&self, name: &str) -> Result<(), RecorderError> {
        self.store.remove(name)?;
        log::info!("Deleted {}", name);
        Ok(())
    }

    /// Apply every pending pipeline event and return them.
    pub fn poll_events(&mut self) -> Vec<RecorderEvent> {
        let pending: Vec<RecorderEvent> = self.events_rx.try_iter().collect();
        for event in &pending {
            self.apply(event.clone());
        }
        pending
    }

    /// Wait up to `timeout` for the next pipeline event and apply it.
    pub fn next_event(&mut self, timeout: Duration) -> Option<RecorderEvent> {
        let event = self.events_rx.recv_timeout(timeout).ok()?;
        self.apply(event.clone());
        Some(event)
    }

    /// Apply events until `done` accepts one or `timeout` passes.
    pub fn wait_for(&mut self, timeout: Duration, mut done: impl FnMut(&RecorderEvent) -> bool) -> Option<RecorderEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return None;
            }
            if let Some(event) = self.next_event(left) {
                if done(&event) {
                    return Some(event);
                }
            }
        }
    }

    /// Serve commands until the channel closes, applying pipeline events in
    /// between. `on_result` sees every command with its result.
    pub fn run(
        &mut self,
        commands: &Receiver<Command>,
        mut on_result: impl FnMut(&Command, &Result<CommandOutcome, RecorderError>),
    ) {
        loop {
            match commands.recv_timeout(CONTROL_POLL) {
                Ok(command) => {
                    let result = self.handle(command.clone());
                    if let Err(e) = &result {
                        log::warn!("'{}' failed: {}", command, e);
                    }
                    on_result(&command, &result);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.poll_events();
        }
        self.shutdown();
    }

    /// Stop any capture, cancel playback and wait for the storage writer to
    /// finish pending saves.
    pub fn shutdown(&mut self) {
        if self.state().is_recording() {
            if let Err(e) = self.stop_record() {
                log::warn!("Failed to stop recording during shutdown: {}", e);
            }
        }
        if let Some(session) = &self.playback {
            session.cancel();
        }
        if self.playback.is_some() {
            let _ = self.wait_for(self.config.handoff_timeout() * 2, |e| {
                matches!(e, RecorderEvent::PlaybackFinished(_))
            });
            self.reap_playback();
        }
        self.stop_sink();
        self.capture.join();

        self.captures_tx = None;
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::error!("Storage writer panicked");
            }
        }
        self.poll_events();
        if !self.state().is_idle() {
            self.set_state(SystemState::Idle);
        }
    }

    // --- Internal helpers ---

    fn require(&self, command: &str, required: SystemState) -> Result<(), RecorderError> {
        let current = self.state();
        if current != required {
            log::warn!("Rejected '{}' while {}", command, current);
            return Err(RecorderError::InvalidState {
                command: command.into(),
                state: current.to_string(),
            });
        }
        Ok(())
    }

    fn set_state(&self, new_state: SystemState) {
        let previous = self.state.snapshot().state;
        self.state.update(|f| f.state = new_state);
        if previous != new_state {
            log::debug!("State {} -> {}", previous, new_state);
            if let Some(ref delegate) = self.delegate {
                delegate.on_state_changed(new_state);
            }
        }
    }

    fn apply(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::CaptureCompleted {
                generation,
                end,
                sample_count,
            } => {
                if generation == self.capture.generation() {
                    self.capture.join();
                    self.state.update(|f| f.record_done = true);
                    if self.state().is_recording() {
                        self.set_state(SystemState::Idle);
                    }
                } else {
                    log::info!("Late completion of capture {} ({} samples)", generation, sample_count);
                }
                if let Some(ref delegate) = self.delegate {
                    delegate.on_capture_completed(end, sample_count);
                }
            }
            RecorderEvent::RecordingSaved(report) => {
                if let Some(ref delegate) = self.delegate {
                    delegate.on_recording_saved(&report);
                }
            }
            RecorderEvent::SaveFailed(error) => {
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(&error);
                }
            }
            RecorderEvent::PlaybackFinished(outcome) => {
                self.reap_playback();
                self.stop_sink();
                self.state.update(|f| f.playback_done = true);
                if self.state().is_playing() {
                    self.set_state(SystemState::Idle);
                }
                if let Some(ref delegate) = self.delegate {
                    delegate.on_playback_finished(&outcome);
                    if let PlaybackOutcome::Aborted(reason) = outcome {
                        delegate.on_error(&reason.into_error());
                    }
                }
            }
        }
    }

    fn reap_playback(&mut self) {
        if let Some(mut session) = self.playback.take() {
            session.join();
        }
    }

    fn stop_sink(&mut self) {
        if self.sink_running {
            if let Err(e) = self.sink.stop() {
                log::warn!("Failed to stop playback sink: {}", e);
            }
            self.sink_running = false;
        }
    }
}

impl<C, P, S> Drop for Recorder<C, P, S>
where
    C: CaptureSource + 'static,
    P: PlaybackSink,
    S: ByteStore + ?Sized + 'static,
{
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.shutdown();
        }
    }
}
