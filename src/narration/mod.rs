//! Narration engine: speaks a queue of text chunks through a
//! synthesis/playback pipeline on a dedicated worker thread.
//!
//! One session runs at a time. Starting a new session stops the previous
//! one and waits for its worker to exit before the new worker is spawned,
//! so terminal events from the old session always precede the new
//! `Started` event. Every event carries the id of the session it belongs
//! to.
//!
//! Pausing tears down the running pipeline without advancing the chunk
//! index; resuming speaks the same chunk again from its beginning.

pub mod pipeline;
pub mod voice;

use crate::cancellation::{CancellationToken, PauseGate};
use pipeline::{ActivePipeline, PipelineExit, SpeechBackend};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use voice::VoiceModel;

/// Words per minute that maps to the voice's natural rate.
pub const BASELINE_WPM: u32 = 170;
pub const MIN_RATE: f32 = 0.6;
pub const MAX_RATE: f32 = 2.0;
/// Poll interval while a chunk is playing.
pub const DRAIN_POLL: Duration = Duration::from_millis(10);
/// Poll interval while paused.
pub const PAUSE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("invalid voice config {}: {reason}", path.display())]
    InvalidVoiceConfig { path: PathBuf, reason: String },

    #[error("no voice selected")]
    NoVoice,

    #[error("required program `{program}` not found in PATH")]
    MissingProgram { program: String },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{diagnostic}")]
    Process { diagnostic: String },

    #[error("unexpected narration failure: {0}")]
    Unexpected(String),
}

/// Length-scale parameter for the synthesizer. Higher WPM gives a smaller
/// value (faster speech); zero WPM means the natural rate.
pub fn rate_from_wpm(wpm: u32) -> f32 {
    if wpm == 0 {
        return 1.0;
    }
    (BASELINE_WPM as f32 / wpm as f32).clamp(MIN_RATE, MAX_RATE)
}

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationState {
    Idle,
    Running,
    Paused,
    Finished(NarrationOutcome),
    Failed(String),
}

impl NarrationState {
    pub fn is_active(&self) -> bool {
        matches!(self, NarrationState::Running | NarrationState::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationEvent {
    Started {
        session: SessionId,
        from: usize,
        total: usize,
    },
    /// `index` is the chunk that will play next (completed chunks + start).
    Progress { session: SessionId, index: usize },
    Failed { session: SessionId, message: String },
    Finished {
        session: SessionId,
        outcome: NarrationOutcome,
    },
}

struct Shared {
    state: Mutex<NarrationState>,
    index: AtomicUsize,
    wpm: AtomicU32,
}

impl Shared {
    fn state(&self) -> NarrationState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, state: NarrationState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Swap `from` for `to`; false when the state was something else.
    fn transition(&self, from: &NarrationState, to: NarrationState) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if &*guard == from {
            *guard = to;
            true
        } else {
            false
        }
    }
}

struct Session {
    id: SessionId,
    chunks: Arc<Vec<String>>,
    stop: CancellationToken,
    gate: PauseGate,
    handle: Option<JoinHandle<()>>,
}

pub struct NarrationEngine {
    backend: Arc<dyn SpeechBackend>,
    voice: Option<VoiceModel>,
    shared: Arc<Shared>,
    events: Sender<NarrationEvent>,
    session: Option<Session>,
    next_session: SessionId,
}

impl NarrationEngine {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> (Self, Receiver<NarrationEvent>) {
        let (tx, rx) = mpsc::channel();
        let engine = Self {
            backend,
            voice: None,
            shared: Arc::new(Shared {
                state: Mutex::new(NarrationState::Idle),
                index: AtomicUsize::new(0),
                wpm: AtomicU32::new(BASELINE_WPM),
            }),
            events: tx,
            session: None,
            next_session: 1,
        };
        (engine, rx)
    }

    /// Validate and select a voice. On error the previous voice is kept.
    pub fn set_voice(&mut self, path: &Path) -> Result<(), NarrationError> {
        let voice = VoiceModel::validate(path)?;
        info!(voice = %voice.name(), "Selected voice");
        self.voice = Some(voice);
        Ok(())
    }

    pub fn voice(&self) -> Option<&VoiceModel> {
        self.voice.as_ref()
    }

    /// Applies from the next chunk on.
    pub fn set_wpm(&self, wpm: u32) {
        self.shared.wpm.store(wpm, Ordering::Relaxed);
        debug!(wpm, rate = rate_from_wpm(wpm), "Updated narration speed");
    }

    pub fn wpm(&self) -> u32 {
        self.shared.wpm.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> NarrationState {
        self.shared.state()
    }

    pub fn current_index(&self) -> usize {
        self.shared.index.load(Ordering::Acquire)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Start speaking `chunks` from `from`. Any running session is stopped
    /// and joined first. A selected voice is re-validated; if that fails
    /// nothing is started.
    pub fn start(&mut self, chunks: Vec<String>, from: usize) -> Result<SessionId, NarrationError> {
        if let Some(voice) = &self.voice {
            self.voice = Some(VoiceModel::validate(voice.model_path())?);
        }
        self.shutdown_session();

        let id = self.next_session;
        self.next_session += 1;
        let from = from.min(chunks.len());
        let total = chunks.len();

        self.shared.index.store(from, Ordering::Release);
        self.shared.set_state(NarrationState::Running);
        let _ = self.events.send(NarrationEvent::Started {
            session: id,
            from,
            total,
        });
        info!(session = id, from, total, "Starting narration session");

        let mut session = Session {
            id,
            chunks: Arc::new(chunks),
            stop: CancellationToken::new(),
            gate: PauseGate::new(),
            handle: None,
        };
        session.handle = Some(self.spawn_worker(&session)?);
        self.session = Some(session);
        Ok(id)
    }

    fn spawn_worker(&self, session: &Session) -> Result<JoinHandle<()>, NarrationError> {
        let worker = Worker {
            session: session.id,
            chunks: session.chunks.clone(),
            backend: self.backend.clone(),
            voice: self.voice.clone(),
            stop: session.stop.clone(),
            gate: session.gate.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
        };
        thread::Builder::new()
            .name(format!("narration-{}", session.id))
            .spawn(move || worker.run())
            .map_err(|err| {
                let message = format!("spawning narration worker: {err}");
                self.shared.set_state(NarrationState::Failed(message.clone()));
                let _ = self.events.send(NarrationEvent::Failed {
                    session: session.id,
                    message: message.clone(),
                });
                NarrationError::Unexpected(message)
            })
    }

    /// Pause a running session. The current chunk is cut off and will be
    /// spoken again from its start on resume.
    pub fn pause(&self) {
        let Some(session) = &self.session else {
            return;
        };
        if self
            .shared
            .transition(&NarrationState::Running, NarrationState::Paused)
        {
            session.gate.pause();
            info!(session = session.id, index = self.current_index(), "Narration paused");
        }
    }

    /// Resume a paused session. Finished or failed sessions stay as they are.
    pub fn resume(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if !self
            .shared
            .transition(&NarrationState::Paused, NarrationState::Running)
        {
            return;
        }
        session.gate.resume();
        info!(session = session.id, index = self.current_index(), "Narration resumed");

        let worker_gone = session
            .handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true);
        if worker_gone {
            warn!(session = session.id, "Worker not running on resume; restarting it");
            let restarted = self.spawn_worker(session);
            if let (Ok(handle), Some(session)) = (restarted, self.session.as_mut()) {
                if let Some(old) = session.handle.replace(handle) {
                    let _ = old.join();
                }
            }
        }
    }

    /// Ask the current session to stop. Returns immediately; the worker
    /// tears down the pipeline and emits `Finished(Cancelled)`.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            session.stop.cancel();
            session.gate.notify();
            debug!(session = session.id, "Stop requested");
        }
    }

    /// Block until the current session's worker has exited.
    pub fn join(&mut self) {
        if let Some(handle) = self.session.as_mut().and_then(|s| s.handle.take()) {
            if handle.join().is_err() {
                warn!("Narration worker thread panicked outside the session guard");
            }
        }
    }

    fn shutdown_session(&mut self) {
        self.stop();
        self.join();
        self.session = None;
    }
}

impl Drop for NarrationEngine {
    fn drop(&mut self) {
        self.shutdown_session();
    }
}

struct Worker {
    session: SessionId,
    chunks: Arc<Vec<String>>,
    backend: Arc<dyn SpeechBackend>,
    voice: Option<VoiceModel>,
    stop: CancellationToken,
    gate: PauseGate,
    shared: Arc<Shared>,
    events: Sender<NarrationEvent>,
}

impl Worker {
    fn run(self) {
        let mut active: Option<Box<dyn ActivePipeline>> = None;
        let result = catch_unwind(AssertUnwindSafe(|| self.drive(&mut active)));

        if let Some(mut pipeline) = active.take() {
            pipeline.terminate();
        }

        let (state, event) = match result {
            Ok(Ok(outcome)) => (
                NarrationState::Finished(outcome),
                NarrationEvent::Finished {
                    session: self.session,
                    outcome,
                },
            ),
            Ok(Err(err)) => self.failure(err.to_string()),
            Err(payload) => self.failure(
                NarrationError::Unexpected(panic_message(payload.as_ref())).to_string(),
            ),
        };

        match &state {
            NarrationState::Failed(message) => {
                warn!(session = self.session, "Narration failed: {message}")
            }
            _ => info!(session = self.session, ?state, "Narration session ended"),
        }
        self.shared.set_state(state);
        let _ = self.events.send(event);
    }

    fn failure(&self, message: String) -> (NarrationState, NarrationEvent) {
        (
            NarrationState::Failed(message.clone()),
            NarrationEvent::Failed {
                session: self.session,
                message,
            },
        )
    }

    fn drive(
        &self,
        active: &mut Option<Box<dyn ActivePipeline>>,
    ) -> Result<NarrationOutcome, NarrationError> {
        if !self.chunks.is_empty() {
            self.backend.check_available()?;
        }

        loop {
            if self.stop.is_cancelled() {
                return Ok(NarrationOutcome::Cancelled);
            }
            let index = self.shared.index.load(Ordering::Acquire);
            if index >= self.chunks.len() {
                return Ok(NarrationOutcome::Completed);
            }
            if self.gate.is_paused() {
                self.gate.wait(PAUSE_POLL);
                continue;
            }

            let voice = self.voice.as_ref().ok_or(NarrationError::NoVoice)?;
            let rate = rate_from_wpm(self.shared.wpm.load(Ordering::Relaxed));
            debug!(session = self.session, index, rate, "Speaking chunk");
            let pipeline = active.insert(self.backend.launch(voice, rate, &self.chunks[index])?);

            let interrupted = loop {
                if self.stop.is_cancelled() || self.gate.is_paused() {
                    break true;
                }
                match pipeline.try_wait()? {
                    Some(PipelineExit::Success) => break false,
                    Some(PipelineExit::Failed { diagnostic }) => {
                        return Err(NarrationError::Process { diagnostic });
                    }
                    None => self.gate.wait(DRAIN_POLL),
                }
            };

            if let Some(mut pipeline) = active.take() {
                pipeline.terminate();
            }
            if interrupted {
                debug!(session = self.session, index, "Chunk interrupted");
                continue;
            }

            let next = index + 1;
            self.shared.index.store(next, Ordering::Release);
            let _ = self.events.send(NarrationEvent::Progress {
                session: self.session,
                index: next,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
