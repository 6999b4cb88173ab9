//! Two-stage synthesis -> playback process pipeline.
//!
//! The synthesis process reads chunk text on stdin and writes audio to
//! stdout; that stdout is handed directly to the playback process as its
//! stdin. Both children are owned by one [`ProcessPipeline`] which has a
//! single teardown path, also run on drop.

use super::NarrationError;
use super::voice::VoiceModel;
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Grace period between the terminate signal and a forced kill.
pub const TERMINATE_GRACE: Duration = Duration::from_millis(250);
/// Poll interval while waiting for a terminated child to exit.
pub const TERMINATE_POLL: Duration = Duration::from_millis(10);

pub const MODEL_PLACEHOLDER: &str = "{model}";
pub const RATE_PLACEHOLDER: &str = "{rate}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    Success,
    Failed { diagnostic: String },
}

/// A launched pipeline for one chunk.
pub trait ActivePipeline: Send {
    /// Non-blocking completion check.
    fn try_wait(&mut self) -> Result<Option<PipelineExit>, NarrationError>;
    /// Stop both stages. Idempotent.
    fn terminate(&mut self);
}

/// Something that can speak a chunk of text.
pub trait SpeechBackend: Send + Sync {
    /// Checked once per session before the first launch.
    fn check_available(&self) -> Result<(), NarrationError> {
        Ok(())
    }

    fn launch(
        &self,
        voice: &VoiceModel,
        rate: f32,
        text: &str,
    ) -> Result<Box<dyn ActivePipeline>, NarrationError>;
}

/// Argument vector for one stage, with `{model}` and `{rate}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    program: String,
    args: Vec<String>,
}

impl StageCommand {
    pub fn from_argv(argv: &[String]) -> Result<Self, NarrationError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| NarrationError::Unexpected("empty stage command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, voice: &VoiceModel, rate: f32) -> Vec<String> {
        let model = voice.model_path().display().to_string();
        let rate = format!("{rate:.3}");
        self.args
            .iter()
            .map(|arg| {
                arg.replace(MODEL_PLACEHOLDER, &model)
                    .replace(RATE_PLACEHOLDER, &rate)
            })
            .collect()
    }
}

/// Spawns the real `piper | aplay` style pipeline.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    synth: StageCommand,
    player: StageCommand,
}

impl ProcessBackend {
    pub fn new(synth: StageCommand, player: StageCommand) -> Self {
        Self { synth, player }
    }

    pub fn from_argv(synth: &[String], player: &[String]) -> Result<Self, NarrationError> {
        Ok(Self::new(
            StageCommand::from_argv(synth)?,
            StageCommand::from_argv(player)?,
        ))
    }
}

impl SpeechBackend for ProcessBackend {
    fn check_available(&self) -> Result<(), NarrationError> {
        for stage in [&self.synth, &self.player] {
            if let Err(err) = which::which(&stage.program) {
                debug!(program = %stage.program, "Program lookup failed: {err}");
                return Err(NarrationError::MissingProgram {
                    program: stage.program.clone(),
                });
            }
        }
        Ok(())
    }

    fn launch(
        &self,
        voice: &VoiceModel,
        rate: f32,
        text: &str,
    ) -> Result<Box<dyn ActivePipeline>, NarrationError> {
        let synth_args = self.synth.render_args(voice, rate);
        let player_args = self.player.render_args(voice, rate);

        let mut synth = Command::new(&self.synth.program)
            .args(&synth_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| NarrationError::Spawn {
                program: self.synth.program.clone(),
                source,
            })?;

        let Some(audio) = synth.stdout.take() else {
            shutdown_child(&self.synth.program, &mut synth);
            return Err(NarrationError::Unexpected(
                "synthesis stdout was not captured".into(),
            ));
        };

        let player = Command::new(&self.player.program)
            .args(&player_args)
            .stdin(Stdio::from(audio))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();
        let mut player = match player {
            Ok(child) => child,
            Err(source) => {
                shutdown_child(&self.synth.program, &mut synth);
                return Err(NarrationError::Spawn {
                    program: self.player.program.clone(),
                    source,
                });
            }
        };

        let synth_stderr = synth.stderr.take().map(drain_stderr);
        let player_stderr = player.stderr.take().map(drain_stderr);

        let mut pipeline = ProcessPipeline {
            synth: Some(Stage::new(&self.synth.program, synth, synth_stderr)),
            player: Some(Stage::new(&self.player.program, player, player_stderr)),
        };

        if let Some(mut stdin) = pipeline
            .synth
            .as_mut()
            .and_then(|stage| stage.child.stdin.take())
        {
            // stdin is dropped at the end of this block, which sends EOF.
            if let Err(err) = stdin.write_all(text.as_bytes()) {
                if err.kind() == ErrorKind::BrokenPipe {
                    debug!("Synthesis stage closed stdin early");
                } else {
                    pipeline.terminate();
                    return Err(NarrationError::Process {
                        diagnostic: format!("writing chunk to {}: {err}", self.synth.program),
                    });
                }
            }
        }

        info!(
            synth = %self.synth.program,
            player = %self.player.program,
            rate,
            chars = text.len(),
            "Launched narration pipeline"
        );
        Ok(Box::new(pipeline))
    }
}

fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

struct Stage {
    program: String,
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl Stage {
    fn new(program: &str, child: Child, stderr: Option<JoinHandle<String>>) -> Self {
        Self {
            program: program.to_string(),
            child,
            stderr,
        }
    }

    /// Collected stderr; only call once the child has exited. Waits at most
    /// [`TERMINATE_GRACE`] for the pipe to close, since a descendant of the
    /// stage can hold it open after the stage itself is gone.
    fn take_stderr(&mut self) -> String {
        let Some(handle) = self.stderr.take() else {
            return String::new();
        };
        let started = Instant::now();
        while !handle.is_finished() {
            if started.elapsed() >= TERMINATE_GRACE {
                debug!(program = %self.program, "Stderr still held open; detaching reader");
                return String::new();
            }
            thread::sleep(TERMINATE_POLL);
        }
        handle.join().unwrap_or_default().trim().to_string()
    }

    fn diagnostic(&mut self, status: ExitStatus) -> String {
        let stderr = self.take_stderr();
        if stderr.is_empty() {
            format!("{} exited with {status}", self.program)
        } else {
            stderr
        }
    }
}

/// Ask a child to exit, give it [`TERMINATE_GRACE`], then kill it.
fn shutdown_child(program: &str, child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }

    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: pid belongs to a child we have not reaped yet.
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
        let started = Instant::now();
        while started.elapsed() < TERMINATE_GRACE {
            if matches!(child.try_wait(), Ok(Some(_))) {
                debug!(program, "Stage exited after terminate");
                return;
            }
            thread::sleep(TERMINATE_POLL);
        }
    }

    if let Err(err) = child.kill() {
        warn!(program, "Failed to kill stage: {err}");
    }
    let _ = child.wait();
    debug!(program, "Stage killed");
}

pub struct ProcessPipeline {
    synth: Option<Stage>,
    player: Option<Stage>,
}

impl ProcessPipeline {
    /// After the player exits, give the synthesizer the same grace period to
    /// finish on its own. Returns its status if it exited by itself.
    fn settle_synth(&mut self) -> Option<ExitStatus> {
        let stage = self.synth.as_mut()?;
        let started = Instant::now();
        loop {
            match stage.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if started.elapsed() < TERMINATE_GRACE => thread::sleep(TERMINATE_POLL),
                _ => {
                    shutdown_child(&stage.program, &mut stage.child);
                    return None;
                }
            }
        }
    }
}

impl ActivePipeline for ProcessPipeline {
    fn try_wait(&mut self) -> Result<Option<PipelineExit>, NarrationError> {
        let Some(player) = self.player.as_mut() else {
            return Err(NarrationError::Unexpected(
                "pipeline polled after teardown".into(),
            ));
        };
        let status = match player.child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(None),
            Err(err) => {
                return Err(NarrationError::Process {
                    diagnostic: format!("waiting on {}: {err}", player.program),
                });
            }
        };

        let exit = if !status.success() {
            PipelineExit::Failed {
                diagnostic: player.diagnostic(status),
            }
        } else {
            match self.settle_synth() {
                Some(synth_status) if !synth_status.success() => {
                    let diagnostic = self
                        .synth
                        .as_mut()
                        .map(|stage| stage.diagnostic(synth_status))
                        .unwrap_or_default();
                    PipelineExit::Failed { diagnostic }
                }
                _ => PipelineExit::Success,
            }
        };
        debug!(?exit, "Pipeline finished");
        self.terminate();
        Ok(Some(exit))
    }

    /// Stderr readers are detached rather than joined here.
    fn terminate(&mut self) {
        for mut stage in [self.player.take(), self.synth.take()].into_iter().flatten() {
            shutdown_child(&stage.program, &mut stage.child);
        }
    }
}

impl Drop for ProcessPipeline {
    fn drop(&mut self) {
        self.terminate();
    }
}
