//! Entry point for the PDF voice reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Open the document and position the reading cursor.
//! - Optionally export the current page, then narrate with stdin controls.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use pdf_voice_reader::config::{AppConfig, DEFAULT_CONFIG_PATH, load_config};
use pdf_voice_reader::narration::pipeline::ProcessBackend;
use pdf_voice_reader::narration::voice::scan_voice_models;
use pdf_voice_reader::narration::{NarrationEvent, NarrationOutcome};
use pdf_voice_reader::reader::{ReadMode, Reader};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const CONTROL_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "pdf-voice-reader", version, about = "Read documents aloud with Piper")]
struct Cli {
    /// Document to open (PDF needs the `pdf` feature; anything else is read as text).
    #[arg(required_unless_present = "list_voices")]
    document: Option<PathBuf>,

    /// Configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Page to start at (1-based).
    #[arg(long)]
    page: Option<usize>,

    /// Piper voice model (`.onnx` with its `.onnx.json` next to it).
    #[arg(long)]
    voice: Option<PathBuf>,

    /// Speaking speed in words per minute.
    #[arg(long)]
    wpm: Option<u32>,

    /// Manual zoom; disables fitting.
    #[arg(long)]
    zoom: Option<f32>,

    /// What to read aloud.
    #[arg(long, value_enum, default_value_t = ReadChoice::None)]
    read: ReadChoice,

    /// Write the current page as PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// List installed voices and exit.
    #[arg(long)]
    list_voices: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReadChoice {
    Page,
    FromHere,
    None,
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Stop,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config);
    if let Some(wpm) = cli.wpm {
        config.wpm = wpm;
    }
    if let Some(voice) = &cli.voice {
        config.voice_model = Some(voice.clone());
    }
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        config = %cli.config.display(),
        level = %config.log_level,
        wpm = config.wpm,
        fit = %config.fit_mode,
        "Starting PDF voice reader"
    );

    if cli.list_voices {
        for voice in scan_voice_models(&config.voice_dirs) {
            println!("{}", voice.display());
        }
        return Ok(());
    }

    let document = cli
        .document
        .clone()
        .ok_or_else(|| anyhow!("Usage: pdf-voice-reader <document>"))?;

    let backend = ProcessBackend::from_argv(&config.synth_command, &config.player_command)
        .context("Invalid synth/player command in config")?;
    let (mut reader, narration_events) = Reader::new(&config, Arc::new(backend));
    reader
        .open(&document)
        .with_context(|| format!("Opening {}", document.display()))?;

    if let Some(zoom) = cli.zoom {
        reader.set_zoom(zoom);
    }
    if let Some(page) = cli.page {
        reader.go_to_page(page.saturating_sub(1));
    }
    info!(
        page = reader.current_page() + 1,
        pages = reader.page_count(),
        scale = reader.page_window().scale(),
        content_height = reader.page_window().content_height(),
        "Reading cursor positioned"
    );

    if let Some(out) = &cli.snapshot {
        write_snapshot(&reader, out)?;
    }

    let mode = match cli.read {
        ReadChoice::None => return Ok(()),
        ReadChoice::Page => ReadMode::Page(reader.current_page()),
        ReadChoice::FromHere => ReadMode::FromPage(reader.current_page()),
    };

    select_voice(&mut reader, &config)?;
    let (control_tx, control_rx) = mpsc::channel();
    install_controls(control_tx);
    reader.start_read(mode).context("Starting narration")?;
    drive_narration(&mut reader, &narration_events, &control_rx)
}

fn select_voice(reader: &mut Reader, config: &AppConfig) -> Result<()> {
    let voice = match &config.voice_model {
        Some(path) => Some(path.clone()),
        None => scan_voice_models(&config.voice_dirs).into_iter().next(),
    };
    match voice {
        Some(path) => reader
            .set_voice(&path)
            .with_context(|| format!("Selecting voice {}", path.display())),
        None => {
            warn!("No voice configured or installed; set voice_model or pass --voice");
            Ok(())
        }
    }
}

fn write_snapshot(reader: &Reader, out: &Path) -> Result<()> {
    let page = reader.current_page();
    let raster = reader
        .raster(page)
        .ok_or_else(|| anyhow!("Page {} has no raster to export", page + 1))?;
    let image = raster
        .to_rgba_image()
        .ok_or_else(|| anyhow!("Page {} raster has an unexpected layout", page + 1))?;
    image
        .save(out)
        .with_context(|| format!("Writing snapshot to {}", out.display()))?;
    info!(
        page = page + 1,
        width = raster.width,
        height = raster.height,
        path = %out.display(),
        "Wrote page snapshot"
    );
    Ok(())
}

/// Ctrl-C stops; stdin lines `p`, `r`, `s` pause, resume and stop.
fn install_controls(tx: Sender<Control>) {
    let ctrlc_tx = tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; stopping narration");
        let _ = ctrlc_tx.send(Control::Stop);
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let spawned = thread::Builder::new()
        .name("stdin-controls".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let control = match line.trim() {
                    "p" | "pause" => Control::Pause,
                    "r" | "resume" => Control::Resume,
                    "s" | "stop" | "q" => Control::Stop,
                    "" => continue,
                    other => {
                        warn!(input = other, "Unknown command; use p, r or s");
                        continue;
                    }
                };
                if tx.send(control).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        warn!("Failed to start stdin control thread: {err}");
    }
}

fn drive_narration(
    reader: &mut Reader,
    events: &Receiver<NarrationEvent>,
    controls: &Receiver<Control>,
) -> Result<()> {
    let mut total = 0usize;
    loop {
        while let Ok(control) = controls.try_recv() {
            match control {
                Control::Pause => reader.pause(),
                Control::Resume => reader.resume(),
                Control::Stop => reader.stop(),
            }
        }

        match events.recv_timeout(CONTROL_POLL) {
            Ok(NarrationEvent::Started { from, total: n, .. }) => {
                total = n;
                info!(from, total, "Narration started");
            }
            Ok(NarrationEvent::Progress { index, .. }) => {
                info!(chunk = index, total, "Narration progress");
            }
            Ok(NarrationEvent::Failed { message, .. }) => {
                reader.wait_narration();
                return Err(anyhow!("Narration failed: {message}"));
            }
            Ok(NarrationEvent::Finished { outcome, .. }) => {
                match outcome {
                    NarrationOutcome::Completed => info!("Narration completed"),
                    NarrationOutcome::Cancelled => info!("Narration stopped"),
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    reader.wait_narration();
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
