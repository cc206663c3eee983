use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tessitura_core::{export_diagnostics, DiagnosticsInput, Event, KaraokeSession, WallClockPlayback};
use tessitura_domain_song::load_song_dir;
use tessitura_infra_audio_cpal::CpalAudioInputPort;
use tessitura_infra_storage_fs::FsStorage;
use tessitura_ports::audio::AudioInputPort;
use tessitura_ports::storage::{SettingsDto, StoragePort};
use tessitura_ports::types::{AudioInputDevice, DeviceId};

const TICK: Duration = Duration::from_millis(10);
/// Extra time after the last reference note before a bounded run stops.
const TAIL_S: f64 = 2.0;

/// Sing along to a song directory and get scored against its melody.
#[derive(Parser)]
#[command(name = "tessitura")]
#[command(about = "real-time sung-note tracking and melody scoring")]
struct Cli {
    /// song directory containing audio, lyrics.lrc and melody.csv
    #[arg(short, long)]
    song: Option<PathBuf>,

    /// input device index or name (use --list-devices to see options)
    #[arg(short, long)]
    device: Option<String>,

    /// capture sample rate in Hz
    #[arg(long)]
    samplerate: Option<u32>,

    /// analysis frame length in samples
    #[arg(long)]
    blocksize: Option<u32>,

    /// stop after this many seconds instead of at the end of the song
    #[arg(long)]
    seconds: Option<f64>,

    /// write diagnostics JSON into this directory when the session ends
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// persist the chosen device, sample rate and block size
    #[arg(long)]
    save_settings: bool,

    /// list available input devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let audio_port = CpalAudioInputPort::new();

    if cli.list_devices {
        return list_input_devices(&audio_port);
    }

    let song_dir = cli
        .song
        .clone()
        .context("--song is required unless --list-devices is given")?;

    let storage = FsStorage::default();
    let mut settings = storage.load_settings().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not read settings, using defaults");
        SettingsDto::default()
    });
    if let Some(rate) = cli.samplerate {
        settings.audio.sample_rate_hz = rate;
    }
    if let Some(block) = cli.blocksize {
        anyhow::ensure!(block >= 64, "--blocksize must be at least 64 samples");
        settings.audio.block_size_frames = block;
    }
    settings
        .validate()
        .context("invalid --samplerate/--blocksize or saved settings")?;

    let device_id = resolve_device(
        &audio_port,
        cli.device.as_deref(),
        settings.selected_audio_in.clone(),
    )?;
    settings.selected_audio_in = Some(device_id.clone());
    if cli.save_settings {
        storage
            .save_settings(&settings)
            .context("saving settings")?;
    }

    let song = load_song_dir(&song_dir)
        .with_context(|| format!("loading song from {}", song_dir.display()))?;
    tracing::info!(
        title = %song.meta.title,
        artist = song.meta.artist.as_deref().unwrap_or("unknown"),
        notes = song.melody.len(),
        lyric_lines = song.lyrics.lines().len(),
        "song loaded"
    );

    let length_s = cli.seconds.unwrap_or(song.duration_s() + TAIL_S);
    let playback = WallClockPlayback::new(Some(length_s));
    let mut session = KaraokeSession::new(song, settings.clone(), Box::new(playback));
    session
        .start(&audio_port, &device_id)
        .context("starting session")?;

    let started = Instant::now();
    while !session.is_playback_finished() {
        session.tick();
        for event in session.drain_events() {
            report(&event);
        }
        thread::sleep(TICK);
    }

    let breakdown = session.finish();
    for event in session.drain_events() {
        report(&event);
    }
    tracing::debug!(elapsed_s = started.elapsed().as_secs_f64(), "run complete");

    println!(
        "score {:.1}  (pitch {:.1}, rhythm {:.1}, {}/{} notes matched, {} sung)",
        breakdown.total,
        breakdown.pitch,
        breakdown.rhythm,
        breakdown.matched,
        breakdown.total_notes,
        session.user_notes().len()
    );

    if let Some(dir) = cli.diagnostics.as_ref() {
        let inputs = audio_port.list_inputs().unwrap_or_default();
        let matches = session.matches();
        export_diagnostics(
            dir,
            &DiagnosticsInput {
                settings: &settings,
                audio_inputs: &inputs,
                user_notes: session.user_notes(),
                matches: &matches,
                breakdown,
                dropped_samples: session.dropped_samples(),
            },
        )
        .with_context(|| format!("writing diagnostics to {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "diagnostics written");
    }

    Ok(())
}

fn list_input_devices(audio_port: &dyn AudioInputPort) -> Result<()> {
    let devices = audio_port.list_inputs()?;
    if devices.is_empty() {
        println!("no input devices found");
    }
    for (index, device) in devices.iter().enumerate() {
        println!(
            "  {}: {} ({} Hz, {} channels)",
            index, device.name, device.default_sample_rate_hz, device.default_channels
        );
    }
    Ok(())
}

/// `--device` first, then the saved device if it is still present, then the
/// system default.
fn resolve_device(
    audio_port: &dyn AudioInputPort,
    selector: Option<&str>,
    saved: Option<DeviceId>,
) -> Result<DeviceId> {
    let devices = audio_port.list_inputs()?;

    if let Some(selector) = selector {
        return pick_device(&devices, selector)
            .ok_or_else(|| anyhow::anyhow!("input device {:?} not found", selector));
    }

    if let Some(saved) = saved {
        if devices.iter().any(|device| device.id == saved) {
            return Ok(saved);
        }
        tracing::warn!(device = %saved, "saved input device is gone, using the default");
    }

    Ok(audio_port.default_input()?)
}

/// A number selects by list index. Anything else matches a device name,
/// exactly first, then as a case-insensitive substring.
fn pick_device(devices: &[AudioInputDevice], selector: &str) -> Option<DeviceId> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return devices.get(index).map(|device| device.id.clone());
    }

    let needle = selector.to_lowercase();
    devices
        .iter()
        .find(|device| device.name == selector)
        .or_else(|| {
            devices
                .iter()
                .find(|device| device.name.to_lowercase().contains(&needle))
        })
        .map(|device| device.id.clone())
}

fn report(event: &Event) {
    match event {
        Event::SessionStateUpdated { state } => tracing::info!(?state, "session state"),
        Event::NotesUpdated { latest, total_notes } => tracing::info!(
            start_s = latest.start_s,
            duration_s = latest.duration_s(),
            midi = latest.midi,
            total_notes,
            "note"
        ),
        Event::ScoreUpdated { breakdown } => tracing::info!(
            total = breakdown.total,
            matched = breakdown.matched,
            "score"
        ),
        Event::LyricsUpdated { current, next } => {
            if let Some(line) = current {
                println!("> {line}");
            }
            if let Some(line) = next {
                println!("  {line}");
            }
        }
        Event::CaptureOverflow { dropped_samples } => {
            tracing::warn!(dropped_samples, "capture overflow")
        }
        Event::FinalScore { .. } => {}
    }
}
