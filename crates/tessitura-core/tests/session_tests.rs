use approx::assert_abs_diff_eq;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessitura_core::{Event, KaraokeSession, SessionError, SessionState};
use tessitura_domain_song::{LyricLine, Lyrics, Melody, ReferenceNote, Song, SongMeta};
use tessitura_ports::audio::{AudioCaptureCallback, AudioError, AudioInputPort, AudioStreamHandle};
use tessitura_ports::playback::{PlaybackError, PlaybackPort};
use tessitura_ports::storage::SettingsDto;
use tessitura_ports::types::{AudioConfig, AudioInputDevice, DeviceId};

const SAMPLE_RATE: u32 = 44_100;
const BLOCK: usize = 1024;

type SharedCallback = Arc<Mutex<Option<Box<dyn AudioCaptureCallback>>>>;

/// Input port that hands the capture callback back to the test.
#[derive(Default)]
struct FakeInput {
    callback: SharedCallback,
    closed: Arc<AtomicBool>,
}

struct FakeStream {
    callback: SharedCallback,
    closed: Arc<AtomicBool>,
}

impl AudioStreamHandle for FakeStream {
    fn close(self: Box<Self>) {
        self.callback.lock().take();
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl AudioInputPort for FakeInput {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError> {
        Ok(vec![AudioInputDevice {
            id: DeviceId("fake:0".to_string()),
            name: "Fake microphone".to_string(),
            default_sample_rate_hz: SAMPLE_RATE,
            default_channels: 1,
        }])
    }

    fn default_input(&self) -> Result<DeviceId, AudioError> {
        Ok(DeviceId("fake:0".to_string()))
    }

    fn open_input(
        &self,
        _device_id: &DeviceId,
        _config: AudioConfig,
        cb: Box<dyn AudioCaptureCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        *self.callback.lock() = Some(cb);
        self.closed.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            callback: self.callback.clone(),
            closed: self.closed.clone(),
        }))
    }
}

impl FakeInput {
    /// Delivers `samples` in device-sized chunks, like a capture thread would.
    fn feed(&self, samples: &[f32]) {
        let mut guard = self.callback.lock();
        let Some(cb) = guard.as_mut() else {
            panic!("capture stream not open");
        };
        for (i, chunk) in samples.chunks(512).enumerate() {
            cb.capture((i * 512) as u64, chunk);
        }
    }
}

/// Playback with no position, so the clock runs purely on captured samples.
struct SilentPlayback {
    fail_play: bool,
}

impl PlaybackPort for SilentPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        if self.fail_play {
            Err(PlaybackError::Backend("no output device".to_string()))
        } else {
            Ok(())
        }
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn position_s(&self) -> Option<f64> {
        None
    }

    fn is_finished(&self) -> bool {
        false
    }
}

/// Playback that reports a scripted position per tick, then `None`.
struct ScriptedPlayback {
    positions: Mutex<VecDeque<Option<f64>>>,
}

impl PlaybackPort for ScriptedPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn position_s(&self) -> Option<f64> {
        self.positions.lock().pop_front().flatten()
    }

    fn is_finished(&self) -> bool {
        self.positions.lock().is_empty()
    }
}

fn song(notes: Vec<ReferenceNote>, lyrics: Vec<LyricLine>) -> Song {
    Song {
        root: PathBuf::from("songs/test"),
        audio_path: PathBuf::from("songs/test/audio.wav"),
        meta: SongMeta {
            title: "test".to_string(),
            artist: None,
            audio_offset_s: 0.0,
        },
        lyrics: Lyrics::new(lyrics),
        melody: Melody::new(notes),
    }
}

fn settings(sample_rate_hz: u32) -> SettingsDto {
    SettingsDto {
        audio: AudioConfig {
            sample_rate_hz,
            block_size_frames: BLOCK as u32,
            ..AudioConfig::default()
        },
        ..SettingsDto::default()
    }
}

fn session(song: Song, sample_rate_hz: u32) -> KaraokeSession {
    KaraokeSession::new(
        song,
        settings(sample_rate_hz),
        Box::new(SilentPlayback { fail_play: false }),
    )
}

/// Quiet pre-roll, a loud 440 Hz tone over `tone_frames`, then silence.
fn take(quiet_frames: usize, tone_frames: usize, silent_frames: usize) -> Vec<f32> {
    let total = (quiet_frames + tone_frames + silent_frames) * BLOCK;
    let tone_start = quiet_frames * BLOCK;
    let tone_end = tone_start + tone_frames * BLOCK;
    (0..total)
        .map(|i| {
            let level = if i < tone_start {
                0.001
            } else if i < tone_end {
                0.3
            } else {
                0.0
            };
            level * (TAU * 440.0 * i as f32 / SAMPLE_RATE as f32).sin()
        })
        .collect()
}

fn frame_time(frame: usize) -> f64 {
    (frame * BLOCK) as f64 / SAMPLE_RATE as f64
}

#[test]
fn sung_tone_becomes_a_scored_note() {
    let input = FakeInput::default();
    let mut session = session(
        song(
            vec![
                ReferenceNote::new(0.25, 0.3, 69.0),
                ReferenceNote::new(2.0, 0.5, 72.0),
            ],
            Vec::new(),
        ),
        SAMPLE_RATE,
    );
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");
    assert_eq!(session.state(), SessionState::Running);

    input.feed(&take(10, 15, 20));
    assert_eq!(session.tick(), 45);

    let notes = session.user_notes().to_vec();
    assert_eq!(notes.len(), 1);
    assert_abs_diff_eq!(notes[0].start_s, frame_time(10), epsilon = 1e-9);
    assert_abs_diff_eq!(notes[0].end_s, frame_time(24), epsilon = 1e-9);
    assert_abs_diff_eq!(notes[0].midi, 69.0, epsilon = 0.1);

    let breakdown = session.finish();
    assert!(input.closed.load(Ordering::SeqCst));
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(breakdown.matched, 1);
    assert_eq!(breakdown.total_notes, 2);
    assert!(breakdown.total > 85.0, "total {}", breakdown.total);
    assert!(breakdown.pitch > 90.0, "pitch {}", breakdown.pitch);

    let matches = session.matches();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].reference_index, 0);

    let events = session.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::NotesUpdated { total_notes: 1, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ScoreUpdated { breakdown } if breakdown.matched == 1)));
    assert_eq!(
        events.last(),
        Some(&Event::SessionStateUpdated {
            state: SessionState::Finished
        })
    );
}

#[test]
fn finish_flushes_a_note_still_being_sung() {
    let input = FakeInput::default();
    let mut session = session(song(vec![ReferenceNote::new(0.0, 1.0, 69.0)], Vec::new()), SAMPLE_RATE);
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");

    input.feed(&take(5, 12, 0));
    session.tick();
    assert!(session.user_notes().is_empty());

    let breakdown = session.finish();
    assert_eq!(session.user_notes().len(), 1);
    assert_eq!(breakdown.matched, 1);

    // A second finish is a no-op.
    assert_eq!(session.finish(), breakdown);
}

#[test]
fn silence_scores_zero() {
    let input = FakeInput::default();
    let mut session = session(song(vec![ReferenceNote::new(0.5, 0.5, 60.0)], Vec::new()), SAMPLE_RATE);
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");

    input.feed(&vec![0.0; 30 * BLOCK]);
    session.tick();
    let breakdown = session.finish();

    assert!(session.user_notes().is_empty());
    assert_eq!(breakdown.total, 0.0);
    assert_eq!(breakdown.matched, 0);
    assert_eq!(breakdown.total_notes, 1);
}

#[test]
fn overflow_is_reported_once_per_change() {
    let input = FakeInput::default();
    // Two seconds at 8 kHz is 16000 samples of ring.
    let mut session = session(song(Vec::new(), Vec::new()), 8_000);
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");

    input.feed(&vec![0.0; 20_000]);
    session.tick();
    assert_eq!(session.dropped_samples(), 4_000);

    let overflows: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::CaptureOverflow { .. }))
        .collect();
    assert_eq!(
        overflows,
        vec![Event::CaptureOverflow {
            dropped_samples: 4_000
        }]
    );

    session.tick();
    assert!(!session
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::CaptureOverflow { .. })));
}

#[test]
fn lyrics_follow_the_clock() {
    let input = FakeInput::default();
    let lyrics = vec![
        LyricLine {
            time_s: 0.0,
            text: "first line".to_string(),
        },
        LyricLine {
            time_s: 0.5,
            text: "second line".to_string(),
        },
    ];
    let mut session = session(song(Vec::new(), lyrics), SAMPLE_RATE);
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");

    session.tick();
    let lyric_events: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::LyricsUpdated { .. }))
        .collect();
    assert_eq!(
        lyric_events,
        vec![Event::LyricsUpdated {
            current: Some("first line".to_string()),
            next: Some("second line".to_string()),
        }]
    );

    // 30 frames is about 0.7s.
    input.feed(&vec![0.0; 30 * BLOCK]);
    session.tick();
    let lyric_events: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::LyricsUpdated { .. }))
        .collect();
    assert_eq!(
        lyric_events,
        vec![Event::LyricsUpdated {
            current: Some("second line".to_string()),
            next: None,
        }]
    );
}

#[test]
fn second_start_is_rejected() {
    let input = FakeInput::default();
    let mut session = session(song(Vec::new(), Vec::new()), SAMPLE_RATE);
    let device = DeviceId("fake:0".to_string());
    session.start(&input, &device).expect("session starts");

    assert!(matches!(
        session.start(&input, &device),
        Err(SessionError::AlreadyStarted)
    ));
}

#[test]
fn failed_playback_releases_the_device() {
    let input = FakeInput::default();
    let mut session = KaraokeSession::new(
        song(Vec::new(), Vec::new()),
        settings(SAMPLE_RATE),
        Box::new(SilentPlayback { fail_play: true }),
    );

    let result = session.start(&input, &DeviceId("fake:0".to_string()));
    assert!(matches!(result, Err(SessionError::Playback(_))));
    assert!(input.closed.load(Ordering::SeqCst));
    assert!(input.callback.lock().is_none());
}

#[test]
fn dropping_a_running_session_closes_capture() {
    let input = FakeInput::default();
    {
        let mut session = session(song(Vec::new(), Vec::new()), SAMPLE_RATE);
        session
            .start(&input, &DeviceId("fake:0".to_string()))
            .expect("session starts");
        assert!(!input.closed.load(Ordering::SeqCst));
    }
    assert!(input.closed.load(Ordering::SeqCst));
}

#[test]
fn tick_nudges_toward_playback_only_when_a_position_is_reported() {
    let input = FakeInput::default();
    let playback = ScriptedPlayback {
        positions: Mutex::new(VecDeque::from([Some(1.0), None, Some(2.0)])),
    };
    let mut session = KaraokeSession::new(
        song(Vec::new(), Vec::new()),
        settings(SAMPLE_RATE),
        Box::new(playback),
    );
    session
        .start(&input, &DeviceId("fake:0".to_string()))
        .expect("session starts");

    // No audio yet: only the 5% pull toward 1.0s moves the clock.
    assert_eq!(session.tick(), 0);
    assert_abs_diff_eq!(session.clock_s(), 0.05, epsilon = 1e-12);

    // No reading: the clock moves by the captured frame alone.
    input.feed(&vec![0.0; BLOCK]);
    assert_eq!(session.tick(), 1);
    let after_frame = 0.05 + frame_time(1);
    assert_abs_diff_eq!(session.clock_s(), after_frame, epsilon = 1e-12);

    session.tick();
    assert_abs_diff_eq!(
        session.clock_s(),
        after_frame + (2.0 - after_frame) * 0.05,
        epsilon = 1e-12
    );
    assert!(session.is_playback_finished());
}

#[test]
fn invalid_audio_settings_are_rejected_before_the_device_opens() {
    let input = FakeInput::default();
    let mut bad = settings(SAMPLE_RATE);
    bad.audio.max_freq_hz = 0.0;
    let mut session = KaraokeSession::new(
        song(Vec::new(), Vec::new()),
        bad,
        Box::new(SilentPlayback { fail_play: false }),
    );

    let result = session.start(&input, &DeviceId("fake:0".to_string()));
    assert!(matches!(result, Err(SessionError::Config(_))));
    assert!(input.callback.lock().is_none());
    assert_eq!(session.state(), SessionState::Idle);
}
