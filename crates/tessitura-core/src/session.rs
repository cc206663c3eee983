use crate::capture::{capture_queue, CaptureSink, CaptureStats, FrameReader};
use crate::clock::PlaybackClock;
use crate::ipc::{Event, SessionState};
use std::collections::VecDeque;
use std::sync::Arc;
use tessitura_domain_eval::{match_notes, score_notes, NoteMatch, ScoreBreakdown};
use tessitura_domain_pitch::{NoteTracker, PitchEstimator, PitchEstimatorConfig, UserNote};
use tessitura_domain_song::{Lyrics, Melody, Song, SongLoadError};
use tessitura_ports::audio::{AudioError, AudioInputPort, AudioStreamHandle};
use tessitura_ports::playback::{PlaybackError, PlaybackPort};
use tessitura_ports::storage::{SettingsDto, StorageError};
use tessitura_ports::types::{ConfigError, DeviceId};

/// Seconds of audio the capture ring holds before it starts dropping.
const CAPTURE_BUFFER_S: u32 = 2;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("song load failed: {0}")]
    Song(#[from] SongLoadError),
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("session already started")]
    AlreadyStarted,
}

/// One sing-along run: capture in, notes and score out.
///
/// The capture callback only feeds the sample ring. Everything else (clock,
/// pitch estimation, note tracking, scoring) runs on the thread that calls
/// [`KaraokeSession::tick`].
pub struct KaraokeSession {
    settings: SettingsDto,
    melody: Melody,
    lyrics: Lyrics,
    audio_offset_s: f64,
    playback: Box<dyn PlaybackPort>,
    clock: PlaybackClock,
    estimator: PitchEstimator,
    tracker: NoteTracker,
    reader: FrameReader,
    stats: Arc<CaptureStats>,
    sink: Option<CaptureSink>,
    stream: Option<Box<dyn AudioStreamHandle>>,
    user_notes: Vec<UserNote>,
    breakdown: ScoreBreakdown,
    scored_note_count: usize,
    state: SessionState,
    events: VecDeque<Event>,
    reported_dropped: u64,
    lyric_cursor: (Option<usize>, Option<usize>),
}

impl KaraokeSession {
    pub fn new(song: Song, settings: SettingsDto, playback: Box<dyn PlaybackPort>) -> Self {
        let audio = settings.audio;
        let frame_len = audio.block_size_frames.max(1) as usize;
        let capacity = audio.sample_rate_hz.saturating_mul(CAPTURE_BUFFER_S) as usize;
        let (sink, reader, stats) = capture_queue(capacity, frame_len);

        let breakdown = ScoreBreakdown::empty(song.melody.len());

        Self {
            clock: PlaybackClock::new(audio.sample_rate_hz),
            estimator: PitchEstimator::with_frame_len(
                PitchEstimatorConfig::from(&audio),
                frame_len,
            ),
            tracker: NoteTracker::new(settings.tracking),
            settings,
            melody: song.melody,
            lyrics: song.lyrics,
            audio_offset_s: song.meta.audio_offset_s,
            playback,
            reader,
            stats,
            sink: Some(sink),
            stream: None,
            user_notes: Vec::new(),
            breakdown,
            scored_note_count: 0,
            state: SessionState::Idle,
            events: VecDeque::new(),
            reported_dropped: 0,
            lyric_cursor: (None, None),
        }
    }

    /// Opens the capture device and starts playback. A session runs once.
    pub fn start(
        &mut self,
        audio_port: &dyn AudioInputPort,
        device_id: &DeviceId,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.settings.validate()?;
        let sink = self.sink.take().ok_or(SessionError::AlreadyStarted)?;

        let stream = audio_port.open_input(device_id, self.settings.audio, Box::new(sink))?;
        if let Err(err) = self.playback.play() {
            stream.close();
            return Err(err.into());
        }
        self.stream = Some(stream);

        tracing::info!(
            device = %device_id,
            sample_rate_hz = self.settings.audio.sample_rate_hz,
            block_size = self.reader.frame_len(),
            reference_notes = self.melody.len(),
            "session started"
        );
        self.set_state(SessionState::Running);
        Ok(())
    }

    /// One control-loop step. Returns the number of frames analysed.
    pub fn tick(&mut self) -> usize {
        if self.state == SessionState::Finished {
            return 0;
        }

        if let Some(position) = self.playback.position_s() {
            self.clock.nudge(position);
        }

        let frames = self.drain_frames();
        self.report_overflow();
        self.rescore_if_changed();
        self.update_lyrics();
        frames
    }

    /// Stops capture and playback, flushes the tracker and returns the final
    /// score. Calling it again returns the same breakdown.
    pub fn finish(&mut self) -> ScoreBreakdown {
        if self.state == SessionState::Finished {
            return self.breakdown;
        }

        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.drain_frames();
        self.report_overflow();

        if let Some(note) = self.tracker.flush() {
            self.push_note(note);
        }
        self.rescore_if_changed();

        if let Err(err) = self.playback.stop() {
            tracing::debug!(error = %err, "playback stop failed");
        }

        tracing::info!(
            total = self.breakdown.total,
            matched = self.breakdown.matched,
            total_notes = self.breakdown.total_notes,
            sung_notes = self.user_notes.len(),
            "session finished"
        );
        self.events.push_back(Event::FinalScore {
            breakdown: self.breakdown,
        });
        self.set_state(SessionState::Finished);
        self.breakdown
    }

    pub fn is_playback_finished(&self) -> bool {
        self.playback.is_finished()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn melody(&self) -> &Melody {
        &self.melody
    }

    pub fn user_notes(&self) -> &[UserNote] {
        &self.user_notes
    }

    pub fn breakdown(&self) -> ScoreBreakdown {
        self.breakdown
    }

    pub fn clock_s(&self) -> f64 {
        self.clock.now_s()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.stats.dropped_samples()
    }

    /// Pairs the sung notes with the reference melody the same way scoring does.
    pub fn matches(&self) -> Vec<NoteMatch> {
        match_notes(
            self.melody.notes(),
            &self.user_notes,
            self.settings.scoring.rhythm_tolerance_s,
        )
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn drain_frames(&mut self) -> usize {
        let mut frames = 0;
        while let Some(frame) = self.reader.next_frame() {
            let time_s = self.clock.advance(frame.len());
            let estimate = self.estimator.estimate(frame);
            let finished = self.tracker.process(time_s, frame, estimate.hz);
            frames += 1;
            if let Some(note) = finished {
                self.push_note(note);
            }
        }
        frames
    }

    fn push_note(&mut self, note: UserNote) {
        tracing::debug!(
            start_s = note.start_s,
            end_s = note.end_s,
            midi = note.midi,
            "note finalized"
        );
        self.user_notes.push(note);
        self.events.push_back(Event::NotesUpdated {
            latest: note,
            total_notes: self.user_notes.len(),
        });
    }

    fn rescore_if_changed(&mut self) {
        if self.user_notes.len() == self.scored_note_count {
            return;
        }
        self.scored_note_count = self.user_notes.len();
        self.breakdown = score_notes(self.melody.notes(), &self.user_notes, &self.settings.scoring);
        self.events.push_back(Event::ScoreUpdated {
            breakdown: self.breakdown,
        });
    }

    fn report_overflow(&mut self) {
        let dropped = self.stats.dropped_samples();
        if dropped == self.reported_dropped {
            return;
        }
        tracing::warn!(
            dropped_samples = dropped,
            new = dropped - self.reported_dropped,
            "capture queue overflow, samples dropped"
        );
        self.reported_dropped = dropped;
        self.events.push_back(Event::CaptureOverflow {
            dropped_samples: dropped,
        });
    }

    fn update_lyrics(&mut self) {
        let lyric_time = (self.clock.now_s() - self.audio_offset_s).max(0.0);
        let lines = self.lyrics.lines();
        let (current, next) = self.lyrics.current_and_next(lyric_time);
        let index_of = |line: Option<&tessitura_domain_song::LyricLine>| {
            line.and_then(|l| lines.iter().position(|c| std::ptr::eq(c, l)))
        };
        let cursor = (index_of(current), index_of(next));
        if cursor == self.lyric_cursor {
            return;
        }
        self.lyric_cursor = cursor;
        self.events.push_back(Event::LyricsUpdated {
            current: current.map(|l| l.text.clone()),
            next: next.map(|l| l.text.clone()),
        });
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.events.push_back(Event::SessionStateUpdated { state });
    }
}

impl Drop for KaraokeSession {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }
}
