use std::thread;
use std::time::Duration;
use tessitura_core::WallClockPlayback;
use tessitura_ports::playback::{PlaybackError, PlaybackPort};

#[test]
fn reports_no_position_before_play() {
    let playback = WallClockPlayback::new(None);
    assert_eq!(playback.position_s(), None);
    assert!(!playback.is_finished());
    assert!(matches!(playback.stop(), Err(PlaybackError::NotLoaded(_))));
}

#[test]
fn position_tracks_wall_time() {
    let playback = WallClockPlayback::new(None);
    playback.play().expect("play");
    thread::sleep(Duration::from_millis(20));

    let position = playback.position_s().expect("position while playing");
    assert!(position >= 0.02, "position {position}");
    assert!(!playback.is_finished());
}

#[test]
fn bounded_playback_finishes() {
    let playback = WallClockPlayback::new(Some(0.01));
    playback.play().expect("play");
    thread::sleep(Duration::from_millis(20));
    assert!(playback.is_finished());
}

#[test]
fn stop_finishes_and_clears_position() {
    let playback = WallClockPlayback::new(Some(60.0));
    playback.play().expect("play");
    playback.stop().expect("stop");
    assert!(playback.is_finished());
    assert_eq!(playback.position_s(), None);
}
