use crate::model::{LyricLine, Lyrics};

/// Parses LRC lyrics. A line may carry several `[mm:ss.xx]` stamps and yields
/// one entry per stamp; lines without a stamp (including `[ar:...]` style
/// tags) are skipped.
pub fn parse_lrc(text: &str) -> Lyrics {
    let mut lines = Vec::new();
    let mut stamps = Vec::new();

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }
        stamps.clear();
        let mut rest = String::with_capacity(raw.len());
        let mut cursor = raw;

        while let Some(open) = cursor.find('[') {
            let Some(close) = cursor[open..].find(']').map(|c| open + c) else {
                break;
            };
            rest.push_str(&cursor[..open]);
            match parse_timestamp(&cursor[open + 1..close]) {
                Some(time_s) => stamps.push(time_s),
                None => rest.push_str(&cursor[open..=close]),
            }
            cursor = &cursor[close + 1..];
        }
        rest.push_str(cursor);

        if stamps.is_empty() {
            continue;
        }
        let text = rest.trim();
        for &time_s in &stamps {
            lines.push(LyricLine {
                time_s,
                text: text.to_string(),
            });
        }
    }

    Lyrics::new(lines)
}

fn parse_timestamp(tag: &str) -> Option<f64> {
    let (minutes, seconds) = tag.split_once(':')?;
    if minutes.is_empty() || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (whole, frac) = match seconds.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (seconds, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || frac.is_some_and(|f| !digits(f)) {
        return None;
    }

    let minutes: u32 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(minutes as f64 * 60.0 + seconds)
}
