use crate::model::{Melody, ReferenceNote};

#[derive(thiserror::Error, Debug)]
pub enum MelodyParseError {
    #[error("missing header row")]
    MissingHeader,
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("line {line}: {msg}")]
    InvalidNote { line: usize, msg: String },
}

const START: &str = "start_s";
const DURATION: &str = "duration_s";
const MIDI: &str = "midi";

/// Parses the `start_s,duration_s,midi` table. Columns may come in any order,
/// extra columns are ignored.
pub fn parse_melody_csv(text: &str) -> Result<Melody, MelodyParseError> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = rows.next().ok_or(MelodyParseError::MissingHeader)?;
    let columns: Vec<&str> = header
        .trim_start_matches('\u{feff}')
        .split(',')
        .map(str::trim)
        .collect();
    let start_idx = column_index(&columns, START)?;
    let duration_idx = column_index(&columns, DURATION)?;
    let midi_idx = column_index(&columns, MIDI)?;

    let mut notes = Vec::new();
    for (line, row) in rows {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        let start_s = field(&fields, start_idx, line, START)?;
        let duration_s = field(&fields, duration_idx, line, DURATION)?;
        let midi = field(&fields, midi_idx, line, MIDI)?;

        if start_s < 0.0 {
            return Err(MelodyParseError::InvalidNote {
                line,
                msg: format!("negative start {start_s}"),
            });
        }
        if duration_s <= 0.0 {
            return Err(MelodyParseError::InvalidNote {
                line,
                msg: format!("non-positive duration {duration_s}"),
            });
        }

        notes.push(ReferenceNote::new(start_s, duration_s, midi));
    }

    Ok(Melody::new(notes))
}

fn column_index(columns: &[&str], name: &'static str) -> Result<usize, MelodyParseError> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or(MelodyParseError::MissingColumn(name))
}

fn field(
    fields: &[&str],
    idx: usize,
    line: usize,
    column: &'static str,
) -> Result<f64, MelodyParseError> {
    let raw = fields.get(idx).copied().unwrap_or("");
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(MelodyParseError::InvalidNumber {
            line,
            column,
            value: raw.to_string(),
        }),
    }
}
