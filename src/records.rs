//! Turns the text emitted by the replay parser for one match into an [`EntityTable`].
//!
//! The parser prints a handful of header rows (hero assignments), then one
//! comma-separated data row per sample, then timing information. Only the data
//! rows are kept.

use thiserror::Error;

use crate::config::{ENTITY_ID_MARKER, FOOTER_LINES};
use crate::types::{EntityTable, RawRecord, COLUMNS, RECORD_FIELD_COUNT};

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("no data row found")]
    NoDataRows,

    #[error("line {line}: expected 16 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: field `{column}` is not numeric: {value:?}")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
}

/// Parse a raw output blob. Lines are split on `\n`; a trailing `\r` is dropped.
pub fn parse_output(output: &str) -> Result<EntityTable, RecordError> {
    let lines: Vec<&str> = output.split('\n').collect();
    parse(&lines)
}

/// Parse the raw lines of one match.
///
/// Everything before the first line whose entity-id field contains
/// [`ENTITY_ID_MARKER`] is header; the last [`FOOTER_LINES`] lines are footer.
pub fn parse<S: AsRef<str>>(raw_lines: &[S]) -> Result<EntityTable, RecordError> {
    let first = raw_lines
        .iter()
        .position(|l| is_data_row(l.as_ref()))
        .ok_or(RecordError::NoDataRows)?;

    let end = raw_lines.len().saturating_sub(FOOTER_LINES);
    if end <= first {
        return Err(RecordError::NoDataRows);
    }

    let records = raw_lines[first..end]
        .iter()
        .enumerate()
        .map(|(i, line)| parse_line(line.as_ref(), first + i + 1))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityTable::new(records))
}

fn is_data_row(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|id| id.contains(ENTITY_ID_MARKER))
}

/// `line_no` is 1-based and only used in error messages.
fn parse_line(line: &str, line_no: usize) -> Result<RawRecord, RecordError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != RECORD_FIELD_COUNT {
        return Err(RecordError::FieldCount {
            line: line_no,
            found: fields.len(),
        });
    }

    let mut values = [0.0f64; RECORD_FIELD_COUNT];
    for (idx, raw) in fields.iter().enumerate().skip(1) {
        values[idx] = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| RecordError::InvalidNumber {
                line: line_no,
                column: COLUMNS[idx],
                value: raw.to_string(),
            })?;
    }

    Ok(RawRecord {
        player: fields[0].trim().to_string(),
        x: values[1],
        y: values[2],
        z: values[3],
        time: values[4],
        mana: values[5],
        mana_regen: values[6],
        max_mana: values[7],
        hp: values[8],
        hp_regen: values[9],
        max_hp: values[10],
        xp: values[11],
        level: values[12],
        strength: values[13],
        intelligence: values[14],
        agility: values[15],
    })
}
