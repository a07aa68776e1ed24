//! Code 128 on a run-length encoded scan line.
//!
//! Symbols are six-element characters of eleven modules between a start code
//! (sets A, B or C) and a seven-element stop. The last character before the
//! stop is a modulo-103 check over the start value and every data value
//! weighted by its position.

use std::fmt::Write;

use crate::decode::linear::{span, LinearHit, Run, MIN_QUIET_MODULES};
use crate::decode::symbol::SymbolKind;

/// Element widths for values 0..=105, bar first.
#[rustfmt::skip]
const PATTERNS: [[u8; 6]; 106] = [
    [2, 1, 2, 2, 2, 2], [2, 2, 2, 1, 2, 2], [2, 2, 2, 2, 2, 1], [1, 2, 1, 2, 2, 3],
    [1, 2, 1, 3, 2, 2], [1, 3, 1, 2, 2, 2], [1, 2, 2, 2, 1, 3], [1, 2, 2, 3, 1, 2],
    [1, 3, 2, 2, 1, 2], [2, 2, 1, 2, 1, 3], [2, 2, 1, 3, 1, 2], [2, 3, 1, 2, 1, 2],
    [1, 1, 2, 2, 3, 2], [1, 2, 2, 1, 3, 2], [1, 2, 2, 2, 3, 1], [1, 1, 3, 2, 2, 2],
    [1, 2, 3, 1, 2, 2], [1, 2, 3, 2, 2, 1], [2, 2, 3, 2, 1, 1], [2, 2, 1, 1, 3, 2],
    [2, 2, 1, 2, 3, 1], [2, 1, 3, 2, 1, 2], [2, 2, 3, 1, 1, 2], [3, 1, 2, 1, 3, 1],
    [3, 1, 1, 2, 2, 2], [3, 2, 1, 1, 2, 2], [3, 2, 1, 2, 2, 1], [3, 1, 2, 2, 1, 2],
    [3, 2, 2, 1, 1, 2], [3, 2, 2, 2, 1, 1], [2, 1, 2, 1, 2, 3], [2, 1, 2, 3, 2, 1],
    [2, 3, 2, 1, 2, 1], [1, 1, 1, 3, 2, 3], [1, 3, 1, 1, 2, 3], [1, 3, 1, 3, 2, 1],
    [1, 1, 2, 3, 1, 3], [1, 3, 2, 1, 1, 3], [1, 3, 2, 3, 1, 1], [2, 1, 1, 3, 1, 3],
    [2, 3, 1, 1, 1, 3], [2, 3, 1, 3, 1, 1], [1, 1, 2, 1, 3, 3], [1, 1, 2, 3, 3, 1],
    [1, 3, 2, 1, 3, 1], [1, 1, 3, 1, 2, 3], [1, 1, 3, 3, 2, 1], [1, 3, 3, 1, 2, 1],
    [3, 1, 3, 1, 2, 1], [2, 1, 1, 3, 3, 1], [2, 3, 1, 1, 3, 1], [2, 1, 3, 1, 1, 3],
    [2, 1, 3, 3, 1, 1], [2, 1, 3, 1, 3, 1], [3, 1, 1, 1, 2, 3], [3, 1, 1, 3, 2, 1],
    [3, 3, 1, 1, 2, 1], [3, 1, 2, 1, 1, 3], [3, 1, 2, 3, 1, 1], [3, 3, 2, 1, 1, 1],
    [3, 1, 4, 1, 1, 1], [2, 2, 1, 4, 1, 1], [4, 3, 1, 1, 1, 1], [1, 1, 1, 2, 2, 4],
    [1, 1, 1, 4, 2, 2], [1, 2, 1, 1, 2, 4], [1, 2, 1, 4, 2, 1], [1, 4, 1, 1, 2, 2],
    [1, 4, 1, 2, 2, 1], [1, 1, 2, 2, 1, 4], [1, 1, 2, 4, 1, 2], [1, 2, 2, 1, 1, 4],
    [1, 2, 2, 4, 1, 1], [1, 4, 2, 1, 1, 2], [1, 4, 2, 2, 1, 1], [2, 4, 1, 2, 1, 1],
    [2, 2, 1, 1, 1, 4], [4, 1, 3, 1, 1, 1], [2, 4, 1, 1, 1, 2], [1, 3, 4, 1, 1, 1],
    [1, 1, 1, 2, 4, 2], [1, 2, 1, 1, 4, 2], [1, 2, 1, 2, 4, 1], [1, 1, 4, 2, 1, 2],
    [1, 2, 4, 1, 1, 2], [1, 2, 4, 2, 1, 1], [4, 1, 1, 2, 1, 2], [4, 2, 1, 1, 1, 2],
    [4, 2, 1, 2, 1, 1], [2, 1, 2, 1, 4, 1], [2, 1, 4, 1, 2, 1], [4, 1, 2, 1, 2, 1],
    [1, 1, 1, 1, 4, 3], [1, 1, 1, 3, 4, 1], [1, 3, 1, 1, 4, 1], [1, 1, 4, 1, 1, 3],
    [1, 1, 4, 3, 1, 1], [4, 1, 1, 1, 1, 3], [4, 1, 1, 3, 1, 1], [1, 1, 3, 1, 4, 1],
    [1, 1, 4, 1, 3, 1], [3, 1, 1, 1, 4, 1], [4, 1, 1, 1, 3, 1], [2, 1, 1, 4, 1, 2],
    [2, 1, 1, 2, 1, 4], [2, 1, 1, 2, 3, 2],
];
const STOP: [u8; 7] = [2, 3, 3, 1, 1, 1, 2];

const START_A: u8 = 103;
const START_B: u8 = 104;
const START_C: u8 = 105;
const SHIFT: u8 = 98;
const CODE_C: u8 = 99;
const CODE_B: u8 = 100;
const CODE_A: u8 = 101;
const FNC1: u8 = 102;

/// Largest summed width error (in modules) for a character match.
const MAX_CHAR_ERROR: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Summed width error of `runs` against `pattern` after scaling both to the
/// pattern's module count, or `None` when the run total is off the module grid.
fn pattern_error(runs: &[Run], pattern: &[u8], module: f32) -> Option<f32> {
    let total: usize = runs.iter().map(|r| r.len).sum();
    let modules: u8 = pattern.iter().sum();
    let measured = total as f32 / module;
    if (measured - modules as f32).abs() > modules as f32 * 0.25 {
        return None;
    }
    let scale = modules as f32 / total as f32;
    Some(
        runs.iter()
            .zip(pattern)
            .map(|(r, &w)| (r.len as f32 * scale - w as f32).abs())
            .sum(),
    )
}

/// Best character value for six runs, with its error.
fn match_char(runs: &[Run], module: f32) -> Option<(u8, f32)> {
    if runs.len() != 6 || !runs[0].dark {
        return None;
    }
    let mut best: Option<(u8, f32)> = None;
    for (value, pattern) in PATTERNS.iter().enumerate() {
        let Some(error) = pattern_error(runs, pattern, module) else {
            return None;
        };
        if best.map_or(true, |(_, e)| error < e) {
            best = Some((value as u8, error));
        }
    }
    best.filter(|(_, error)| *error <= MAX_CHAR_ERROR)
}

fn stop_error(runs: &[Run], module: f32) -> Option<f32> {
    if runs.len() != STOP.len() || !runs[0].dark {
        return None;
    }
    pattern_error(runs, &STOP, module).filter(|error| *error <= MAX_CHAR_ERROR)
}

/// Symbol whose start code begins at `runs[at]`, with the runs it covers.
pub(crate) fn decode(runs: &[Run], at: usize) -> Option<(LinearHit, usize)> {
    if at == 0 {
        return None;
    }
    let start_runs = runs.get(at..at + 6)?;
    let module = start_runs.iter().map(|r| r.len).sum::<usize>() as f32 / 11.0;
    let (start, _) = match_char(start_runs, module)?;
    if !(START_A..=START_C).contains(&start) {
        return None;
    }
    let quiet = &runs[at - 1];
    if quiet.dark || (quiet.len as f32) < MIN_QUIET_MODULES * module {
        return None;
    }

    let mut values = Vec::new();
    let mut pos = at + 6;
    loop {
        let stop = runs.get(pos..pos + STOP.len()).and_then(|r| stop_error(r, module));
        let data = runs.get(pos..pos + 6).and_then(|r| match_char(r, module));
        match (stop, data) {
            (Some(s), Some((_, d))) if s <= d => break,
            (Some(_), None) => break,
            (_, Some((value, _))) if value < START_A => values.push(value),
            _ => return None,
        }
        pos += 6;
    }
    pos += STOP.len();

    let (&check, data) = values.split_last()?;
    if data.is_empty() {
        return None;
    }
    let weighted: u32 = data
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as u32 + 1) * v as u32)
        .sum();
    if (start as u32 + weighted) % 103 != check as u32 {
        return None;
    }
    let payload = decode_values(start, data)?;

    let (begin, end) = span(&runs[at..pos]);
    Some((
        LinearHit {
            payload,
            kind: SymbolKind::Code128,
            start: begin,
            end,
        },
        pos - at,
    ))
}

/// Data values to text, following code-set switches and shifts. Function
/// codes carry no text and are dropped.
fn decode_values(start: u8, values: &[u8]) -> Option<String> {
    let mut set = match start {
        START_A => CodeSet::A,
        START_B => CodeSet::B,
        _ => CodeSet::C,
    };
    let mut shifted = false;
    let mut text = String::new();
    for &value in values {
        let current = match (shifted, set) {
            (true, CodeSet::A) => CodeSet::B,
            (true, CodeSet::B) => CodeSet::A,
            _ => set,
        };
        shifted = false;
        match (current, value) {
            (CodeSet::C, 0..=99) => {
                let _ = write!(text, "{:02}", value);
            }
            (CodeSet::C, CODE_B) => set = CodeSet::B,
            (CodeSet::C, CODE_A) => set = CodeSet::A,
            (CodeSet::A, 0..=63) => text.push(char::from(value + 32)),
            (CodeSet::A, 64..=95) => text.push(char::from(value - 64)),
            (CodeSet::B, 0..=95) => text.push(char::from(value + 32)),
            (_, SHIFT) => shifted = true,
            (_, CODE_C) => set = CodeSet::C,
            (CodeSet::A, CODE_B) => set = CodeSet::B,
            (CodeSet::B, CODE_A) => set = CodeSet::A,
            // FNC1..FNC4
            (_, 96 | 97 | CODE_B | CODE_A | FNC1) => {}
            _ => return None,
        }
    }
    Some(text)
}
