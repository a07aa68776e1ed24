//! Scanline decoding of linear symbols.
//!
//! A line of luma samples is binarised at the midpoint of its range, run-length
//! encoded, and searched for a start pattern preceded by a quiet zone. EAN/UPC
//! digits are matched against the width tables by normalised error; guards and
//! the check digit reject false positives. Code 39 and Code 128 live in their
//! own modules and work on the same runs. Every run list is tried forwards and
//! reversed, so mirrored and upside-down symbols decode the same.

use crate::decode::symbol::SymbolKind;
use crate::decode::{code128, code39};

/// Lines with less spread than this between darkest and lightest sample are skipped.
const MIN_CONTRAST: u8 = 48;
/// Quiet zone before the start guard, in modules.
pub(crate) const MIN_QUIET_MODULES: f32 = 3.0;
/// Accepted width of a single-module guard element, in modules.
const GUARD_MIN: f32 = 0.4;
const GUARD_MAX: f32 = 2.2;
/// Largest summed width error (in modules) for a digit match.
const MAX_DIGIT_ERROR: f32 = 1.4;

const EAN13_RUNS: usize = 59;
const EAN13_MODULES: f32 = 95.0;
const EAN8_RUNS: usize = 43;
const EAN8_MODULES: f32 = 67.0;
const UPCE_RUNS: usize = 33;
const UPCE_MODULES: f32 = 51.0;

/// L-code element widths, starting with a space. R-codes have the same widths
/// starting with a bar; G-codes are the L widths reversed.
const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Left-half parity (bit set = G-code, most significant = first digit) for each
/// implied leading digit of EAN-13.
const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

/// Linear symbologies a scan looks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Symbologies {
    /// EAN-13 and EAN-8. UPC-A symbols read as EAN-13 with a leading zero.
    Retail,
    /// Retail plus UPC-A, UPC-E, Code 39 and Code 128.
    Extended,
}

/// Symbol found on one line. `start..end` indexes the sample line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LinearHit {
    pub payload: String,
    pub kind: SymbolKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Run {
    pub dark: bool,
    pub start: usize,
    pub len: usize,
}

/// Decode every linear symbol crossing a line of samples.
pub(crate) fn scan_line(samples: &[u8], symbologies: Symbologies) -> Vec<LinearHit> {
    let Some(runs) = binarise(samples) else {
        return Vec::new();
    };
    let mut hits = scan_runs(&runs, symbologies);
    let reversed: Vec<Run> = runs.iter().rev().copied().collect();
    for hit in scan_runs(&reversed, symbologies) {
        if !hits.iter().any(|h| h.payload == hit.payload) {
            hits.push(hit);
        }
    }
    hits
}

fn binarise(samples: &[u8]) -> Option<Vec<Run>> {
    let min = *samples.iter().min()?;
    let max = *samples.iter().max()?;
    if max.saturating_sub(min) < MIN_CONTRAST {
        return None;
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;

    let mut runs: Vec<Run> = Vec::new();
    for (i, &value) in samples.iter().enumerate() {
        let dark = value < threshold;
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => runs.push(Run {
                dark,
                start: i,
                len: 1,
            }),
        }
    }
    Some(runs)
}

fn scan_runs(runs: &[Run], symbologies: Symbologies) -> Vec<LinearHit> {
    let mut hits = Vec::new();
    let mut i = 1;
    while i < runs.len() {
        if runs[i].dark {
            if let Some((hit, consumed)) = decode_at(runs, i, symbologies) {
                hits.push(hit);
                i += consumed;
                continue;
            }
        }
        i += 1;
    }
    hits
}

/// Symbol starting at `runs[at]`, with the number of runs it covers.
fn decode_at(runs: &[Run], at: usize, symbologies: Symbologies) -> Option<(LinearHit, usize)> {
    if let Some(hit) = decode_ean13(runs, at) {
        let hit = match symbologies {
            Symbologies::Retail => hit,
            Symbologies::Extended => as_upca(hit),
        };
        return Some((hit, EAN13_RUNS));
    }
    if let Some(hit) = decode_ean8(runs, at) {
        return Some((hit, EAN8_RUNS));
    }
    if symbologies == Symbologies::Retail {
        return None;
    }
    decode_upce(runs, at)
        .map(|hit| (hit, UPCE_RUNS))
        .or_else(|| code128::decode(runs, at))
        .or_else(|| code39::decode(runs, at))
}

/// UPC-A is EAN-13 with number system 0; report it under its own name.
fn as_upca(hit: LinearHit) -> LinearHit {
    match hit.payload.strip_prefix('0') {
        Some(upc) => LinearHit {
            payload: upc.to_string(),
            kind: SymbolKind::UpcA,
            ..hit
        },
        None => hit,
    }
}

/// Candidate window `runs[at..at + count]`, with its module width, if the
/// surroundings look like a symbol (quiet zone before, guards in place).
fn frame_window(runs: &[Run], at: usize, count: usize, modules: f32) -> Option<(&[Run], f32)> {
    if at == 0 || at + count > runs.len() {
        return None;
    }
    let window = &runs[at..at + count];
    let total: usize = window.iter().map(|r| r.len).sum();
    let module = total as f32 / modules;
    if module <= 0.0 {
        return None;
    }

    let quiet = &runs[at - 1];
    if quiet.dark || (quiet.len as f32) < MIN_QUIET_MODULES * module {
        return None;
    }

    // start guard: bar space bar
    if !is_guard(&window[0..3], module) {
        return None;
    }
    // end guard: bar space bar
    if !is_guard(&window[count - 3..], module) {
        return None;
    }
    Some((window, module))
}

fn is_guard(runs: &[Run], module: f32) -> bool {
    runs.iter().all(|r| {
        let width = r.len as f32 / module;
        (GUARD_MIN..=GUARD_MAX).contains(&width)
    })
}

pub(crate) fn span(window: &[Run]) -> (usize, usize) {
    let start = window.iter().map(|r| r.start).min().unwrap_or(0);
    let end = window.iter().map(|r| r.start + r.len).max().unwrap_or(start);
    (start, end)
}

fn group_widths(runs: &[Run]) -> [usize; 4] {
    [runs[0].len, runs[1].len, runs[2].len, runs[3].len]
}

/// Best digit for a 4-element group against a width table, with its error.
fn match_digit(widths: [usize; 4], reversed_table: bool, module: f32) -> Option<(u8, f32)> {
    let total: usize = widths.iter().sum();
    if total == 0 {
        return None;
    }
    let group_modules = total as f32 / module;
    if !(5.0..=9.0).contains(&group_modules) {
        return None;
    }
    let scale = 7.0 / total as f32;

    let mut best: Option<(u8, f32)> = None;
    for (digit, pattern) in L_WIDTHS.iter().enumerate() {
        let error: f32 = (0..4)
            .map(|k| {
                let expected = if reversed_table {
                    pattern[3 - k]
                } else {
                    pattern[k]
                };
                (widths[k] as f32 * scale - expected as f32).abs()
            })
            .sum();
        if best.map_or(true, |(_, e)| error < e) {
            best = Some((digit as u8, error));
        }
    }
    best.filter(|(_, error)| *error <= MAX_DIGIT_ERROR)
}

/// Left-half digit that may be L- or G-coded; `true` means G.
fn match_either(widths: [usize; 4], module: f32) -> Option<(u8, bool)> {
    match (
        match_digit(widths, false, module),
        match_digit(widths, true, module),
    ) {
        (Some((dl, el)), Some((dg, eg))) => Some(if eg < el { (dg, true) } else { (dl, false) }),
        (Some((dl, _)), None) => Some((dl, false)),
        (None, Some((dg, _))) => Some((dg, true)),
        (None, None) => None,
    }
}

fn is_middle_guard(runs: &[Run], module: f32) -> bool {
    runs.len() == 5 && !runs[0].dark && is_guard(runs, module)
}

fn decode_ean13(runs: &[Run], at: usize) -> Option<LinearHit> {
    let (window, module) = frame_window(runs, at, EAN13_RUNS, EAN13_MODULES)?;

    let mut digits = [0u8; 13];
    let mut parity = 0u8;
    for g in 0..6 {
        let group = group_widths(&window[3 + g * 4..3 + g * 4 + 4]);
        let (digit, is_g) = match_either(group, module)?;
        digits[g + 1] = digit;
        parity = (parity << 1) | is_g as u8;
    }
    digits[0] = FIRST_DIGIT_PARITY.iter().position(|&p| p == parity)? as u8;

    if !is_middle_guard(&window[27..32], module) {
        return None;
    }

    for g in 0..6 {
        let group = group_widths(&window[32 + g * 4..32 + g * 4 + 4]);
        let (digit, _) = match_digit(group, false, module)?;
        digits[g + 7] = digit;
    }

    if !ean13_checksum_ok(&digits) {
        return None;
    }

    let (start, end) = span(window);
    Some(LinearHit {
        payload: digits_to_string(&digits),
        kind: SymbolKind::Ean13,
        start,
        end,
    })
}

fn decode_ean8(runs: &[Run], at: usize) -> Option<LinearHit> {
    let (window, module) = frame_window(runs, at, EAN8_RUNS, EAN8_MODULES)?;

    let mut digits = [0u8; 8];
    for g in 0..4 {
        let group = group_widths(&window[3 + g * 4..3 + g * 4 + 4]);
        let (digit, _) = match_digit(group, false, module)?;
        if let Some((_, g_error)) = match_digit(group, true, module) {
            // a G-code fits better: this is a reversed read, not EAN-8 left half
            let (_, l_error) = match_digit(group, false, module)?;
            if g_error < l_error {
                return None;
            }
        }
        digits[g] = digit;
    }

    if !is_middle_guard(&window[19..24], module) {
        return None;
    }

    for g in 0..4 {
        let group = group_widths(&window[24 + g * 4..24 + g * 4 + 4]);
        let (digit, _) = match_digit(group, false, module)?;
        digits[g + 4] = digit;
    }

    if !ean8_checksum_ok(&digits) {
        return None;
    }

    let (start, end) = span(window);
    Some(LinearHit {
        payload: digits_to_string(&digits),
        kind: SymbolKind::Ean8,
        start,
        end,
    })
}

fn decode_upce(runs: &[Run], at: usize) -> Option<LinearHit> {
    let (window, module) = frame_window(runs, at, UPCE_RUNS, UPCE_MODULES)?;
    // end guard: space bar space bar space bar
    if window[27].dark || !is_guard(&window[27..], module) {
        return None;
    }

    let mut digits = [0u8; 6];
    let mut parity = 0u8;
    for g in 0..6 {
        let group = group_widths(&window[3 + g * 4..3 + g * 4 + 4]);
        let (digit, is_g) = match_either(group, module)?;
        digits[g] = digit;
        parity = (parity << 1) | is_g as u8;
    }
    let (number_system, check) = upce_parity(parity)?;
    if upc_check_digit(&expand_upce(number_system, &digits)) != check {
        return None;
    }

    let mut payload = Vec::with_capacity(8);
    payload.push(number_system);
    payload.extend_from_slice(&digits);
    payload.push(check);
    let (start, end) = span(window);
    Some(LinearHit {
        payload: digits_to_string(&payload),
        kind: SymbolKind::UpcE,
        start,
        end,
    })
}

/// Number system and check digit encoded in the UPC-E parity pattern. Number
/// system 1 uses the EAN-13 leading-digit table, number system 0 its complement.
fn upce_parity(parity: u8) -> Option<(u8, u8)> {
    FIRST_DIGIT_PARITY
        .iter()
        .enumerate()
        .find_map(|(check, &pattern)| {
            if parity == pattern {
                Some((1, check as u8))
            } else if parity == !pattern & 0b11_1111 {
                Some((0, check as u8))
            } else {
                None
            }
        })
}

/// Zero-suppressed UPC-E body expanded to the 11 UPC-A digits before the check digit.
fn expand_upce(number_system: u8, digits: &[u8; 6]) -> [u8; 11] {
    let [d1, d2, d3, d4, d5, d6] = *digits;
    let body = match d6 {
        0..=2 => [d1, d2, d6, 0, 0, 0, 0, d3, d4, d5],
        3 => [d1, d2, d3, 0, 0, 0, 0, 0, d4, d5],
        4 => [d1, d2, d3, d4, 0, 0, 0, 0, 0, d5],
        _ => [d1, d2, d3, d4, d5, 0, 0, 0, 0, d6],
    };
    let mut upca = [0u8; 11];
    upca[0] = number_system;
    upca[1..].copy_from_slice(&body);
    upca
}

fn upc_check_digit(digits: &[u8; 11]) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn ean13_checksum_ok(digits: &[u8; 13]) -> bool {
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    (10 - sum % 10) % 10 == digits[12] as u32
}

fn ean8_checksum_ok(digits: &[u8; 8]) -> bool {
    let sum: u32 = digits[..7]
        .iter()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == digits[7] as u32
}

fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

// ----------------------------------------------------------------------------
// Line sampling
// ----------------------------------------------------------------------------

/// Straight sampling line through a greyscale image.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScanLine {
    pub origin: (f32, f32),
    pub step: (f32, f32),
    pub len: usize,
}

impl ScanLine {
    /// Line through `through` with direction `angle_deg`, clipped to the image.
    pub fn clipped(
        width: usize,
        height: usize,
        through: (f32, f32),
        angle_deg: f32,
    ) -> Option<Self> {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let step = (snap(cos), snap(sin));
        let max_x = width as f32 - 1.0;
        let max_y = height as f32 - 1.0;

        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for (p, d, max) in [(through.0, step.0, max_x), (through.1, step.1, max_y)] {
            if d == 0.0 {
                if p < 0.0 || p > max {
                    return None;
                }
                continue;
            }
            let a = (0.0 - p) / d;
            let b = (max - p) / d;
            t_min = t_min.max(a.min(b));
            t_max = t_max.min(a.max(b));
        }
        if !(t_max > t_min) {
            return None;
        }
        let t_start = t_min.ceil();
        let len = (t_max.floor() - t_start) as usize + 1;
        Some(Self {
            origin: (through.0 + t_start * step.0, through.1 + t_start * step.1),
            step,
            len,
        })
    }

    pub fn point(&self, index: usize) -> (i32, i32) {
        let t = index as f32;
        (
            (self.origin.0 + t * self.step.0).round() as i32,
            (self.origin.1 + t * self.step.1).round() as i32,
        )
    }

    pub fn sample(&self, luma: &[u8], width: usize, height: usize) -> Vec<u8> {
        (0..self.len)
            .map(|i| {
                let (x, y) = self.point(i);
                let x = (x.max(0) as usize).min(width - 1);
                let y = (y.max(0) as usize).min(height - 1);
                luma[y * width + x]
            })
            .collect()
    }
}

fn snap(value: f32) -> f32 {
    if value.abs() < 1e-6 {
        0.0
    } else {
        value
    }
}
