//! Code 39 on a run-length encoded scan line.
//!
//! Each character is nine elements (five bars, four spaces), three of them
//! wide, followed by a narrow inter-character space. Symbols open and close
//! with `*`, which is not part of the payload.

use crate::decode::linear::{span, LinearHit, Run};
use crate::decode::symbol::SymbolKind;

const ALPHABET: &[u8; 43] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Wide/narrow patterns, first element in the most significant of nine bits.
const PATTERNS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-$
    0x0A2, 0x08A, 0x02A, // / + %
];
const START_STOP: u16 = 0x094;

const CHAR_RUNS: usize = 9;
/// Narrowest accepted wide element, in narrow widths.
const MIN_WIDE_RATIO: f32 = 1.5;
/// Widest accepted inter-character gap, in narrow widths.
const MAX_GAP: f32 = 3.5;
const MIN_QUIET_NARROW: f32 = 5.0;

/// Pattern of one character and its mean narrow width.
fn read_char(runs: &[Run]) -> Option<(u16, f32)> {
    if runs.len() != CHAR_RUNS || !runs[0].dark {
        return None;
    }
    let mut widths: Vec<usize> = runs.iter().map(|r| r.len).collect();
    widths.sort_unstable();
    let narrow_max = widths[5] as f32;
    let wide_min = widths[6] as f32;
    if wide_min < narrow_max * MIN_WIDE_RATIO {
        return None;
    }
    let threshold = (narrow_max + wide_min) / 2.0;
    let pattern = runs
        .iter()
        .fold(0u16, |acc, r| (acc << 1) | (r.len as f32 > threshold) as u16);
    let narrow = widths[..6].iter().sum::<usize>() as f32 / 6.0;
    Some((pattern, narrow))
}

/// Symbol whose start character begins at `runs[at]`, with the runs it covers.
pub(crate) fn decode(runs: &[Run], at: usize) -> Option<(LinearHit, usize)> {
    if at == 0 {
        return None;
    }
    let (pattern, narrow) = read_char(runs.get(at..at + CHAR_RUNS)?)?;
    if pattern != START_STOP {
        return None;
    }
    let quiet = &runs[at - 1];
    if quiet.dark || (quiet.len as f32) < MIN_QUIET_NARROW * narrow {
        return None;
    }

    let mut payload = String::new();
    let mut pos = at + CHAR_RUNS;
    loop {
        let gap = runs.get(pos)?;
        if gap.len as f32 > MAX_GAP * narrow {
            return None;
        }
        pos += 1;
        let (pattern, _) = read_char(runs.get(pos..pos + CHAR_RUNS)?)?;
        pos += CHAR_RUNS;
        if pattern == START_STOP {
            break;
        }
        let index = PATTERNS.iter().position(|&p| p == pattern)?;
        payload.push(char::from(ALPHABET[index]));
    }
    if payload.is_empty() {
        return None;
    }

    let (start, end) = span(&runs[at..pos]);
    Some((
        LinearHit {
            payload,
            kind: SymbolKind::Code39,
            start,
            end,
        },
        pos - at,
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decode::linear::tests::line;
    use crate::decode::linear::{scan_line, Symbologies};

    /// Module pattern (true = bar) for `*text*`, wide elements three modules.
    pub(crate) fn code39_modules(text: &str) -> Vec<bool> {
        let mut patterns = vec![START_STOP];
        for byte in text.bytes() {
            let index = ALPHABET.iter().position(|&c| c == byte).expect("code 39 char");
            patterns.push(PATTERNS[index]);
        }
        patterns.push(START_STOP);

        let mut modules = Vec::new();
        for (n, pattern) in patterns.iter().enumerate() {
            if n > 0 {
                modules.push(false);
            }
            for bit in (0..CHAR_RUNS).rev() {
                let dark = (CHAR_RUNS - 1 - bit) % 2 == 0;
                let width = if pattern & (1 << bit) != 0 { 3 } else { 1 };
                modules.extend(std::iter::repeat(dark).take(width));
            }
        }
        modules
    }

    #[test]
    fn every_pattern_has_three_wide_elements() {
        for pattern in PATTERNS.iter().chain([&START_STOP]) {
            assert_eq!(pattern.count_ones(), 3, "{:#05x}", pattern);
        }
    }

    #[test]
    fn decodes_single_character() {
        let samples = line(&code39_modules("A"), 4, 12);
        let hits = scan_line(&samples, Symbologies::Extended);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "A");
        assert_eq!(hits[0].kind, SymbolKind::Code39);
        assert_eq!(hits[0].start, 48);
    }

    #[test]
    fn decodes_mixed_text_reversed() {
        let mut samples = line(&code39_modules("SKU-42 $/+%."), 2, 12);
        samples.reverse();
        let hits = scan_line(&samples, Symbologies::Extended);
        assert_eq!(hits.first().map(|h| h.payload.as_str()), Some("SKU-42 $/+%."));
    }

    #[test]
    fn missing_stop_character_is_rejected() {
        let mut modules = code39_modules("AB");
        // cut the stop character and its gap
        modules.truncate(modules.len() - 16);
        let samples = line(&modules, 3, 12);
        assert!(scan_line(&samples, Symbologies::Extended).is_empty());
    }

    #[test]
    fn retail_scan_ignores_code39() {
        let samples = line(&code39_modules("A"), 4, 12);
        assert!(scan_line(&samples, Symbologies::Retail).is_empty());
    }
}
