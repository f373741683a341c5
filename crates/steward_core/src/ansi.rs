//! ANSI escape stripping for terminal output.
//!
//! Assistant output arrives with colors, cursor movement and window-title
//! sequences mixed in. Every analyzer matches against plain text, so lines are
//! cleaned once before they enter an [`AnalysisContext`](crate::AnalysisContext).

const ESC: char = '\u{1b}';
const BEL: char = '\u{07}';
const CSI_8BIT: char = '\u{9b}';

/// Strip ANSI escape sequences and carriage returns from `input`.
///
/// Handles CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`),
/// two-byte escapes (`ESC 7`, `ESC M`, ...) and the 8-bit CSI introducer.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESC => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']') => {
                    while let Some(n) = chars.next() {
                        if n == BEL {
                            break;
                        }
                        if n == ESC && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // Two-byte escape or truncated sequence
                _ => {}
            },
            CSI_8BIT => skip_csi(&mut chars),
            '\r' => {}
            _ => out.push(c),
        }
    }

    out
}

fn skip_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    // Parameter and intermediate bytes
    while let Some(&n) = chars.peek() {
        if ('\u{20}'..='\u{3f}').contains(&n) {
            chars.next();
        } else {
            break;
        }
    }
    // Final byte
    if let Some(&n) = chars.peek() {
        if ('\u{40}'..='\u{7e}').contains(&n) {
            chars.next();
        }
    }
}

/// Strip every line and drop the ones that end up blank.
pub fn strip_ansi_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|l| strip_ansi(l.as_ref()))
        .filter(|l| !l.trim().is_empty())
        .collect()
}
