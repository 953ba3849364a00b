//! Source reader: translation phases 1 and 2.
//!
//! Decodes a source string into logical characters (runes), applying
//! trigraph replacement when enabled, digraph mapping, line splicing and
//! newline normalization. Each rune remembers the physical position of
//! its first byte, so positions survive splicing and substitution.

use crate::error::SourceLocation;

#[derive(Debug, Clone, Copy)]
pub struct Rune {
    pub ch: char,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct RuneStream {
    pub runes: Vec<Rune>,
    /// Position one past the last physical byte; the position of EOF.
    pub eof: SourceLocation,
}

fn trigraph(ch: char) -> Option<char> {
    match ch {
        '=' => Some('#'),
        '(' => Some('['),
        ')' => Some(']'),
        '<' => Some('{'),
        '>' => Some('}'),
        '/' => Some('\\'),
        '\'' => Some('^'),
        '!' => Some('|'),
        '-' => Some('~'),
        _ => None,
    }
}

/// Reads a whole source into runes. Trigraphs are tweak-gated; digraph
/// mapping and line splicing are unconditional.
pub fn read_runes(file_no: usize, source: &str, trigraphs: bool) -> RuneStream {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut runes = Vec::with_capacity(chars.len());
    let mut ci = 0;
    let mut line = 1;
    let mut column = 1;

    let peek = |ci: usize, k: usize| chars.get(ci + k).map(|&(_, c)| c);

    while let Some(&(byte, c)) = chars.get(ci) {
        let location = SourceLocation {
            file_no,
            offset: byte + 1,
            line,
            column,
        };

        let (ch, width) = match (c, peek(ci, 1)) {
            ('<', Some(':')) => ('[', 2),
            (':', Some('>')) => (']', 2),
            ('<', Some('%')) => ('{', 2),
            ('%', Some('>')) => ('}', 2),
            ('%', Some(':')) => ('#', 2),
            ('?', Some('?')) if trigraphs => match peek(ci, 2).and_then(trigraph) {
                Some(replacement) => (replacement, 3),
                None => (c, 1),
            },
            _ => (c, 1),
        };

        // Line splice: backslash (literal or via ??/) directly before a
        // newline removes both.
        if ch == '\\' {
            if peek(ci, width) == Some('\n') {
                ci += width + 1;
                line += 1;
                column = 1;
                continue;
            }
            if peek(ci, width) == Some('\r') && peek(ci, width + 1) == Some('\n') {
                ci += width + 2;
                line += 1;
                column = 1;
                continue;
            }
        }

        if ch == '\r' {
            if peek(ci, 1) == Some('\n') {
                runes.push(Rune { ch: '\n', location });
                ci += 2;
            } else {
                // Bare CR: dropped from the stream, still ends the line.
                ci += 1;
            }
            line += 1;
            column = 1;
            continue;
        }

        if ch == '\n' {
            runes.push(Rune { ch, location });
            ci += 1;
            line += 1;
            column = 1;
            continue;
        }

        runes.push(Rune { ch, location });
        ci += width;
        column += width;
    }

    let eof = SourceLocation {
        file_no,
        offset: source.len() + 1,
        line,
        column,
    };
    RuneStream { runes, eof }
}
