//! Scanner over the logical rune stream, producing preprocessing tokens.
//!
//! Whitespace runs (including comments) collapse to a single
//! `Whitespace` token; newlines are their own tokens because the
//! preprocessing grammar is line oriented. After end of input the
//! scanner returns `Eof` forever.

use crate::error::{ErrorKind, PpResult, Report, SourceLocation};
use crate::options::Tweaks;
use crate::source::{self, Rune};
use crate::symbols::intern;
use crate::token::{Enc, Punct, Token, TokenKind};
use crate::ucn;

pub struct Lexer<'a> {
    runes: Vec<Rune>,
    eof: SourceLocation,
    pos: usize,
    tweaks: &'a Tweaks,
    /// Set by the preprocessing parser after `#include`; makes `<...>`
    /// scan as a header name instead of punctuators.
    include_mode: bool,
}

enum LiteralEnd {
    Closed(usize),
    Newline,
    Eof,
}

impl<'a> Lexer<'a> {
    pub fn new(file_no: usize, source: &str, tweaks: &'a Tweaks) -> Lexer<'a> {
        let stream = source::read_runes(file_no, source, tweaks.trigraphs);
        Lexer {
            runes: stream.runes,
            eof: stream.eof,
            pos: 0,
            tweaks,
            include_mode: false,
        }
    }

    pub fn set_include_mode(&mut self, on: bool) {
        self.include_mode = on;
    }

    fn ch(&self, k: usize) -> Option<char> {
        self.runes.get(self.pos + k).map(|r| r.ch)
    }

    pub fn next_token(&mut self, report: &mut Report) -> PpResult<Token> {
        let Some(rune) = self.runes.get(self.pos).copied() else {
            return Ok(Token::empty(TokenKind::Eof, self.eof));
        };
        let location = rune.location;
        let c = rune.ch;

        if c == '\n' {
            self.pos += 1;
            return Ok(Token::empty(TokenKind::Newline, location));
        }

        if matches!(c, ' ' | '\t' | '\x0B' | '\x0C')
            || (c == '/' && matches!(self.ch(1), Some('/' | '*')))
        {
            self.scan_whitespace(report)?;
            return Ok(Token::empty(TokenKind::Whitespace, location));
        }

        if self.include_mode
            && c == '<'
            && let Some(end) = self.header_name_end()
        {
            let spelling: String = self.runes[self.pos..=end].iter().map(|r| r.ch).collect();
            self.pos = end + 1;
            return Ok(Token::new(TokenKind::HeaderName, intern(&spelling), location));
        }

        if self.is_id_start(c) || (c == '\\' && self.ucn_at(self.pos, false).is_some()) {
            return self.scan_ident(report);
        }

        if c.is_ascii_digit() || (c == '.' && self.ch(1).is_some_and(|c| c.is_ascii_digit())) {
            return Ok(self.scan_number());
        }

        if c == '"' || c == '\'' {
            return self.scan_literal(self.pos, self.pos, Enc::Plain, report);
        }

        if let Some((punct, len)) = self.read_punct() {
            self.pos += len;
            return Ok(Token::punct(punct, location));
        }

        // Anything else is passed through as a stray character.
        self.pos += 1;
        return Ok(Token::new(TokenKind::Other, intern(&c.to_string()), location));
    }

    fn is_id_start(&self, c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_' || (c == '$' && self.tweaks.dollar_in_identifiers)
    }

    fn is_id_continue(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || (c == '$' && self.tweaks.dollar_in_identifiers)
    }

    /// Parses `\uXXXX` or `\UXXXXXXXX` at rune index `i`. Returns the
    /// code point, the number of runes consumed, and the spelling.
    /// `digits_ok` selects the identifier-continue position, where
    /// UCN digits are also allowed.
    fn ucn_at(&self, i: usize, digits_ok: bool) -> Option<(u32, usize, String)> {
        let kind = self.runes.get(i + 1)?.ch;
        let count = match kind {
            'u' => 4,
            'U' => 8,
            _ => return None,
        };
        let mut value: u32 = 0;
        let mut spelling = String::from('\\');
        spelling.push(kind);
        for k in 0..count {
            let c = self.runes.get(i + 2 + k)?.ch;
            let digit = c.to_digit(16)?;
            value = value * 16 + digit;
            spelling.push(c);
        }
        if ucn::is_ucn_nondigit(value) || (digits_ok && ucn::is_ucn_digit(value)) {
            Some((value, 2 + count, spelling))
        } else {
            None
        }
    }

    fn scan_ident(&mut self, report: &mut Report) -> PpResult<Token> {
        let location = self.runes[self.pos].location;
        let mut spelling = String::new();

        let first = self.runes[self.pos].ch;
        if first == '\\' {
            let (_, consumed, text) = self.ucn_at(self.pos, false).expect("checked UCN start");
            spelling.push_str(&text);
            self.pos += consumed;
        } else {
            spelling.push(first);
            self.pos += 1;
        }

        loop {
            let Some(c) = self.ch(0) else { break };
            if self.is_id_continue(c) {
                spelling.push(c);
                self.pos += 1;
                continue;
            }
            if c == '\\' {
                if let Some((_, consumed, text)) = self.ucn_at(self.pos, true) {
                    spelling.push_str(&text);
                    self.pos += consumed;
                    continue;
                }
                if matches!(self.ch(1), Some('u' | 'U')) {
                    report.error(
                        ErrorKind::Lex,
                        self.runes[self.pos].location,
                        "invalid universal character name in identifier",
                    )?;
                }
                break;
            }
            break;
        }

        // L"..." u"..." U"..." u8"..." and the character forms.
        let enc = match spelling.as_str() {
            "L" => Some(Enc::Wide),
            "u" => Some(Enc::Utf16),
            "U" => Some(Enc::Utf32),
            "u8" => Some(Enc::Utf8),
            _ => None,
        };
        if let Some(enc) = enc
            && matches!(self.ch(0), Some('"' | '\''))
            && matches!(self.literal_end(self.pos), LiteralEnd::Closed(_))
        {
            let prefix_len = spelling.chars().count();
            return self.scan_literal(self.pos - prefix_len, self.pos, enc, report);
        }

        Ok(Token::new(TokenKind::Ident, intern(&spelling), location))
    }

    /// Greedy pp-number: digit or `.`digit, then any run of
    /// `[0-9a-zA-Z_.]` plus `+`/`-` directly after an exponent letter.
    fn scan_number(&mut self) -> Token {
        let location = self.runes[self.pos].location;
        let mut spelling = String::new();
        let mut prev = self.runes[self.pos].ch;
        spelling.push(prev);
        self.pos += 1;

        while let Some(c) = self.ch(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                spelling.push(c);
                prev = c;
                self.pos += 1;
            } else if matches!(c, '+' | '-') && matches!(prev, 'e' | 'E' | 'p' | 'P') {
                spelling.push(c);
                prev = c;
                self.pos += 1;
            } else {
                break;
            }
        }

        let kind = classify_number(&spelling);
        Token::new(kind, intern(&spelling), location)
    }

    /// Locates the closing quote of a literal starting at `quote`.
    /// No side effects, so a failed scan can fall back cleanly.
    fn literal_end(&self, quote: usize) -> LiteralEnd {
        let term = self.runes[quote].ch;
        let mut i = quote + 1;
        loop {
            let Some(r) = self.runes.get(i) else {
                return LiteralEnd::Eof;
            };
            match r.ch {
                '\n' => return LiteralEnd::Newline,
                '\\' => i += 2,
                c if c == term => return LiteralEnd::Closed(i),
                _ => i += 1,
            }
        }
    }

    /// Scans a character or string literal whose spelling begins at rune
    /// `start` (before any encoding prefix) with the quote at `quote`.
    /// An unterminated literal backs off to the bare quote character; a
    /// newline in the middle is a lex error, end of input is not (the
    /// scanner is expected to pass the pieces through silently).
    fn scan_literal(
        &mut self,
        start: usize,
        quote: usize,
        enc: Enc,
        report: &mut Report,
    ) -> PpResult<Token> {
        let term = self.runes[quote].ch;
        let location = self.runes[start].location;
        match self.literal_end(quote) {
            LiteralEnd::Closed(end) => {
                let spelling: String = self.runes[start..=end].iter().map(|r| r.ch).collect();
                self.pos = end + 1;
                let kind = if term == '"' {
                    TokenKind::StrLit(enc)
                } else {
                    TokenKind::CharConst(enc)
                };
                Ok(Token::new(kind, intern(&spelling), location))
            }
            cause => {
                if matches!(cause, LiteralEnd::Newline) {
                    let what = if term == '"' { "string" } else { "character" };
                    report.error(
                        ErrorKind::Lex,
                        self.runes[quote].location,
                        format!("unterminated {what} literal"),
                    )?;
                }
                let quote_loc = self.runes[quote].location;
                self.pos = quote + 1;
                Ok(Token::new(
                    TokenKind::Other,
                    intern(&term.to_string()),
                    quote_loc,
                ))
            }
        }
    }

    fn header_name_end(&self) -> Option<usize> {
        let mut i = self.pos + 1;
        loop {
            match self.runes.get(i)?.ch {
                '>' => return Some(i),
                '\n' => return None,
                _ => i += 1,
            }
        }
    }

    fn scan_whitespace(&mut self, report: &mut Report) -> PpResult<()> {
        loop {
            match self.ch(0) {
                Some(' ' | '\t' | '\x0B' | '\x0C') => self.pos += 1,
                Some('/') if self.ch(1) == Some('/') => {
                    self.pos += 2;
                    while let Some(c) = self.ch(0) {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some('/') if self.ch(1) == Some('*') => {
                    let start = self.runes[self.pos].location;
                    self.pos += 2;
                    let mut closed = false;
                    while let Some(c) = self.ch(0) {
                        if c == '*' && self.ch(1) == Some('/') {
                            self.pos += 2;
                            closed = true;
                            break;
                        }
                        self.pos += 1;
                    }
                    if !closed {
                        report.error(ErrorKind::Lex, start, "unclosed block comment")?;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_punct(&mut self) -> Option<(Punct, usize)> {
        let c0 = self.ch(0)?;
        let c1 = self.ch(1);
        let c2 = self.ch(2);

        if c0 == '.' && c1 == Some('.') && c2 == Some('.') {
            return Some((Punct::Ellipsis, 3));
        }
        if c0 == '<' && c1 == Some('<') && c2 == Some('=') {
            return Some((Punct::ShlAssign, 3));
        }
        if c0 == '>' && c1 == Some('>') && c2 == Some('=') {
            return Some((Punct::ShrAssign, 3));
        }

        let two = match (c0, c1) {
            ('#', Some('#')) => Some(Punct::HashHash),
            ('=', Some('=')) => Some(Punct::EqEq),
            ('!', Some('=')) => Some(Punct::NotEq),
            ('<', Some('=')) => Some(Punct::LessEq),
            ('>', Some('=')) => Some(Punct::GreaterEq),
            ('-', Some('>')) => Some(Punct::Arrow),
            ('<', Some('<')) => Some(Punct::Shl),
            ('>', Some('>')) => Some(Punct::Shr),
            ('+', Some('=')) => Some(Punct::AddAssign),
            ('-', Some('=')) => Some(Punct::SubAssign),
            ('*', Some('=')) => Some(Punct::MulAssign),
            ('/', Some('=')) => Some(Punct::DivAssign),
            ('%', Some('=')) => Some(Punct::ModAssign),
            ('&', Some('&')) => Some(Punct::LogAnd),
            ('&', Some('=')) => Some(Punct::AndAssign),
            ('|', Some('|')) => Some(Punct::LogOr),
            ('|', Some('=')) => Some(Punct::OrAssign),
            ('^', Some('=')) => Some(Punct::XorAssign),
            ('+', Some('+')) => Some(Punct::Inc),
            ('-', Some('-')) => Some(Punct::Dec),
            _ => None,
        };
        if let Some(p) = two {
            return Some((p, 2));
        }

        let one = match c0 {
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '*' => Punct::Star,
            '&' => Punct::Amp,
            '#' => Punct::Hash,
            '|' => Punct::Pipe,
            '^' => Punct::Caret,
            '/' => Punct::Slash,
            '%' => Punct::Mod,
            '.' => Punct::Dot,
            '!' => Punct::Not,
            '~' => Punct::BitNot,
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ';' => Punct::Semicolon,
            ',' => Punct::Comma,
            ':' => Punct::Colon,
            '?' => Punct::Question,
            '<' => Punct::Less,
            '>' => Punct::Greater,
            '=' => Punct::Assign,
            _ => return None,
        };
        Some((one, 1))
    }
}

fn classify_number(spelling: &str) -> TokenKind {
    if spelling.contains('.') {
        return TokenKind::FloatConst;
    }
    if spelling.starts_with("0x") || spelling.starts_with("0X") {
        if spelling.contains(['p', 'P']) {
            return TokenKind::FloatConst;
        }
        return TokenKind::IntConst;
    }
    if spelling.contains(['e', 'E']) {
        return TokenKind::FloatConst;
    }
    TokenKind::IntConst
}
