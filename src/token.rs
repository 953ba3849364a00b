use crate::error::SourceLocation;
use crate::symbols::{self, SymId};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Encoding prefix of a character or string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Enc {
    Plain,
    Wide,  // L
    Utf16, // u
    Utf32, // U
    Utf8,  // u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Punct(Punct),
    Ident,
    IntConst,
    FloatConst,
    CharConst(Enc),
    StrLit(Enc),
    HeaderName,
    Whitespace,
    Newline,
    /// A stray character the scanner passes through (`\`, `@`, NUL, ...).
    Other,
    /// Synthetic empty token standing in for an empty `##` operand.
    Placemarker,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Punct {
    Plus,
    Minus,
    Star,
    Amp,
    Hash,
    HashHash,
    Pipe,
    Caret,
    Slash,
    Mod,
    Dot,
    Ellipsis,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Question,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    Inc,
    Dec,
    Not,
    BitNot,
    LogAnd,
    LogOr,
    Shl,
    Shr,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl Punct {
    pub fn spelling(self) -> &'static str {
        match self {
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Amp => "&",
            Punct::Hash => "#",
            Punct::HashHash => "##",
            Punct::Pipe => "|",
            Punct::Caret => "^",
            Punct::Slash => "/",
            Punct::Mod => "%",
            Punct::Dot => ".",
            Punct::Ellipsis => "...",
            Punct::Arrow => "->",
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::Semicolon => ";",
            Punct::Comma => ",",
            Punct::Colon => ":",
            Punct::Question => "?",
            Punct::Assign => "=",
            Punct::AddAssign => "+=",
            Punct::SubAssign => "-=",
            Punct::MulAssign => "*=",
            Punct::DivAssign => "/=",
            Punct::ModAssign => "%=",
            Punct::AndAssign => "&=",
            Punct::OrAssign => "|=",
            Punct::XorAssign => "^=",
            Punct::ShlAssign => "<<=",
            Punct::ShrAssign => ">>=",
            Punct::Inc => "++",
            Punct::Dec => "--",
            Punct::Not => "!",
            Punct::BitNot => "~",
            Punct::LogAnd => "&&",
            Punct::LogOr => "||",
            Punct::Shl => "<<",
            Punct::Shr => ">>",
            Punct::EqEq => "==",
            Punct::NotEq => "!=",
            Punct::Less => "<",
            Punct::LessEq => "<=",
            Punct::Greater => ">",
            Punct::GreaterEq => ">=",
        }
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Macro names a token shall not be re-expanded from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HideSet {
    names: HashSet<SymId>,
}

impl HideSet {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            names: self.names.union(&other.names).cloned().collect(),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            names: self.names.intersection(&other.names).cloned().collect(),
        }
    }

    pub fn contains(&self, name: SymId) -> bool {
        self.names.contains(&name)
    }

    pub fn add(&mut self, name: SymId) {
        self.names.insert(name);
    }

    pub fn add_tokens(&self, tokens: &mut [Token]) {
        for tok in tokens {
            tok.hideset = tok.hideset.union(self);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Interned source spelling for content-carrying kinds; the empty
    /// symbol otherwise.
    pub val: SymId,
    pub location: SourceLocation,
    pub hideset: HideSet,
    /// Position of the macro invocation this token was expanded from.
    pub origin: Option<SourceLocation>,
}

impl Token {
    pub fn new(kind: TokenKind, val: SymId, location: SourceLocation) -> Self {
        Self {
            kind,
            val,
            location,
            hideset: HideSet::default(),
            origin: None,
        }
    }

    pub fn punct(p: Punct, location: SourceLocation) -> Self {
        Self::new(TokenKind::Punct(p), symbols::intern(""), location)
    }

    pub fn empty(kind: TokenKind, location: SourceLocation) -> Self {
        Self::new(kind, symbols::intern(""), location)
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Newline)
    }

    pub fn is_punct(&self, p: Punct) -> bool {
        self.kind == TokenKind::Punct(p)
    }

    pub fn is_ident(&self, name: SymId) -> bool {
        self.kind == TokenKind::Ident && self.val == name
    }

    /// Spelling equality; positions and hide sets are ignored.
    pub fn same(&self, other: &Token) -> bool {
        self.kind == other.kind
            && match self.kind {
                TokenKind::Punct(_)
                | TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::Placemarker
                | TokenKind::Eof => true,
                _ => self.val == other.val,
            }
    }
}

/// Reproduces the token's source spelling (after translation phases 1-2).
pub fn tok_src(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Punct(p) => p.spelling().to_string(),
        TokenKind::Whitespace => " ".to_string(),
        TokenKind::Newline => "\n".to_string(),
        TokenKind::Placemarker | TokenKind::Eof => String::new(),
        _ => symbols::sym_text(tok.val),
    }
}

/// Joins token spellings with whitespace runs collapsed to a single
/// space; leading and trailing whitespace is dropped. This is the
/// normalization `#` stringification and `#error` reporting use.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for tok in tokens {
        match tok.kind {
            TokenKind::Eof => break,
            TokenKind::Whitespace | TokenKind::Newline => {
                if !out.is_empty() {
                    pending_space = true;
                }
            }
            TokenKind::Placemarker => {}
            _ => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push_str(&tok_src(tok));
            }
        }
    }
    out
}

/// Wraps `input` in double quotes, escaping `"` and `\`.
pub fn quote_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    for ch in input.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
