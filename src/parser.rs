//! Preprocessing parser: recognizes a preprocessing-file as a sequence
//! of group-parts without expanding anything.
//!
//! A group-part is a text line (kept as its raw token run), a control
//! line, or a conditional section with its branches nested inside.
//! Conditional bookkeeping (stray or duplicate `#else`, `#elif` after
//! `#else`, unmatched `#endif`, unterminated `#if`) is enforced here;
//! which branch runs is the preprocessor's decision.
//!
//! End of input terminates a line just like a newline does, so the AST
//! for a source with no final newline is identical to the same source
//! with one.

use crate::error::{ErrorKind, PpResult, Report, SourceLocation};
use crate::lexer::Lexer;
use crate::macros::{MacroDef, MacroParams};
use crate::options::Tweaks;
use crate::symbols::{intern, sym_text};
use crate::token::{Punct, Token, TokenKind};

#[derive(Debug)]
pub struct PreprocessingFile {
    pub file_no: usize,
    pub parts: Vec<GroupPart>,
}

#[derive(Debug, Clone)]
pub enum GroupPart {
    TextLine(Vec<Token>),
    Control(ControlLine),
    Conditional(IfSection),
}

#[derive(Debug, Clone)]
pub enum ControlLine {
    Include {
        tokens: Vec<Token>,
        location: SourceLocation,
    },
    IncludeNext {
        tokens: Vec<Token>,
        location: SourceLocation,
    },
    Define(MacroDef),
    Undef {
        name: Token,
        extra: Vec<Token>,
    },
    Line {
        tokens: Vec<Token>,
        location: SourceLocation,
    },
    Error {
        tokens: Vec<Token>,
        location: SourceLocation,
    },
    Warning {
        tokens: Vec<Token>,
        location: SourceLocation,
    },
    Pragma {
        tokens: Vec<Token>,
    },
    /// A lone `#`.
    Null,
    /// Unrecognized directive; diagnosed here, tokens preserved.
    Unknown {
        tokens: Vec<Token>,
    },
}

#[derive(Debug, Clone)]
pub struct IfSection {
    pub branches: Vec<IfBranch>,
    pub else_body: Option<Vec<GroupPart>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct IfBranch {
    pub kind: IfKind,
    pub condition: Vec<Token>,
    pub body: Vec<GroupPart>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfKind {
    If,
    Ifdef,
    Ifndef,
    Elif,
}

pub fn parse_source(
    file_no: usize,
    source: &str,
    tweaks: &Tweaks,
    report: &mut Report,
) -> PpResult<PreprocessingFile> {
    let lexer = Lexer::new(file_no, source, tweaks);
    let mut parser = Parser {
        lexer,
        report,
        tweaks,
    };
    let (parts, _) = parser.group(false)?;
    Ok(PreprocessingFile { file_no, parts })
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    report: &'a mut Report,
    tweaks: &'a Tweaks,
}

enum LineItem {
    Eof,
    Text(Vec<Token>),
    Directive {
        name: Option<Token>,
        rest: Vec<Token>,
        hash_loc: SourceLocation,
    },
}

enum End {
    Eof,
    Elif {
        condition: Vec<Token>,
        location: SourceLocation,
    },
    Else {
        location: SourceLocation,
    },
    Endif,
}

impl<'a> Parser<'a> {
    fn group(&mut self, nested: bool) -> PpResult<(Vec<GroupPart>, End)> {
        let mut parts = Vec::new();
        loop {
            match self.line()? {
                LineItem::Eof => return Ok((parts, End::Eof)),
                LineItem::Text(tokens) => {
                    if tokens.iter().any(|tok| !tok.is_whitespace()) {
                        parts.push(GroupPart::TextLine(tokens));
                    }
                }
                LineItem::Directive {
                    name,
                    rest,
                    hash_loc,
                } => {
                    let Some(name_tok) = name else {
                        parts.push(GroupPart::Control(ControlLine::Null));
                        continue;
                    };
                    let name_text = sym_text(name_tok.val);
                    match name_text.as_str() {
                        "define" => {
                            let control = self.parse_define(rest, name_tok.location)?;
                            parts.push(GroupPart::Control(control));
                        }
                        "undef" => {
                            let control = self.parse_undef(rest, name_tok.location)?;
                            parts.push(GroupPart::Control(control));
                        }
                        "include" => parts.push(GroupPart::Control(ControlLine::Include {
                            tokens: rest,
                            location: hash_loc,
                        })),
                        "include_next" if self.tweaks.include_next => {
                            parts.push(GroupPart::Control(ControlLine::IncludeNext {
                                tokens: rest,
                                location: hash_loc,
                            }))
                        }
                        "line" => parts.push(GroupPart::Control(ControlLine::Line {
                            tokens: rest,
                            location: hash_loc,
                        })),
                        "error" => parts.push(GroupPart::Control(ControlLine::Error {
                            tokens: rest,
                            location: hash_loc,
                        })),
                        "warning" => parts.push(GroupPart::Control(ControlLine::Warning {
                            tokens: rest,
                            location: hash_loc,
                        })),
                        "pragma" => {
                            parts.push(GroupPart::Control(ControlLine::Pragma { tokens: rest }))
                        }
                        "if" => {
                            let section = self.if_section(IfKind::If, rest, hash_loc)?;
                            parts.push(GroupPart::Conditional(section));
                        }
                        "ifdef" => {
                            let section = self.if_section(IfKind::Ifdef, rest, hash_loc)?;
                            parts.push(GroupPart::Conditional(section));
                        }
                        "ifndef" => {
                            let section = self.if_section(IfKind::Ifndef, rest, hash_loc)?;
                            parts.push(GroupPart::Conditional(section));
                        }
                        "elif" => {
                            if nested {
                                return Ok((
                                    parts,
                                    End::Elif {
                                        condition: rest,
                                        location: hash_loc,
                                    },
                                ));
                            }
                            self.report
                                .error(ErrorKind::Directive, hash_loc, "#elif without #if")?;
                        }
                        "else" => {
                            if nested {
                                return Ok((parts, End::Else { location: hash_loc }));
                            }
                            self.report
                                .error(ErrorKind::Directive, hash_loc, "stray #else")?;
                        }
                        "endif" => {
                            if nested {
                                return Ok((parts, End::Endif));
                            }
                            self.report
                                .error(ErrorKind::Directive, hash_loc, "stray #endif")?;
                        }
                        _ => {
                            self.report.error(
                                ErrorKind::Directive,
                                name_tok.location,
                                format!("invalid preprocessor directive #{name_text}"),
                            )?;
                            let mut tokens = vec![name_tok];
                            tokens.extend(rest);
                            parts.push(GroupPart::Control(ControlLine::Unknown { tokens }));
                        }
                    }
                }
            }
        }
    }

    fn if_section(
        &mut self,
        kind: IfKind,
        condition: Vec<Token>,
        location: SourceLocation,
    ) -> PpResult<IfSection> {
        if matches!(kind, IfKind::Ifdef | IfKind::Ifndef)
            && !condition.iter().any(|tok| tok.kind == TokenKind::Ident)
        {
            self.report.error(
                ErrorKind::Directive,
                location,
                "macro name must be an identifier",
            )?;
        }

        let mut branches = vec![IfBranch {
            kind,
            condition,
            body: Vec::new(),
            location,
        }];
        let mut else_body: Option<Vec<GroupPart>> = None;

        loop {
            let (parts, end) = self.group(true)?;
            match else_body.as_mut() {
                Some(body) => body.extend(parts),
                None => branches.last_mut().expect("branch").body.extend(parts),
            }
            match end {
                End::Elif {
                    condition,
                    location: elif_loc,
                } => {
                    if else_body.is_some() {
                        self.report
                            .error(ErrorKind::Directive, elif_loc, "#elif after #else")?;
                    } else {
                        branches.push(IfBranch {
                            kind: IfKind::Elif,
                            condition,
                            body: Vec::new(),
                            location: elif_loc,
                        });
                    }
                }
                End::Else { location: else_loc } => {
                    if else_body.is_some() {
                        self.report
                            .error(ErrorKind::Directive, else_loc, "#else after #else")?;
                    } else {
                        else_body = Some(Vec::new());
                    }
                }
                End::Endif => {
                    return Ok(IfSection {
                        branches,
                        else_body,
                        location,
                    });
                }
                End::Eof => {
                    self.report.error(
                        ErrorKind::Directive,
                        location,
                        "unterminated conditional directive",
                    )?;
                    return Ok(IfSection {
                        branches,
                        else_body,
                        location,
                    });
                }
            }
        }
    }

    /// Reads one logical line. End of input terminates a line.
    fn line(&mut self) -> PpResult<LineItem> {
        let mut lead = Vec::new();
        loop {
            let tok = self.lexer.next_token(self.report)?;
            match tok.kind {
                TokenKind::Eof => return Ok(LineItem::Eof),
                TokenKind::Newline => return Ok(LineItem::Text(lead)),
                TokenKind::Whitespace => lead.push(tok),
                TokenKind::Punct(Punct::Hash) => return self.directive_line(tok.location),
                _ => {
                    let mut tokens = lead;
                    tokens.push(tok);
                    loop {
                        let tok = self.lexer.next_token(self.report)?;
                        if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
                            break;
                        }
                        tokens.push(tok);
                    }
                    return Ok(LineItem::Text(tokens));
                }
            }
        }
    }

    fn directive_line(&mut self, hash_loc: SourceLocation) -> PpResult<LineItem> {
        let name = loop {
            let tok = self.lexer.next_token(self.report)?;
            match tok.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Newline | TokenKind::Eof => {
                    return Ok(LineItem::Directive {
                        name: None,
                        rest: Vec::new(),
                        hash_loc,
                    });
                }
                TokenKind::Ident => break tok,
                _ => {
                    self.report.error(
                        ErrorKind::Directive,
                        tok.location,
                        "invalid preprocessor directive",
                    )?;
                    self.skip_to_newline()?;
                    return Ok(LineItem::Directive {
                        name: None,
                        rest: Vec::new(),
                        hash_loc,
                    });
                }
            }
        };

        let name_text = sym_text(name.val);
        let header_ok = name_text == "include" || name_text == "include_next";
        if header_ok {
            self.lexer.set_include_mode(true);
        }
        let mut rest = Vec::new();
        loop {
            let tok = self.lexer.next_token(self.report)?;
            if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            rest.push(tok);
        }
        if header_ok {
            self.lexer.set_include_mode(false);
        }
        Ok(LineItem::Directive {
            name: Some(name),
            rest,
            hash_loc,
        })
    }

    fn skip_to_newline(&mut self) -> PpResult<()> {
        loop {
            let tok = self.lexer.next_token(self.report)?;
            if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
                return Ok(());
            }
        }
    }

    fn parse_undef(
        &mut self,
        rest: Vec<Token>,
        directive_loc: SourceLocation,
    ) -> PpResult<ControlLine> {
        let mut toks = rest.into_iter().filter(|tok| !tok.is_whitespace());
        let Some(name) = toks.next() else {
            self.report.error(
                ErrorKind::Macro,
                directive_loc,
                "macro name must be an identifier",
            )?;
            return Ok(ControlLine::Null);
        };
        if name.kind != TokenKind::Ident {
            self.report.error(
                ErrorKind::Macro,
                name.location,
                "macro name must be an identifier",
            )?;
            return Ok(ControlLine::Null);
        }
        Ok(ControlLine::Undef {
            name,
            extra: toks.collect(),
        })
    }

    fn parse_define(
        &mut self,
        rest: Vec<Token>,
        directive_loc: SourceLocation,
    ) -> PpResult<ControlLine> {
        let toks = rest;
        let mut i = 0;
        while toks.get(i).is_some_and(|tok| tok.is_whitespace()) {
            i += 1;
        }
        let Some(name) = toks.get(i) else {
            self.report.error(
                ErrorKind::Macro,
                directive_loc,
                "macro name must be an identifier",
            )?;
            return Ok(ControlLine::Null);
        };
        if name.kind != TokenKind::Ident {
            self.report.error(
                ErrorKind::Macro,
                name.location,
                "macro name must be an identifier",
            )?;
            return Ok(ControlLine::Null);
        }
        let name = name.clone();
        i += 1;

        // A parameter list only when '(' follows the name directly.
        let params = if toks.get(i).is_some_and(|tok| tok.is_punct(Punct::LParen)) {
            i += 1;
            Some(self.parse_params(&toks, &mut i, &name)?)
        } else {
            None
        };

        let mut body: &[Token] = &toks[i.min(toks.len())..];
        while body.first().is_some_and(|tok| tok.is_whitespace()) {
            body = &body[1..];
        }
        while body.last().is_some_and(|tok| tok.is_whitespace()) {
            body = &body[..body.len() - 1];
        }

        if body.is_empty() && !self.tweaks.empty_define {
            self.report.error(
                ErrorKind::Macro,
                name.location,
                format!("macro '{}' defined with no replacement list", sym_text(name.val)),
            )?;
        }
        if let Some(first) = body.first()
            && first.is_punct(Punct::HashHash)
        {
            self.report.error(
                ErrorKind::Macro,
                first.location,
                "'##' cannot appear at start of macro expansion",
            )?;
        }
        if body.len() > 1
            && let Some(last) = body.last()
            && last.is_punct(Punct::HashHash)
        {
            self.report.error(
                ErrorKind::Macro,
                last.location,
                "'##' cannot appear at end of macro expansion",
            )?;
        }
        if let Some(params) = &params {
            self.check_stringize_operands(body, params)?;
        }

        Ok(ControlLine::Define(MacroDef {
            name: name.val,
            name_loc: name.location,
            params,
            body: body.to_vec(),
            predefined: false,
            builtin: None,
        }))
    }

    fn parse_params(
        &mut self,
        toks: &[Token],
        i: &mut usize,
        name: &Token,
    ) -> PpResult<MacroParams> {
        let mut params = MacroParams {
            names: Vec::new(),
            variadic: false,
            va_name: intern("__VA_ARGS__"),
            named_varargs: false,
        };
        let skip_ws = |i: &mut usize| {
            while toks.get(*i).is_some_and(|tok| tok.is_whitespace()) {
                *i += 1;
            }
        };

        skip_ws(i);
        if toks.get(*i).is_some_and(|tok| tok.is_punct(Punct::RParen)) {
            *i += 1;
            return Ok(params);
        }

        loop {
            skip_ws(i);
            let Some(tok) = toks.get(*i) else {
                self.report
                    .error(ErrorKind::Macro, name.location, "expected ')'")?;
                return Ok(params);
            };
            if tok.is_punct(Punct::Ellipsis) {
                params.variadic = true;
                *i += 1;
                skip_ws(i);
                break;
            }
            if tok.kind != TokenKind::Ident {
                self.report.error(
                    ErrorKind::Macro,
                    tok.location,
                    "expected macro parameter name",
                )?;
                // Recover at the closing parenthesis.
                while toks.get(*i).is_some_and(|t| !t.is_punct(Punct::RParen)) {
                    *i += 1;
                }
                break;
            }
            let param = tok.clone();
            *i += 1;
            skip_ws(i);
            match toks.get(*i) {
                Some(tok) if tok.is_punct(Punct::Ellipsis) => {
                    // GNU `#define f(args...)`.
                    if !self.tweaks.omit_comma_before_ellipsis {
                        self.report.error(
                            ErrorKind::Macro,
                            tok.location,
                            "variadic parameters require ',' before '...'",
                        )?;
                    }
                    params.variadic = true;
                    params.named_varargs = true;
                    params.va_name = param.val;
                    *i += 1;
                    skip_ws(i);
                    break;
                }
                _ => {
                    if params.names.contains(&param.val) {
                        self.report.error(
                            ErrorKind::Macro,
                            param.location,
                            format!("duplicate macro parameter '{}'", sym_text(param.val)),
                        )?;
                    }
                    params.names.push(param.val);
                }
            }
            match toks.get(*i) {
                Some(tok) if tok.is_punct(Punct::Comma) => {
                    *i += 1;
                    continue;
                }
                Some(tok) if tok.is_punct(Punct::RParen) => break,
                Some(tok) => {
                    self.report
                        .error(ErrorKind::Macro, tok.location, "expected ',' or ')'")?;
                    while toks.get(*i).is_some_and(|t| !t.is_punct(Punct::RParen)) {
                        *i += 1;
                    }
                    break;
                }
                None => {
                    self.report
                        .error(ErrorKind::Macro, name.location, "expected ')'")?;
                    return Ok(params);
                }
            }
        }

        if toks.get(*i).is_some_and(|tok| tok.is_punct(Punct::RParen)) {
            *i += 1;
        } else {
            self.report
                .error(ErrorKind::Macro, name.location, "expected ')'")?;
        }
        Ok(params)
    }

    /// In a function-like macro body, `#` must be followed by a parameter.
    fn check_stringize_operands(&mut self, body: &[Token], params: &MacroParams) -> PpResult<()> {
        let mut i = 0;
        while i < body.len() {
            if body[i].is_punct(Punct::Hash) {
                let mut j = i + 1;
                while body.get(j).is_some_and(|tok| tok.is_whitespace()) {
                    j += 1;
                }
                let ok = body.get(j).is_some_and(|tok| {
                    tok.kind == TokenKind::Ident
                        && (params.names.contains(&tok.val)
                            || (params.variadic && tok.val == params.va_name))
                });
                if !ok {
                    self.report.error(
                        ErrorKind::Macro,
                        body[i].location,
                        "'#' is not followed by a macro parameter",
                    )?;
                }
            }
            i += 1;
        }
        Ok(())
    }
}
