// This file implements the preprocessing engine.
//
// The engine walks preprocessing-file ASTs, drives conditional
// inclusion and #include resolution, and performs macro expansion.
//
// The preprocessing language is designed in such a way that expansion
// is guaranteed to stop even for a recursive macro. Informally, a macro
// is applied at most once for each token: if a macro token T appears in
// a result of direct or indirect expansion of T, it is not expanded any
// further. To get that behavior we attach to each token the set of
// macro names it was expanded from, called a "hide set". A token whose
// hide set contains its own name is never expanded again. The scheme is
// Dave Prosser's algorithm, which the standard's wording is based on.
//
// Expansion works over a pending token queue. Replacement lists are
// pushed back onto the front of the queue so rescanning picks up new
// invocations, including ones whose argument lists only complete on a
// later source line. Newlines crossed while collecting an argument list
// are forwarded to the sink immediately, which keeps the emitted line
// structure aligned with the source.

use crate::error::{ErrorKind, PpError, PpResult, Report, SourceLocation};
use crate::expr;
use crate::lexer::Lexer;
use crate::macros::{Builtin, MacroDef, MacroTable};
use crate::options::Options;
use crate::parser::{self, ControlLine, GroupPart, IfBranch, IfKind, IfSection};
use crate::symbols::{self, SymId, intern, sym_text};
use crate::token::{Enc, HideSet, Punct, Token, TokenKind, join_tokens, quote_string, tok_src};
use chrono::{Datelike, Local, Timelike};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const INCLUDE_DEPTH_LIMIT: usize = 200;

/// Receives the final token stream. Tokens arrive in the logical order
/// of source evaluation, one call per token; `#pragma` lines arrive
/// through the optional second method.
pub trait TokenSink {
    fn token(&mut self, tok: &Token);
    fn pragma(&mut self, _tokens: &[Token]) {}
}

impl<F: FnMut(&Token)> TokenSink for F {
    fn token(&mut self, tok: &Token) {
        self(tok)
    }
}

/// What a preprocessing run leaves behind: every diagnostic, and every
/// source the engine actually opened (inputs, includes and the
/// predefined pseudo-source).
#[derive(Debug)]
pub struct Preprocessed {
    pub report: Report,
    pub sources: Vec<PathBuf>,
}

struct OpenFile {
    file_no: usize,
    dir: PathBuf,
    /// Index into the angle include paths this file was found at; the
    /// `#include_next` search resumes after it.
    angle_idx: Option<usize>,
    /// `#line` state: added to physical lines for `__LINE__`.
    line_delta: i64,
    /// Name reported by `__FILE__`; rewritten by `#line N "name"`.
    display_name: String,
}

enum Expanded {
    /// Replacement pushed onto the queue front; rescan from there.
    Replaced,
    /// Front token stays an ordinary token.
    NotAMacro,
    /// Function-like name with no visible `(`; more input may arrive.
    NeedMoreInput,
}

struct MacroArg {
    name: SymId,
    is_va: bool,
    tokens: Vec<Token>,
}

/// Preprocesses `opts.predefined` and then every input file, streaming
/// tokens to `sink`.
pub fn preprocess(opts: &Options, sink: &mut dyn TokenSink) -> PpResult<Preprocessed> {
    let mut pp = Preprocessor::new(opts, sink);
    pp.init_macros();
    pp.predefines()?;
    for path in opts.inputs.clone() {
        pp.process_path(path)?;
    }
    Ok(pp.finish())
}

/// Like [`preprocess`], for a single in-memory source.
pub fn preprocess_source(
    name: &str,
    source: &str,
    opts: &Options,
    sink: &mut dyn TokenSink,
) -> PpResult<Preprocessed> {
    let mut pp = Preprocessor::new(opts, sink);
    pp.init_macros();
    pp.predefines()?;
    pp.opened.push(PathBuf::from(name));
    pp.process_text(name, source, PathBuf::from("."), None, true)?;
    Ok(pp.finish())
}

pub struct Preprocessor<'a> {
    opts: &'a Options,
    report: Report,
    macros: MacroTable,
    sink: &'a mut dyn TokenSink,
    files: Vec<OpenFile>,
    opened: Vec<PathBuf>,
    pending: VecDeque<Token>,
    ws_queue: Vec<Token>,
    line_has_tokens: bool,
    emit: bool,
}

impl<'a> Preprocessor<'a> {
    fn new(opts: &'a Options, sink: &'a mut dyn TokenSink) -> Preprocessor<'a> {
        Preprocessor {
            opts,
            report: Report::new(
                opts.error_limit,
                opts.panic_on_error,
                opts.disable_warnings,
            ),
            macros: MacroTable::new(),
            sink,
            files: Vec::new(),
            opened: Vec::new(),
            pending: VecDeque::new(),
            ws_queue: Vec::new(),
            line_has_tokens: false,
            emit: true,
        }
    }

    fn finish(self) -> Preprocessed {
        Preprocessed {
            report: self.report,
            sources: self.opened,
        }
    }

    // ------------------------------------------------------------------
    // Predefined macros

    fn init_macros(&mut self) {
        let file_no = symbols::register_file("<built-in>");
        self.define_predefined(file_no, "__STDC__", "1");
        self.define_predefined(file_no, "__STDC_VERSION__", "199901L");
        self.define_predefined(file_no, "__STDC_HOSTED__", "1");
        self.define_predefined(file_no, "__DATE__", &Self::format_date());
        self.define_predefined(file_no, "__TIME__", &Self::format_time());
        self.add_builtin(file_no, "__FILE__", Builtin::File);
        self.add_builtin(file_no, "__LINE__", Builtin::Line);
    }

    fn define_predefined(&mut self, file_no: usize, name: &str, body: &str) {
        let mut scratch = Report::new(-1, false, true);
        let mut lexer = Lexer::new(file_no, body, &self.opts.tweaks);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer
                .next_token(&mut scratch)
                .expect("predefined macro body lexes");
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Whitespace | TokenKind::Newline => {}
                _ => tokens.push(tok),
            }
        }
        self.macros.install(MacroDef {
            name: intern(name),
            name_loc: builtin_location(file_no),
            params: None,
            body: tokens,
            predefined: true,
            builtin: None,
        });
    }

    fn add_builtin(&mut self, file_no: usize, name: &str, builtin: Builtin) {
        self.macros.install(MacroDef {
            name: intern(name),
            name_loc: builtin_location(file_no),
            params: None,
            body: Vec::new(),
            predefined: true,
            builtin: Some(builtin),
        });
    }

    /// __DATE__ is the current date, e.g. "Jan  1 2026"; the format is
    /// always "Mmm DD YYYY".
    fn format_date() -> String {
        let now = Local::now();
        let month_names = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        let month = month_names[now.month0() as usize];
        format!("\"{} {:2} {}\"", month, now.day(), now.year())
    }

    /// __TIME__ is the current time, always "HH:MM:SS".
    fn format_time() -> String {
        let now = Local::now();
        format!(
            "\"{:02}:{:02}:{:02}\"",
            now.hour(),
            now.minute(),
            now.second()
        )
    }

    // ------------------------------------------------------------------
    // File processing

    /// The predefined-macro string is a synthetic first source: its
    /// directives take effect, its text lines are discarded.
    fn predefines(&mut self) -> PpResult<()> {
        if self.opts.predefined.is_empty() {
            return Ok(());
        }
        self.opened.push(PathBuf::from("<predefine>"));
        let predefined = self.opts.predefined.clone();
        self.process_text("<predefine>", &predefined, PathBuf::from("."), None, false)
    }

    fn process_path(&mut self, path: PathBuf) -> PpResult<()> {
        let contents = fs::read_to_string(&path)
            .map_err(|err| PpError::new(format!("failed to read {}: {err}", path.display())))?;
        self.opened.push(path.clone());
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        self.process_text(&path.display().to_string(), &contents, dir, None, true)
    }

    fn process_text(
        &mut self,
        name: &str,
        source: &str,
        dir: PathBuf,
        angle_idx: Option<usize>,
        emit: bool,
    ) -> PpResult<()> {
        let file_no = symbols::register_file(name);
        let ast = parser::parse_source(file_no, source, &self.opts.tweaks, &mut self.report)?;
        self.files.push(OpenFile {
            file_no,
            dir,
            angle_idx,
            line_delta: 0,
            display_name: name.to_string(),
        });
        let saved_emit = self.emit;
        self.emit = emit;
        let result = self
            .group_parts(&ast.parts)
            .and_then(|()| self.drain_pending(true));
        self.emit = saved_emit;
        self.files.pop();
        result
    }

    fn group_parts(&mut self, parts: &[GroupPart]) -> PpResult<()> {
        for part in parts {
            match part {
                GroupPart::TextLine(tokens) => self.text_line(tokens)?,
                GroupPart::Control(control) => {
                    self.drain_pending(true)?;
                    self.control_line(control)?;
                }
                GroupPart::Conditional(section) => {
                    self.drain_pending(true)?;
                    self.conditional(section)?;
                }
            }
        }
        Ok(())
    }

    fn conditional(&mut self, section: &IfSection) -> PpResult<()> {
        // One frame of the conditional-inclusion stack: branches after
        // the taken one are "done" and their conditions not evaluated.
        let mut taken = false;
        for branch in &section.branches {
            if taken {
                continue;
            }
            if self.eval_condition(branch)? {
                taken = true;
                self.group_parts(&branch.body)?;
            }
        }
        if !taken && let Some(body) = &section.else_body {
            self.group_parts(body)?;
        }
        Ok(())
    }

    fn eval_condition(&mut self, branch: &IfBranch) -> PpResult<bool> {
        match branch.kind {
            IfKind::Ifdef | IfKind::Ifndef => {
                let name = branch
                    .condition
                    .iter()
                    .find(|tok| tok.kind == TokenKind::Ident);
                let defined = name.is_some_and(|tok| self.macros.is_defined(tok.val));
                Ok(if branch.kind == IfKind::Ifdef {
                    defined
                } else {
                    !defined
                })
            }
            IfKind::If | IfKind::Elif => {
                let prepassed = self.replace_defined(&branch.condition)?;
                let expanded = self.expand_list(prepassed)?;
                let mut toks = Vec::new();
                for tok in expanded {
                    match tok.kind {
                        TokenKind::Whitespace
                        | TokenKind::Newline
                        | TokenKind::Placemarker
                        | TokenKind::Eof => {}
                        // Remaining identifiers are undefined macros: 0.
                        TokenKind::Ident => {
                            toks.push(Token::new(TokenKind::IntConst, intern("0"), tok.location))
                        }
                        _ => toks.push(tok),
                    }
                }
                if toks.is_empty() {
                    self.report
                        .error(ErrorKind::Expr, branch.location, "no expression")?;
                    return Ok(false);
                }
                let value = expr::eval(&toks, &mut self.report)?;
                Ok(value != 0)
            }
        }
    }

    /// Folds `defined X` and `defined(X)` before macro expansion; the
    /// operand itself is never expanded.
    fn replace_defined(&mut self, tokens: &[Token]) -> PpResult<Vec<Token>> {
        let defined_sym = intern("defined");
        let mut out = Vec::new();
        let mut i = 0;
        let skip_ws = |j: &mut usize| {
            while tokens.get(*j).is_some_and(|tok| tok.is_whitespace()) {
                *j += 1;
            }
        };
        while i < tokens.len() {
            let tok = &tokens[i];
            if !tok.is_ident(defined_sym) {
                out.push(tok.clone());
                i += 1;
                continue;
            }
            let mut j = i + 1;
            skip_ws(&mut j);
            let has_paren = tokens.get(j).is_some_and(|tok| tok.is_punct(Punct::LParen));
            if has_paren {
                j += 1;
                skip_ws(&mut j);
            }
            match tokens.get(j) {
                Some(name) if name.kind == TokenKind::Ident => {
                    let value = self.macros.is_defined(name.val);
                    out.push(Token::new(
                        TokenKind::IntConst,
                        intern(if value { "1" } else { "0" }),
                        tok.location,
                    ));
                    j += 1;
                    if has_paren {
                        skip_ws(&mut j);
                        if tokens.get(j).is_some_and(|tok| tok.is_punct(Punct::RParen)) {
                            j += 1;
                        } else {
                            self.report.error(
                                ErrorKind::Expr,
                                tok.location,
                                "expected ')' after 'defined'",
                            )?;
                        }
                    }
                    i = j;
                }
                _ => {
                    self.report.error(
                        ErrorKind::Expr,
                        tok.location,
                        "operator 'defined' requires an identifier",
                    )?;
                    out.push(Token::new(TokenKind::IntConst, intern("0"), tok.location));
                    i = j;
                }
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Control lines

    fn control_line(&mut self, control: &ControlLine) -> PpResult<()> {
        match control {
            ControlLine::Include { tokens, location } => self.include(tokens, *location, false),
            ControlLine::IncludeNext { tokens, location } => self.include(tokens, *location, true),
            ControlLine::Define(def) => self.macros.define(def.clone(), &mut self.report),
            ControlLine::Undef { name, extra } => {
                if !extra.is_empty() && !self.opts.tweaks.undef_extra_tokens {
                    self.report.warning(
                        ErrorKind::Directive,
                        extra[0].location,
                        "extra tokens after #undef",
                    );
                }
                self.macros.undefine(name.val);
                Ok(())
            }
            ControlLine::Line { tokens, location } => self.line_directive(tokens, *location),
            ControlLine::Error { tokens, location } => {
                let message = join_tokens(tokens);
                let message = if message.is_empty() {
                    "#error".to_string()
                } else {
                    format!("#error: {message}")
                };
                self.report.error(ErrorKind::Directive, *location, message)
            }
            ControlLine::Warning { tokens, location } => {
                let message = join_tokens(tokens);
                let message = if message.is_empty() {
                    "#warning".to_string()
                } else {
                    format!("#warning: {message}")
                };
                self.report.warning(ErrorKind::Directive, *location, message);
                Ok(())
            }
            ControlLine::Pragma { tokens } => {
                if self.emit {
                    let trimmed = trim_ws(tokens);
                    self.sink.pragma(trimmed);
                }
                Ok(())
            }
            ControlLine::Null | ControlLine::Unknown { .. } => Ok(()),
        }
    }

    fn include(&mut self, tokens: &[Token], location: SourceLocation, next: bool) -> PpResult<()> {
        if self.files.len() >= INCLUDE_DEPTH_LIMIT {
            self.report
                .error(ErrorKind::Include, location, "#include nested too deeply")?;
            return Ok(());
        }

        // C99 allows the filename to be built by macro expansion.
        let expanded = self.expand_list(tokens.to_vec())?;
        let Some((filename, is_quote, rest)) = self.include_filename(&expanded, location)? else {
            return Ok(());
        };
        if let Some(extra) = rest.iter().find(|tok| !tok.is_whitespace()) {
            self.report
                .warning(ErrorKind::Directive, extra.location, "extra token");
        }

        let fname = Path::new(&filename);
        let mut found: Option<(PathBuf, Option<usize>)> = None;
        if fname.is_absolute() {
            if fname.exists() {
                found = Some((fname.to_path_buf(), None));
            }
        } else if next {
            // Resume the angle-path search after the directory the
            // current file was found in.
            let start = self
                .files
                .last()
                .and_then(|file| file.angle_idx)
                .map(|idx| idx + 1)
                .unwrap_or(0);
            for (idx, dir) in self
                .opts
                .angle_include_paths
                .iter()
                .enumerate()
                .skip(start)
            {
                let candidate = dir.join(fname);
                if candidate.exists() {
                    found = Some((candidate, Some(idx)));
                    break;
                }
            }
        } else {
            if is_quote {
                let current_dir = self.files.last().map(|file| file.dir.clone());
                if let Some(dir) = current_dir {
                    let candidate = dir.join(fname);
                    if candidate.exists() {
                        found = Some((candidate, None));
                    }
                }
                if found.is_none() {
                    for dir in &self.opts.quote_include_paths {
                        let candidate = dir.join(fname);
                        if candidate.exists() {
                            found = Some((candidate, None));
                            break;
                        }
                    }
                }
            }
            if found.is_none() {
                for (idx, dir) in self.opts.angle_include_paths.iter().enumerate() {
                    let candidate = dir.join(fname);
                    if candidate.exists() {
                        found = Some((candidate, Some(idx)));
                        break;
                    }
                }
            }
        }

        let Some((path, angle_idx)) = found else {
            self.report.error(
                ErrorKind::Include,
                location,
                format!("include file not found: {filename}"),
            )?;
            return Ok(());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                self.report.error(
                    ErrorKind::Include,
                    location,
                    format!("failed to read {}: {err}", path.display()),
                )?;
                return Ok(());
            }
        };
        self.opened.push(path.clone());
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let emit = self.emit;
        self.process_text(&path.display().to_string(), &contents, dir, angle_idx, emit)
    }

    /// Classifies an expanded include token run as the quote or angle
    /// form. Returns the filename, whether it was the quote form, and
    /// the tokens following it.
    fn include_filename<'t>(
        &mut self,
        expanded: &'t [Token],
        location: SourceLocation,
    ) -> PpResult<Option<(String, bool, &'t [Token])>> {
        let mut i = 0;
        while expanded.get(i).is_some_and(|tok| tok.is_whitespace()) {
            i += 1;
        }
        let Some(first) = expanded.get(i) else {
            self.report
                .error(ErrorKind::Include, location, "expected a filename")?;
            return Ok(None);
        };
        match first.kind {
            TokenKind::StrLit(Enc::Plain) => {
                let spelling = sym_text(first.val);
                let name = spelling[1..spelling.len() - 1].to_string();
                Ok(Some((name, true, &expanded[i + 1..])))
            }
            TokenKind::HeaderName => {
                let spelling = sym_text(first.val);
                let name = spelling[1..spelling.len() - 1].to_string();
                Ok(Some((name, false, &expanded[i + 1..])))
            }
            TokenKind::Punct(Punct::Less) => {
                let mut name = String::new();
                let mut j = i + 1;
                loop {
                    match expanded.get(j) {
                        Some(tok) if tok.is_punct(Punct::Greater) => {
                            return Ok(Some((name, false, &expanded[j + 1..])));
                        }
                        Some(tok) => {
                            name.push_str(&tok_src(tok));
                            j += 1;
                        }
                        None => {
                            self.report
                                .error(ErrorKind::Include, first.location, "expected '>'")?;
                            return Ok(None);
                        }
                    }
                }
            }
            _ => {
                self.report
                    .error(ErrorKind::Include, first.location, "expected a filename")?;
                Ok(None)
            }
        }
    }

    fn line_directive(&mut self, tokens: &[Token], location: SourceLocation) -> PpResult<()> {
        let expanded = self.expand_list(tokens.to_vec())?;
        let sig: Vec<&Token> = expanded.iter().filter(|tok| !tok.is_whitespace()).collect();
        let Some(first) = sig.first() else {
            self.report
                .error(ErrorKind::Directive, location, "invalid line marker")?;
            return Ok(());
        };
        let line = if first.kind == TokenKind::IntConst {
            sym_text(first.val).parse::<i64>().ok()
        } else {
            None
        };
        let Some(line) = line else {
            self.report
                .error(ErrorKind::Directive, first.location, "invalid line marker")?;
            return Ok(());
        };
        let mut display = None;
        match sig.get(1) {
            None => {}
            Some(tok) if matches!(tok.kind, TokenKind::StrLit(Enc::Plain)) => {
                let spelling = sym_text(tok.val);
                display = Some(spelling[1..spelling.len() - 1].to_string());
            }
            Some(tok) => {
                self.report
                    .error(ErrorKind::Directive, tok.location, "filename expected")?;
                return Ok(());
            }
        }
        let file = self.files.last_mut().expect("open file");
        // The directive names the line of the *next* source line.
        file.line_delta = line - (location.line as i64 + 1);
        if let Some(display) = display {
            file.display_name = display;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Text lines and emission

    fn text_line(&mut self, tokens: &[Token]) -> PpResult<()> {
        if !self.emit {
            return Ok(());
        }
        for tok in tokens {
            self.pending.push_back(tok.clone());
        }
        let nl_loc = tokens
            .last()
            .map(|tok| tok.location)
            .unwrap_or_default();
        self.pending
            .push_back(Token::empty(TokenKind::Newline, nl_loc));
        self.drain_pending(false)
    }

    fn drain_pending(&mut self, force: bool) -> PpResult<()> {
        let mut queue = std::mem::take(&mut self.pending);
        let result = self.drain_queue(&mut queue, force);
        self.pending = queue;
        result
    }

    fn drain_queue(&mut self, queue: &mut VecDeque<Token>, force: bool) -> PpResult<()> {
        loop {
            let Some(front) = queue.front() else {
                return Ok(());
            };
            match front.kind {
                TokenKind::Newline => {
                    let tok = queue.pop_front().expect("front");
                    self.emit_newline(&tok);
                }
                TokenKind::Eof => {
                    queue.pop_front();
                }
                TokenKind::Ident => match self.expand_one(queue, force, true)? {
                    Expanded::Replaced => {}
                    Expanded::NotAMacro => {
                        let tok = queue.pop_front().expect("front");
                        self.emit_token(&tok);
                    }
                    Expanded::NeedMoreInput => return Ok(()),
                },
                _ => {
                    let tok = queue.pop_front().expect("front");
                    self.emit_token(&tok);
                }
            }
        }
    }

    fn emit_token(&mut self, tok: &Token) {
        if !self.emit {
            return;
        }
        match tok.kind {
            TokenKind::Whitespace => self.ws_queue.push(tok.clone()),
            TokenKind::Placemarker | TokenKind::Eof => {}
            _ => {
                for ws in std::mem::take(&mut self.ws_queue) {
                    self.sink.token(&ws);
                }
                self.sink.token(tok);
                self.line_has_tokens = true;
            }
        }
    }

    /// Lines that produced no tokens produce no newline either, and
    /// whitespace hanging at the end of a line is dropped.
    fn emit_newline(&mut self, tok: &Token) {
        self.ws_queue.clear();
        if self.line_has_tokens {
            if self.emit {
                self.sink.token(tok);
            }
            self.line_has_tokens = false;
        }
    }

    // ------------------------------------------------------------------
    // Macro expansion

    fn expand_list(&mut self, tokens: Vec<Token>) -> PpResult<Vec<Token>> {
        let mut queue: VecDeque<Token> = tokens.into();
        let mut out = Vec::new();
        loop {
            let Some(front) = queue.front() else {
                return Ok(out);
            };
            match front.kind {
                TokenKind::Ident => match self.expand_one(&mut queue, true, false)? {
                    Expanded::Replaced => {}
                    Expanded::NotAMacro => out.push(queue.pop_front().expect("front")),
                    Expanded::NeedMoreInput => unreachable!("forced expansion"),
                },
                TokenKind::Newline => {
                    let tok = queue.pop_front().expect("front");
                    out.push(Token::empty(TokenKind::Whitespace, tok.location));
                }
                TokenKind::Eof => {
                    queue.pop_front();
                }
                _ => out.push(queue.pop_front().expect("front")),
            }
        }
    }

    /// One step of the expansion algorithm for the identifier at the
    /// queue front.
    fn expand_one(
        &mut self,
        queue: &mut VecDeque<Token>,
        force: bool,
        top_level: bool,
    ) -> PpResult<Expanded> {
        let tok = queue.front().expect("identifier at front").clone();
        if tok.hideset.contains(tok.val) {
            return Ok(Expanded::NotAMacro);
        }
        let Some(def) = self.macros.get(tok.val) else {
            return Ok(Expanded::NotAMacro);
        };
        let def = def.clone();

        if let Some(builtin) = def.builtin {
            queue.pop_front();
            let computed = self.builtin_token(builtin, &tok);
            queue.push_front(computed);
            return Ok(Expanded::Replaced);
        }

        if def.params.is_none() {
            // Object-like application.
            queue.pop_front();
            let mut body = self.subst(&def, &[])?;
            let mut hs = tok.hideset.clone();
            hs.add(def.name);
            hs.add_tokens(&mut body);
            apply_origin(&mut body, origin_location(&tok));
            for t in body.into_iter().rev() {
                queue.push_front(t);
            }
            return Ok(Expanded::Replaced);
        }

        // A function-like macro name not followed by an argument list is
        // an ordinary identifier.
        let mut k = 1;
        loop {
            match queue.get(k) {
                Some(t) if t.is_whitespace() => k += 1,
                Some(t) if t.is_punct(Punct::LParen) => break,
                Some(_) => return Ok(Expanded::NotAMacro),
                None if force => return Ok(Expanded::NotAMacro),
                None => return Ok(Expanded::NeedMoreInput),
            }
        }

        // The whole argument list must be visible before consuming.
        let mut depth = 0usize;
        let mut j = k;
        let closed = loop {
            match queue.get(j) {
                None => break false,
                Some(t) if t.is_punct(Punct::LParen) => {
                    depth += 1;
                    j += 1;
                }
                Some(t) if t.is_punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        break true;
                    }
                    j += 1;
                }
                Some(_) => j += 1,
            }
        };
        if !closed {
            if !force {
                return Ok(Expanded::NeedMoreInput);
            }
            self.report.error(
                ErrorKind::Macro,
                tok.location,
                format!(
                    "unterminated argument list invoking macro '{}'",
                    sym_text(tok.val)
                ),
            )?;
            return Ok(Expanded::NotAMacro);
        }

        queue.pop_front(); // the macro name
        loop {
            let t = queue.pop_front().expect("scanned to '('");
            match t.kind {
                TokenKind::Newline => {
                    if top_level {
                        self.emit_newline(&t);
                    }
                }
                TokenKind::Whitespace => {}
                TokenKind::Punct(Punct::LParen) => break,
                _ => unreachable!("only whitespace before '('"),
            }
        }

        let (args, rparen) = self.collect_args(queue, &def, top_level, &tok)?;
        let mut body = self.subst(&def, &args)?;
        let mut hs = tok.hideset.intersection(&rparen.hideset);
        hs.add(def.name);
        hs.add_tokens(&mut body);
        apply_origin(&mut body, origin_location(&tok));
        for t in body.into_iter().rev() {
            queue.push_front(t);
        }
        Ok(Expanded::Replaced)
    }

    fn builtin_token(&self, builtin: Builtin, tok: &Token) -> Token {
        let origin = origin_location(tok);
        let file = self
            .files
            .iter()
            .rev()
            .find(|file| file.file_no == origin.file_no);
        match builtin {
            Builtin::Line => {
                let delta = file.map(|file| file.line_delta).unwrap_or(0);
                let line = (origin.line as i64 + delta).max(1);
                Token::new(TokenKind::IntConst, intern(&line.to_string()), tok.location)
            }
            Builtin::File => {
                let name = file
                    .map(|file| file.display_name.clone())
                    .unwrap_or_else(|| symbols::file_name(origin.file_no));
                Token::new(
                    TokenKind::StrLit(Enc::Plain),
                    intern(&quote_string(&name)),
                    tok.location,
                )
            }
        }
    }

    /// Collects the comma-separated arguments; the front of the queue
    /// is just past the opening parenthesis and the list is known to
    /// close. Whitespace around each argument is deleted; the variadic
    /// part is collected verbatim, interior commas and all.
    fn collect_args(
        &mut self,
        queue: &mut VecDeque<Token>,
        def: &MacroDef,
        top_level: bool,
        name_tok: &Token,
    ) -> PpResult<(Vec<MacroArg>, Token)> {
        let params = def.params.as_ref().expect("function-like");
        let mut args = Vec::new();
        let mut complained = false;

        if params.names.is_empty() && !params.variadic {
            let extra = self.collect_one(queue, top_level, true);
            if extra.iter().any(|tok| !tok.is_whitespace()) {
                self.report.error(
                    ErrorKind::Macro,
                    name_tok.location,
                    format!("too many arguments to macro '{}'", sym_text(name_tok.val)),
                )?;
            }
        } else {
            for (idx, &pname) in params.names.iter().enumerate() {
                if idx > 0 {
                    if queue.front().is_some_and(|tok| tok.is_punct(Punct::Comma)) {
                        queue.pop_front();
                    } else {
                        // Too few arguments; the missing ones are empty.
                        if !complained {
                            self.report.error(
                                ErrorKind::Macro,
                                name_tok.location,
                                format!(
                                    "too few arguments to macro '{}'",
                                    sym_text(name_tok.val)
                                ),
                            )?;
                            complained = true;
                        }
                        args.push(MacroArg {
                            name: pname,
                            is_va: false,
                            tokens: Vec::new(),
                        });
                        continue;
                    }
                }
                let tokens = self.collect_one(queue, top_level, false);
                args.push(MacroArg {
                    name: pname,
                    is_va: false,
                    tokens: trim_ws(&tokens).to_vec(),
                });
            }
            if params.variadic {
                if queue.front().is_some_and(|tok| tok.is_punct(Punct::Comma)) {
                    queue.pop_front();
                }
                let tokens = self.collect_one(queue, top_level, true);
                args.push(MacroArg {
                    name: params.va_name,
                    is_va: true,
                    tokens: trim_ws(&tokens).to_vec(),
                });
            } else if queue.front().is_some_and(|tok| tok.is_punct(Punct::Comma)) {
                self.report.error(
                    ErrorKind::Macro,
                    name_tok.location,
                    format!("too many arguments to macro '{}'", sym_text(name_tok.val)),
                )?;
                self.collect_one(queue, top_level, true);
            }
        }

        let rparen = queue.pop_front().expect("closing parenthesis");
        debug_assert!(rparen.is_punct(Punct::RParen));
        Ok((args, rparen))
    }

    /// One argument: tokens up to an unparenthesized `,` (unless
    /// `read_rest`) or the closing `)`, neither consumed. Newlines
    /// crossed at the top level go straight to the sink.
    fn collect_one(
        &mut self,
        queue: &mut VecDeque<Token>,
        top_level: bool,
        read_rest: bool,
    ) -> Vec<Token> {
        let mut depth = 0usize;
        let mut tokens = Vec::new();
        loop {
            let Some(front) = queue.front() else {
                return tokens;
            };
            match front.kind {
                TokenKind::Punct(Punct::LParen) => {
                    depth += 1;
                    tokens.push(queue.pop_front().expect("front"));
                }
                TokenKind::Punct(Punct::RParen) => {
                    if depth == 0 {
                        return tokens;
                    }
                    depth -= 1;
                    tokens.push(queue.pop_front().expect("front"));
                }
                TokenKind::Punct(Punct::Comma) if depth == 0 && !read_rest => return tokens,
                TokenKind::Newline => {
                    let tok = queue.pop_front().expect("front");
                    if top_level {
                        self.emit_newline(&tok);
                    } else {
                        tokens.push(Token::empty(TokenKind::Whitespace, tok.location));
                    }
                }
                TokenKind::Eof => {
                    queue.pop_front();
                }
                _ => tokens.push(queue.pop_front().expect("front")),
            }
        }
    }

    /// Argument substitution into a replacement list, with `#`
    /// stringification, left-to-right `##` pasting over placemarkers,
    /// and full expansion of plainly substituted arguments. Also used
    /// for object-like bodies, where only `##` applies.
    fn subst(&mut self, def: &MacroDef, args: &[MacroArg]) -> PpResult<Vec<Token>> {
        let body = &def.body;
        let mut result: Vec<Token> = Vec::new();
        let mut i = 0;

        while i < body.len() {
            let tok = &body[i];

            // Stringification: # followed by a parameter.
            if def.params.is_some()
                && tok.is_punct(Punct::Hash)
                && let Some((j, next)) = next_non_ws(body, i + 1)
                && let Some(arg) = find_arg(args, next)
            {
                result.push(stringize(tok, &arg.tokens));
                i = j + 1;
                continue;
            }

            // GNU `, ## __VA_ARGS__`: with no variadic arguments the
            // comma disappears; otherwise the paste is a plain
            // substitution.
            if self.opts.tweaks.omit_comma_before_ellipsis
                && tok.is_punct(Punct::Comma)
                && let Some((j, paste)) = next_non_ws(body, i + 1)
                && paste.is_punct(Punct::HashHash)
                && let Some((k, next)) = next_non_ws(body, j + 1)
                && let Some(arg) = find_arg(args, next)
                && arg.is_va
            {
                if arg.tokens.is_empty() {
                    i = k + 1;
                } else {
                    result.push(tok.clone());
                    i = j + 1;
                }
                continue;
            }

            // Token pasting.
            if tok.is_punct(Punct::HashHash) {
                let Some((j, next)) = next_non_ws(body, i + 1) else {
                    // Rejected at definition time; skip defensively.
                    break;
                };
                while result.last().is_some_and(|tok| tok.is_whitespace()) {
                    result.pop();
                }
                let Some(lhs) = result.pop() else {
                    i = j + 1;
                    continue;
                };
                let (rhs_first, rhs_rest): (Token, &[Token]) = match find_arg(args, next) {
                    Some(arg) => {
                        if arg.tokens.is_empty() {
                            (Token::empty(TokenKind::Placemarker, next.location), &[][..])
                        } else {
                            (arg.tokens[0].clone(), &arg.tokens[1..])
                        }
                    }
                    None => (next.clone(), &[][..]),
                };
                let pasted = self.paste(&lhs, &rhs_first)?;
                result.extend(pasted);
                result.extend(rhs_rest.iter().cloned());
                i = j + 1;
                continue;
            }

            // Parameter substitution.
            if let Some(arg) = find_arg(args, tok) {
                let followed_by_paste = next_non_ws(body, i + 1)
                    .is_some_and(|(_, next)| next.is_punct(Punct::HashHash));
                if followed_by_paste {
                    // An operand of ## substitutes unexpanded; an empty
                    // argument becomes a placemarker.
                    if arg.tokens.is_empty() {
                        result.push(Token::empty(TokenKind::Placemarker, tok.location));
                    } else {
                        result.extend(arg.tokens.iter().cloned());
                    }
                } else {
                    let expanded = self.expand_list(arg.tokens.clone())?;
                    let empty = expanded.iter().all(|tok| tok.is_whitespace());
                    if arg.is_va && empty && self.opts.tweaks.omit_comma_before_ellipsis {
                        // Delete a comma sitting directly before the
                        // empty variadic expansion.
                        let mut ws_run = Vec::new();
                        while result.last().is_some_and(|tok| tok.is_whitespace()) {
                            ws_run.push(result.pop().expect("last"));
                        }
                        if result.last().is_some_and(|tok| tok.is_punct(Punct::Comma)) {
                            result.pop();
                        } else {
                            result.extend(ws_run.into_iter().rev());
                        }
                    } else {
                        result.extend(expanded);
                    }
                }
                i += 1;
                continue;
            }

            result.push(tok.clone());
            i += 1;
        }

        // Placemarkers only exist to make ## uniform.
        result.retain(|tok| tok.kind != TokenKind::Placemarker);
        Ok(result)
    }

    /// Concatenates the spellings of two tokens and re-scans the result
    /// as a single pp-token. A paste with a placemarker yields the
    /// other operand. More than one resulting token is kept, with a
    /// warning; no resulting token keeps both operands.
    fn paste(&mut self, lhs: &Token, rhs: &Token) -> PpResult<Vec<Token>> {
        if lhs.kind == TokenKind::Placemarker {
            return Ok(vec![rhs.clone()]);
        }
        if rhs.kind == TokenKind::Placemarker {
            return Ok(vec![lhs.clone()]);
        }

        let spelling = format!("{}{}", tok_src(lhs), tok_src(rhs));
        let mut scratch = Report::new(-1, false, true);
        let mut lexer = Lexer::new(0, &spelling, &self.opts.tweaks);
        let mut toks = Vec::new();
        loop {
            let tok = lexer.next_token(&mut scratch).expect("paste scan");
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Whitespace | TokenKind::Newline => {}
                _ => toks.push(tok),
            }
        }

        let hs = lhs.hideset.union(&rhs.hideset);
        for tok in &mut toks {
            tok.location = lhs.location;
            tok.origin = lhs.origin;
            tok.hideset = hs.clone();
        }
        match toks.len() {
            0 => {
                self.report.error(
                    ErrorKind::Macro,
                    lhs.location,
                    format!("pasting forms '{spelling}', an invalid token"),
                )?;
                Ok(vec![lhs.clone(), rhs.clone()])
            }
            1 => Ok(toks),
            _ => {
                self.report.warning(
                    ErrorKind::Macro,
                    lhs.location,
                    format!("pasting forms '{spelling}', more than one token"),
                );
                Ok(toks)
            }
        }
    }
}

fn find_arg<'s>(args: &'s [MacroArg], tok: &Token) -> Option<&'s MacroArg> {
    if tok.kind != TokenKind::Ident {
        return None;
    }
    args.iter().find(|arg| arg.name == tok.val)
}

fn next_non_ws(tokens: &[Token], from: usize) -> Option<(usize, &Token)> {
    let mut i = from;
    while tokens.get(i).is_some_and(|tok| tok.is_whitespace()) {
        i += 1;
    }
    tokens.get(i).map(|tok| (i, tok))
}

fn trim_ws(tokens: &[Token]) -> &[Token] {
    let mut tokens = tokens;
    while tokens.first().is_some_and(|tok| tok.is_whitespace()) {
        tokens = &tokens[1..];
    }
    while tokens.last().is_some_and(|tok| tok.is_whitespace()) {
        tokens = &tokens[..tokens.len() - 1];
    }
    tokens
}

/// Stringification: the argument's original tokens, whitespace
/// normalized, wrapped in quotes with `"` and `\` escaped.
fn stringize(hash: &Token, arg: &[Token]) -> Token {
    let joined = join_tokens(arg);
    let quoted = quote_string(&joined);
    Token::new(TokenKind::StrLit(Enc::Plain), intern(&quoted), hash.location)
}

fn origin_location(tok: &Token) -> SourceLocation {
    tok.origin.unwrap_or(tok.location)
}

fn apply_origin(tokens: &mut [Token], origin: SourceLocation) {
    for tok in tokens {
        if tok.origin.is_none() {
            tok.origin = Some(origin);
        }
    }
}

fn builtin_location(file_no: usize) -> SourceLocation {
    SourceLocation {
        file_no,
        offset: 1,
        line: 1,
        column: 1,
    }
}
